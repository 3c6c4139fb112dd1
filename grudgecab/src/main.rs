mod verbose;

use clap::{FromArgMatches as _, IntoApp as _, Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use twelf::Layer;

use grudgecab_common::Conf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(flatten)]
    verbose: verbose::Verbosity,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the built-in web server
    Serve,
    /// Print every grudge in the cabinet with its carat weight
    List,
}

#[tokio::main]
async fn main() -> Result<(), grudgecab_common::Report> {
    grudgecab_common::install()?;

    let matches = Cli::command().args(&Conf::clap_args()).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let conf = Conf::with_layers(&[
        Layer::Json("grudgecab.json".into()),
        Layer::Toml("grudgecab.toml".into()),
        Layer::Env(Some("GRUDGECAB_".to_string())),
        Layer::Clap(matches),
    ])?;

    let subscriber = Registry::default()
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::Layer::default())
        .with(EnvFilter::from_default_env().add_directive(cli.verbose.log_level_filter().into()));

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve => grudgecab_command_serve::run(&conf).await?,
        Commands::List => list(&conf).await?,
    }

    Ok(())
}

async fn list(conf: &Conf) -> Result<(), grudgecab_common::Report> {
    let pool = grudgecab_queries::init_database_connection(conf).await?;

    let grudges = grudgecab_queries::list_grudges(pool).await?;

    if grudges.is_empty() {
        println!("the cabinet is empty");

        return Ok(());
    }

    for grudge in grudges {
        match grudge.carat() {
            Some(carat) => println!("{:>3} carats  {}", carat, grudge),
            None => println!("  unrated   {}", grudge),
        }
    }

    Ok(())
}
