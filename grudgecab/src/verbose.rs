use tracing::level_filters::LevelFilter;

/// Stacking `-v`/`-q` flags mapped onto a tracing level filter, starting
/// from `INFO`.
#[derive(clap::Args, Debug, Clone)]
pub struct Verbosity {
    /// More output per occurrence
    #[clap(long, short = 'v', parse(from_occurrences), global = true)]
    verbose: i8,

    /// Less output per occurrence
    #[clap(
        long,
        short = 'q',
        parse(from_occurrences),
        global = true,
        conflicts_with = "verbose"
    )]
    quiet: i8,
}

impl Verbosity {
    pub fn log_level_filter(&self) -> LevelFilter {
        match 2 + self.verbose - self.quiet {
            i8::MIN..=-1 => LevelFilter::OFF,
            0 => LevelFilter::ERROR,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verbosity(verbose: i8, quiet: i8) -> Verbosity {
        Verbosity { verbose, quiet }
    }

    #[test]
    fn defaults_to_info() {
        assert_eq!(verbosity(0, 0).log_level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn flags_move_the_filter_in_both_directions() {
        assert_eq!(verbosity(1, 0).log_level_filter(), LevelFilter::DEBUG);
        assert_eq!(verbosity(4, 0).log_level_filter(), LevelFilter::TRACE);
        assert_eq!(verbosity(0, 2).log_level_filter(), LevelFilter::ERROR);
        assert_eq!(verbosity(0, 3).log_level_filter(), LevelFilter::OFF);
    }
}
