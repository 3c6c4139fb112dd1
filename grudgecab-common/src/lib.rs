pub mod models;

pub use color_eyre::{
    eyre::{bail, eyre as err, Context, Report},
    install,
};

#[twelf::config]
pub struct Conf {
    /// SQLite connection URI
    pub database: String,

    /// Address the web server binds to
    pub address: Option<String>,
}

impl Conf {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or("0.0.0.0:8080")
    }
}
