//! Handles settings for the application.
//!
//! Configuration is read from an optional `settings.toml` in the working
//! directory, then from `SPLITLEDGER__*` environment variables
//! (e.g. `SPLITLEDGER__APP__LEVEL=debug`).
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "splitledger.db"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    String::from("info")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

impl Database {
    /// Connection string for sea-orm.
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_urls() {
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
        assert_eq!(
            Database::Sqlite("data/ledger.db".to_string()).url(),
            "sqlite:data/ledger.db?mode=rwc"
        );
    }
}
