//! Configuration management for the notification log service.
//!
//! Settings are loaded from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. `notilog.toml` in the working directory
//! 3. An explicit config file passed on the command line
//! 4. A file named by the `NOTILOG_CONFIG` environment variable
//! 5. `NOTILOG_*` environment variables (highest priority)

mod server;
mod storage;
pub use server::*;
pub use storage::*;


use crate::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Durable volume path and retention parameters
    #[serde(default)]
    pub storage: StorageConfig,
    /// Listen address and watch delivery cadence
    #[serde(default)]
    pub server: ServerConfig,
}

impl Settings {
    /// Loads and validates the merged configuration.
    ///
    /// # Arguments
    /// * `path` - Optional path to an explicit config file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::with_name("notilog").required(false));

        if let Some(custom) = path {
            builder = builder.add_source(File::with_name(custom).required(true));
        }

        if let Ok(env_path) = env::var("NOTILOG_CONFIG") {
            builder = builder.add_source(File::with_name(&env_path).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("NOTILOG").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.server.validate()?;
        Ok(())
    }
}
