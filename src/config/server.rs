use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// The address to listen on for web requests
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Watch session delivery cadence in milliseconds
    #[serde(default = "default_push_interval_ms")]
    pub push_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            push_interval_ms: default_push_interval_ms(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when the listen address does not parse
    /// or the push interval is zero.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.push_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "server.push_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            Error::InvalidConfig(format!(
                "server.listen_address {:?} is not a valid socket address: {}",
                self.listen_address, e
            ))
        })
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:9099".to_string()
}

fn default_push_interval_ms() -> u64 {
    1000
}
