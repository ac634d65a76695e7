//! Configuration loading for Setu

use crate::error::{Error, Result};
use crate::stub::StubConfig;
use crate::transport::TcpConnectionConfig;
use crate::transport::wire::DEFAULT_MAX_FRAME_BYTES;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SetuConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub stub: StubConfig,
}

/// Map builder service connection settings
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Service address as "host:port" (default: 127.0.0.1:50051)
    #[serde(default = "default_address")]
    pub address: String,

    /// Connect timeout per stream in milliseconds (default: 5000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Largest frame accepted from the service in bytes (default: 8 MiB)
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_timeout_ms: default_connect_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl ConnectionConfig {
    /// Settings for [`crate::transport::TcpConnection::new`]
    pub fn to_tcp_config(&self) -> TcpConnectionConfig {
        TcpConnectionConfig {
            address: self.address.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

// Default value functions
fn default_address() -> String {
    "127.0.0.1:50051".to_string()
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl SetuConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        content.parse()
    }

    fn validate(&self) -> Result<()> {
        if self.connection.address.is_empty() {
            return Err(Error::Config("connection.address must not be empty".into()));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(Error::Config(
                "connection.connect_timeout_ms must be positive".into(),
            ));
        }
        if self.connection.max_frame_bytes == 0 {
            return Err(Error::Config(
                "connection.max_frame_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl std::str::FromStr for SetuConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: SetuConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
