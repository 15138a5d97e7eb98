//! Server configuration.

use fxquery_fx::{FxConfig, FxError, FxResult};

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Rate engine configuration.
    pub fx: FxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            fx: FxConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> FxResult<Self> {
        let mut config = Self {
            fx: FxConfig::from_env()?,
            ..Self::default()
        };

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("LISTEN_PORT") {
            config.listen_port = port.trim().parse().map_err(|e| {
                FxError::Configuration(format!("LISTEN_PORT is not valid: {}", e))
            })?;
        }

        Ok(config)
    }

    /// `addr:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        self.fx.validate()
    }
}
