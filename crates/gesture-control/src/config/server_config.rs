use crate::config::{default_host, default_port};

use serde::{Deserialize, Serialize};

/// Control channel listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind. Loopback unless the client runs elsewhere.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port for the control channel.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
