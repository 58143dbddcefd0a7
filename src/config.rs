use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::SessionError;

/// Where the debug adapter listens, and optionally how to start it.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AdapterConfig {
    pub host: String,
    pub port: u16,
    /// Adapter executable to spawn before connecting. Without one, an already
    /// running adapter is expected at `host:port`.
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4711,
            program: None,
            args: vec![],
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub adapter: AdapterConfig,
    pub client_id: String,
    pub client_name: String,
    pub adapter_id: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub terminate_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            client_id: "dap-session".to_string(),
            client_name: "dap-session".to_string(),
            adapter_id: "cxxdbg".to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
            terminate_grace_ms: 3_000,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| {
            SessionError::configuration(format!("Can't read {}: {error}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|error| {
            SessionError::configuration(format!("Invalid config {}: {error}", path.display()))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}
