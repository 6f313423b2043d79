use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_API_BASE, DEFAULT_SEND_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory holding persisted client state (active session id, logs)
    pub data_dir: PathBuf,
    /// Base URL of the memory backend REST API
    pub api_base_url: String,
    /// Bearer token attached to every request when present
    pub auth_token: Option<String>,
    /// Upper bound on a single send; `None` waits forever
    pub send_timeout: Option<Duration>,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            auth_token: None,
            send_timeout: Some(Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS)),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base_url = base.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake");
        Self::new(data_dir)
    }
}
