// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub frontend: FrontendConfig,
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Location of the static frontend (index.html, *.css, js/, assets/)
#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    pub root: PathBuf,
}

/// Where intake persists uploaded images
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

/// Which detection path answers `/api/detect`
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Fixed, input-independent result
    Placeholder,
    /// Forward the image to the external detection API
    Remote,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => write!(f, "placeholder"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// External detection API settings
#[derive(Deserialize, Clone)]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-attempt timeout for the outbound call, in seconds
    pub timeout_secs: u64,
    /// Extra attempts after a connect failure or timeout
    pub max_retries: u32,
}

impl DetectionConfig {
    /// Longest time one detection call may take, over all attempts
    ///
    /// Zero in placeholder mode, which never leaves the process.
    pub fn call_budget(&self) -> Duration {
        match self.mode {
            DetectionMode::Placeholder => Duration::ZERO,
            DetectionMode::Remote => Duration::from_secs(
                self.timeout_secs
                    .saturating_mul(u64::from(self.max_retries).saturating_add(1)),
            ),
        }
    }
}

// Keep the API key out of debug output and startup logs.
impl fmt::Debug for DetectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionConfig")
            .field("mode", &self.mode)
            .field("api_url", &self.api_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
