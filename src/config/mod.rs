// Configuration module entry point
// Loads layered configuration (file, environment, defaults) and holds runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, DetectionConfig, DetectionMode, FrontendConfig, HttpConfig, LoggingConfig,
    PerformanceConfig, ServerConfig, StorageConfig,
};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable prefix, e.g. `TAGSCAN__DETECTION__API_KEY`
pub const ENV_PREFIX: &str = "TAGSCAN";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Built-in defaults only, no file or environment
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "tagscan")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("frontend.root", "frontend")?
            .set_default("storage.upload_dir", "uploads")?
            .set_default("detection.mode", "placeholder")?
            .set_default("detection.api_url", "https://api.roboflow.com/detect")?
            .set_default("detection.api_key", "")?
            .set_default("detection.timeout_secs", 30)?
            .set_default("detection.max_retries", 1)
    }

    /// Reject combinations that would only fail later, at request time
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.detection.mode == DetectionMode::Remote && self.detection.api_key.trim().is_empty()
        {
            return Err(config::ConfigError::Message(
                "detection.api_key is required when detection.mode = \"remote\"".to_string(),
            ));
        }
        if self.detection.timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "detection.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.http.max_body_size == 0 {
            return Err(config::ConfigError::Message(
                "http.max_body_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.detection.mode, DetectionMode::Placeholder);
        assert_eq!(cfg.detection.api_url, "https://api.roboflow.com/detect");
        assert_eq!(cfg.detection.max_retries, 1);
        assert_eq!(cfg.storage.upload_dir, std::path::PathBuf::from("uploads"));
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert!(cfg.server.workers.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "127.0.0.1:5000".parse::<SocketAddr>().unwrap()
        );

        let mut bad = cfg;
        bad.server.host = "not a host".to_string();
        assert!(bad.get_socket_addr().is_err());
    }

    #[test]
    fn test_remote_mode_requires_api_key() {
        let mut cfg = Config::defaults().unwrap();
        cfg.detection.mode = DetectionMode::Remote;
        assert!(cfg.validate().is_err());

        cfg.detection.api_key = "secret".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut cfg = Config::defaults().unwrap();
        cfg.detection.timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::defaults().unwrap();
        cfg.http.max_body_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_detection_call_budget() {
        let mut cfg = Config::defaults().unwrap();
        assert_eq!(cfg.detection.call_budget(), std::time::Duration::ZERO);

        cfg.detection.mode = DetectionMode::Remote;
        cfg.detection.timeout_secs = 30;
        cfg.detection.max_retries = 1;
        assert_eq!(cfg.detection.call_budget(), std::time::Duration::from_secs(60));

        cfg.detection.timeout_secs = u64::MAX;
        assert_eq!(
            cfg.detection.call_budget(),
            std::time::Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let mut cfg = Config::defaults().unwrap();
        cfg.detection.api_key = "super-secret-key".to_string();
        let debug = format!("{:?}", cfg.detection);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = Config::load_from("definitely-not-a-real-config-file").unwrap();
        assert_eq!(cfg.http.server_name, "tagscan");
    }
}
