// Application state module
// Everything a request handler needs, built once at startup and shared read-only

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::types::Config;
use crate::detection::{DetectError, Detector};
use crate::intake::ImageStore;

/// Application state
pub struct AppState {
    pub config: Arc<Config>,
    pub store: ImageStore,
    pub detector: Detector,
    /// Connections currently being served
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, DetectError> {
        let detector = Detector::from_config(&config.detection)?;
        let store = ImageStore::new(config.storage.upload_dir.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            detector,
            active_connections: AtomicUsize::new(0),
        })
    }
}
