//! Remote detection adapter
//!
//! Sends the stored image to the external detection API as a multipart upload and
//! relays the JSON body. Only HTTP 200 counts as success.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use super::DetectError;
use crate::config::DetectionConfig;
use crate::http::mime;
use crate::logger;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// Client for the external detection API
#[derive(Debug, Clone)]
pub struct RemoteDetector {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
}

impl RemoteDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self, DetectError> {
        Self::with_settings(
            &config.api_url,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// Build with an explicit per-attempt timeout
    pub fn with_settings(
        api_url: &str,
        api_key: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, DetectError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(DetectError::Transport)?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            timeout,
            max_retries,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// POST the image at `path` and return the parsed JSON response
    pub async fn detect(&self, path: &Path) -> Result<serde_json::Value, DetectError> {
        let bytes = fs::read(path).await.map_err(|source| DetectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let content_type = mime::for_path(path);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.send_once(&bytes, &file_name, content_type).await {
                Ok((status, body)) => return self.read_response(status, body),
                Err(e) if is_transient(&e) && attempts <= self.max_retries => {
                    logger::log_warning(&format!(
                        "[Detect] Attempt {attempts} to {} failed ({e}), retrying",
                        self.api_url
                    ));
                }
                Err(e) if e.is_timeout() => {
                    return Err(DetectError::Timeout {
                        attempts,
                        timeout: self.timeout,
                    });
                }
                Err(e) => return Err(DetectError::Transport(e)),
            }
        }
    }

    /// One attempt: send the upload and read the whole body within the timeout
    async fn send_once(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    fn read_response(
        &self,
        status: StatusCode,
        body: String,
    ) -> Result<serde_json::Value, DetectError> {
        if status != StatusCode::OK {
            logger::log_warning(&format!(
                "[Detect] {} answered {}",
                self.api_url,
                status.as_u16()
            ));
            return Err(DetectError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Connect failures and timeouts are worth one more try; everything else is final
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
