//! Detection endpoint
//!
//! `POST /api/detect`: read the image from the request, hand it to intake, run the
//! configured detector, and answer with JSON.

use futures_util::stream;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{header, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::error::Error as StdError;
use thiserror::Error;

use crate::config::AppState;
use crate::detection::{DetectError, Detection, DetectionOutput};
use crate::http;
use crate::intake::{IntakeError, UploadedFile};
use crate::logger;

/// Form fields that may carry the image
const IMAGE_FIELDS: &[&str] = &["image", "file"];

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("No image provided")]
    MissingImage,

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(u64),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Detect(#[from] DetectError),
}

impl RequestError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Intake(IntakeError::Io { .. }) | Self::Detect(DetectError::Io { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Intake(_) => StatusCode::BAD_REQUEST,
            Self::Detect(DetectError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Detect(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Error body in the shape the frontend already understands
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    detections: Vec<Detection>,
}

impl From<&RequestError> for ErrorBody {
    fn from(err: &RequestError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            detections: Vec::new(),
        }
    }
}

/// JSON request body: `{"image": "<base64>"}`
#[derive(Debug, Deserialize)]
struct JsonImage {
    image: String,
}

/// Image as received, before intake
#[derive(Debug)]
enum ImagePayload {
    File(UploadedFile),
    Base64(String),
}

pub async fn handle_detect<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let enable_cors = state.config.http.enable_cors;
    match detect(req, state).await {
        Ok(output) => http::build_json_response(StatusCode::OK, &output, enable_cors),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                logger::log_error(&format!("[Detect] {e}"));
            } else {
                logger::log_warning(&format!("[Detect] Rejected request: {e}"));
            }
            http::build_json_response(status, &ErrorBody::from(&e), enable_cors)
        }
    }
}

async fn detect<B>(req: Request<B>, state: &AppState) -> Result<DetectionOutput, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let payload = read_image(req, state.config.http.max_body_size).await?;
    let stored = match payload {
        ImagePayload::File(upload) => state.store.save(&upload).await?,
        ImagePayload::Base64(data) => state.store.save_from_base64(&data).await?,
    };
    Ok(state.detector.detect(&stored).await?)
}

async fn read_image<B>(req: Request<B>, max_body_size: u64) -> Result<ImagePayload, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some(len) = declared_length(&req) {
        if len > max_body_size {
            return Err(RequestError::PayloadTooLarge(max_body_size));
        }
    }

    match essence.as_str() {
        "multipart/form-data" => {
            let boundary = multer::parse_boundary(&content_type)
                .map_err(|e| RequestError::BadRequest(format!("Invalid multipart header: {e}")))?;
            let body = read_body(req.into_body(), max_body_size).await?;
            image_from_multipart(body, boundary).await
        }
        "application/json" => {
            let body = read_body(req.into_body(), max_body_size).await?;
            let json: JsonImage = serde_json::from_slice(&body)
                .map_err(|e| RequestError::BadRequest(format!("Invalid JSON: {e}")))?;
            Ok(ImagePayload::Base64(json.image))
        }
        "" => Err(RequestError::UnsupportedMediaType("<missing>".to_string())),
        other => Err(RequestError::UnsupportedMediaType(other.to_string())),
    }
}

fn declared_length<B>(req: &Request<B>) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Collect the body, failing once it grows past `limit`
async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let cap = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, cap).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RequestError::PayloadTooLarge(limit))
        }
        Err(e) => Err(RequestError::BadRequest(format!(
            "Failed to read request body: {e}"
        ))),
    }
}

/// First image field wins: a file part is an upload, a text part is base64
async fn image_from_multipart(body: Bytes, boundary: String) -> Result<ImagePayload, RequestError> {
    let body_stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RequestError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let is_image_field = field.name().is_some_and(|n| IMAGE_FIELDS.contains(&n));
        if !is_image_field {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| RequestError::BadRequest(format!("Malformed multipart body: {e}")))?;

        return match file_name {
            Some(filename) => Ok(ImagePayload::File(UploadedFile::new(filename, data.to_vec()))),
            None => String::from_utf8(data.to_vec())
                .map(ImagePayload::Base64)
                .map_err(|_| {
                    RequestError::BadRequest(
                        "Image field is neither a file nor base64 text".to_string(),
                    )
                }),
        };
    }

    Err(RequestError::MissingImage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(RequestError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RequestError::PayloadTooLarge(1).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            RequestError::Intake(IntakeError::NotAnImage).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RequestError::Detect(DetectError::Api {
                status: 404,
                body: "not found".to_string()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RequestError::Detect(DetectError::Timeout {
                attempts: 2,
                timeout: Duration::from_secs(1)
            })
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorBody::from(&RequestError::MissingImage)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "No image provided", "detections": []})
        );
    }

    #[tokio::test]
    async fn test_multipart_text_field_is_base64() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"image\"\r\n\r\n\
            aGVsbG8=\r\n\
            --XYZ--\r\n";
        let payload = image_from_multipart(Bytes::from(body), "XYZ".to_string())
            .await
            .unwrap();
        assert!(matches!(payload, ImagePayload::Base64(ref s) if s == "aGVsbG8="));
    }

    #[tokio::test]
    async fn test_multipart_skips_unrelated_fields() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            hi\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"tag1.jpg\"\r\n\
            Content-Type: image/jpeg\r\n\r\n\
            JPEGDATA\r\n\
            --XYZ--\r\n";
        let payload = image_from_multipart(Bytes::from(body), "XYZ".to_string())
            .await
            .unwrap();
        match payload {
            ImagePayload::File(upload) => {
                assert_eq!(upload.filename, "tag1.jpg");
                assert_eq!(upload.bytes, b"JPEGDATA");
            }
            ImagePayload::Base64(_) => panic!("expected a file part"),
        }
    }

    #[tokio::test]
    async fn test_multipart_without_image_field() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            hi\r\n\
            --XYZ--\r\n";
        let err = image_from_multipart(Bytes::from(body), "XYZ".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::MissingImage));
    }
}
