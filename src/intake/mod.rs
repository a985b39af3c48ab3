//! Image intake
//!
//! Accepts an uploaded file or a base64 payload and persists it under the storage
//! directory. Writes go to a unique temporary file first and are renamed into place,
//! so a reader never observes a partially written image.

pub mod naming;

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::logger;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not a recognized image format")]
    NotAnImage,

    #[error("Empty image payload")]
    Empty,
}

impl IntakeError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file received from the client, before it is stored
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// An image persisted by intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// Absolute path inside the storage directory
    pub path: PathBuf,
    /// Name the client gave the file (informational only)
    pub origin_filename: String,
}

impl StoredImage {
    /// File name component of the stored path
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Persists intake payloads under one directory
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Configured directory, as given
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if absent and return its absolute path
    pub async fn ensure_dir(&self) -> Result<PathBuf, IntakeError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| IntakeError::io(&self.dir, e))?;
        fs::canonicalize(&self.dir)
            .await
            .map_err(|e| IntakeError::io(&self.dir, e))
    }

    /// Store an uploaded file under a content-hash name
    pub async fn save(&self, upload: &UploadedFile) -> Result<StoredImage, IntakeError> {
        if upload.bytes.is_empty() {
            return Err(IntakeError::Empty);
        }
        let ext = naming::upload_extension(&upload.filename, &upload.bytes);
        let path = self.write(&upload.bytes, ext).await?;

        logger::log_info(&format!(
            "[Intake] Stored upload '{}' ({} bytes) as {}",
            upload.filename,
            upload.bytes.len(),
            path.display()
        ));

        Ok(StoredImage {
            path,
            origin_filename: upload.filename.clone(),
        })
    }

    /// Decode a base64 image and store its bytes unchanged
    ///
    /// Accepts plain base64 or a `data:<mime>;base64,` URL. Whitespace is ignored.
    pub async fn save_from_base64(&self, data: &str) -> Result<StoredImage, IntakeError> {
        let bytes = decode_base64_image(data)?;
        let ext = naming::sniff_extension(&bytes).ok_or(IntakeError::NotAnImage)?;
        let path = self.write(&bytes, ext).await?;

        logger::log_info(&format!(
            "[Intake] Stored base64 image ({} bytes) as {}",
            bytes.len(),
            path.display()
        ));

        Ok(StoredImage {
            path,
            origin_filename: format!("base64-upload.{ext}"),
        })
    }

    async fn write(&self, bytes: &[u8], ext: &str) -> Result<PathBuf, IntakeError> {
        let dir = self.ensure_dir().await?;
        let final_path = dir.join(naming::stored_name(bytes, ext));
        let tmp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(IntakeError::io(&tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(IntakeError::io(&final_path, e));
        }

        Ok(final_path)
    }
}

/// Decode base64 (optionally a data URL) into raw image bytes
pub fn decode_base64_image(data: &str) -> Result<Vec<u8>, IntakeError> {
    let payload = match data.trim_start().strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, b64)| b64),
        None => data,
    };
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(IntakeError::Empty);
    }

    let bytes = general_purpose::STANDARD.decode(compact.as_bytes())?;
    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, ImageOutputFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Arc;

    /// Unique scratch directory that does not exist yet
    pub fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tagscan-{label}-{}", uuid::Uuid::new_v4()))
    }

    /// Small lossless PNG whose pixels depend on `seed`
    pub fn png_bytes(seed: u8) -> Vec<u8> {
        let img = ImageBuffer::from_fn(8, 4, |x, y| {
            Rgb([seed, u8::try_from(x * 16).unwrap(), u8::try_from(y * 32).unwrap()])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_preserves_bytes() {
        let dir = scratch_dir("save");
        assert!(!dir.exists());
        let store = ImageStore::new(&dir);

        let bytes = b"\xFF\xD8\xFF\xE0 not really a jpeg but named like one".to_vec();
        let stored = store
            .save(&UploadedFile::new("tag1.jpg", bytes.clone()))
            .await
            .unwrap();

        assert!(dir.is_dir());
        assert_eq!(stored.origin_filename, "tag1.jpg");
        assert!(stored.path.is_absolute());
        assert!(stored.path.starts_with(dir.canonicalize().unwrap()));
        assert_eq!(stored.path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&stored.path).unwrap(), bytes);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_save_confines_traversal_names() {
        let dir = scratch_dir("traversal");
        let store = ImageStore::new(&dir);

        let stored = store
            .save(&UploadedFile::new("../../etc/passwd", b"root:x:0:0".to_vec()))
            .await
            .unwrap();

        assert!(stored.path.starts_with(dir.canonicalize().unwrap()));
        assert_eq!(stored.origin_filename, "../../etc/passwd");
        assert_eq!(stored.path.extension().unwrap(), naming::FALLBACK_EXTENSION);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_empty_upload() {
        let store = ImageStore::new(scratch_dir("empty"));
        let err = store
            .save(&UploadedFile::new("a.png", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Empty));
    }

    #[tokio::test]
    async fn test_base64_round_trip_is_byte_exact() {
        let dir = scratch_dir("b64");
        let store = ImageStore::new(&dir);
        let png = png_bytes(7);

        let encoded = general_purpose::STANDARD.encode(&png);
        let stored = store.save_from_base64(&encoded).await.unwrap();

        assert_eq!(stored.path.extension().unwrap(), "png");
        assert_eq!(stored.origin_filename, "base64-upload.png");
        assert_eq!(std::fs::read(&stored.path).unwrap(), png);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_base64_accepts_data_url_and_whitespace() {
        let dir = scratch_dir("dataurl");
        let store = ImageStore::new(&dir);
        let png = png_bytes(9);

        let encoded = general_purpose::STANDARD.encode(&png);
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let data_url = format!("data:image/png;base64,{head}\n{tail}");
        let stored = store.save_from_base64(&data_url).await.unwrap();

        assert_eq!(std::fs::read(&stored.path).unwrap(), png);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_base64_rejects_garbage_and_non_images() {
        let store = ImageStore::new(scratch_dir("bad-b64"));

        let err = store.save_from_base64("%%% not base64 %%%").await.unwrap_err();
        assert!(matches!(err, IntakeError::Base64(_)));

        let text = general_purpose::STANDARD.encode(b"hello, not an image");
        let err = store.save_from_base64(&text).await.unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage));

        let err = store.save_from_base64("  ").await.unwrap_err();
        assert!(matches!(err, IntakeError::Empty));
    }

    #[tokio::test]
    async fn test_concurrent_saves_never_mix_content() {
        let dir = scratch_dir("concurrent");
        let store = Arc::new(ImageStore::new(&dir));
        let first = png_bytes(1);
        let second = png_bytes(2);

        let a = {
            let store = Arc::clone(&store);
            let data = general_purpose::STANDARD.encode(&first);
            tokio::spawn(async move { store.save_from_base64(&data).await })
        };
        let b = {
            let store = Arc::clone(&store);
            let data = general_purpose::STANDARD.encode(&second);
            tokio::spawn(async move { store.save_from_base64(&data).await })
        };
        let stored_a = a.await.unwrap().unwrap();
        let stored_b = b.await.unwrap().unwrap();

        assert_ne!(stored_a.path, stored_b.path);
        assert_eq!(std::fs::read(&stored_a.path).unwrap(), first);
        assert_eq!(std::fs::read(&stored_b.path).unwrap(), second);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_identical_saves_converge() {
        let dir = scratch_dir("converge");
        let store = Arc::new(ImageStore::new(&dir));
        let png = png_bytes(3);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let data = general_purpose::STANDARD.encode(&png);
            handles.push(tokio::spawn(async move { store.save_from_base64(&data).await }));
        }
        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().unwrap().path);
        }

        paths.dedup();
        assert_eq!(paths.len(), 1);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), png);

        // No temp files left behind
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
