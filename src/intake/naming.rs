//! Storage naming for intake
//!
//! Client-supplied filenames never reach the filesystem. Every stored image is named
//! after its content hash, so two uploads only share a path when their bytes are equal.

use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex characters of the SHA-256 digest kept in the stored name
const HASH_LEN: usize = 32;

/// Extension used when neither the filename nor the content identifies the format
pub const FALLBACK_EXTENSION: &str = "bin";

/// Image extensions accepted from a client filename
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Content-derived stem, e.g. `3f0a...` (32 hex chars)
pub fn content_stem(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut stem = hex::encode(digest);
    stem.truncate(HASH_LEN);
    stem
}

/// Full stored file name: `<content stem>.<extension>`
pub fn stored_name(bytes: &[u8], extension: &str) -> String {
    format!("{}.{extension}", content_stem(bytes))
}

/// Extension taken from a client filename, if it names a known image type
///
/// Lowercased; `jpeg` is normalized to `jpg` and `tif` to `tiff`.
pub fn extension_from_filename(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let known = KNOWN_EXTENSIONS.iter().find(|k| **k == ext)?;
    Some(match *known {
        "jpeg" => "jpg",
        "tif" => "tiff",
        other => other,
    })
}

/// Extension sniffed from the leading bytes of an image
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    extension_for_format(format)
}

fn extension_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Bmp => Some("bmp"),
        ImageFormat::Tiff => Some("tiff"),
        ImageFormat::Ico => Some("ico"),
        _ => None,
    }
}

/// Extension for an upload: filename first, then content, then the fallback
pub fn upload_extension(filename: &str, bytes: &[u8]) -> &'static str {
    extension_from_filename(filename)
        .or_else(|| sniff_extension(bytes))
        .unwrap_or(FALLBACK_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_stem_is_stable_and_content_dependent() {
        let a = content_stem(b"same bytes");
        assert_eq!(a, content_stem(b"same bytes"));
        assert_ne!(a, content_stem(b"other bytes"));
        assert_eq!(a.len(), HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_extension_from_filename() {
        assert_eq!(extension_from_filename("tag1.jpg"), Some("jpg"));
        assert_eq!(extension_from_filename("TAG1.JPEG"), Some("jpg"));
        assert_eq!(extension_from_filename("scan.tif"), Some("tiff"));
        assert_eq!(extension_from_filename("photo.png"), Some("png"));
        assert_eq!(extension_from_filename("payload.exe"), None);
        assert_eq!(extension_from_filename("../../etc/passwd"), None);
        assert_eq!(extension_from_filename("noext"), None);
    }

    #[test]
    fn test_sniff_extension() {
        assert_eq!(sniff_extension(PNG_MAGIC), Some("png"));
        assert_eq!(sniff_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(sniff_extension(b"plain text"), None);
    }

    #[test]
    fn test_upload_extension_precedence() {
        // filename wins over content
        assert_eq!(upload_extension("a.jpg", PNG_MAGIC), "jpg");
        // content when filename says nothing useful
        assert_eq!(upload_extension("blob", PNG_MAGIC), "png");
        assert_eq!(upload_extension("blob", b"???"), FALLBACK_EXTENSION);
    }

    #[test]
    fn test_stored_name_has_no_path_components() {
        let name = stored_name(b"x", upload_extension("../../etc/passwd", b"x"));
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
        assert!(name.ends_with(".bin"));
    }
}
