//! Image encoding: page JPEG on disk → base64 payload for the API body.
//!
//! The Gemini REST API accepts images as base64 `inline_data` embedded in the
//! JSON request. Pages are already persisted as JPEGs by the rasterizer, so
//! encoding is a read-and-wrap step with no re-compression.

use crate::error::PrepscanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A base64-encoded image ready for an `inline_data` request part.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Base64 of the raw image bytes.
    pub data: String,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
}

/// Read a page image from disk and base64-encode it.
pub fn encode_image_file(path: &Path) -> Result<ImagePayload, PrepscanError> {
    let bytes = std::fs::read(path).map_err(|_| PrepscanError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };

    let data = STANDARD.encode(&bytes);
    debug!("Encoded {} → {} bytes base64", path.display(), data.len());

    Ok(ImagePayload {
        data,
        mime_type: mime_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn encode_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.jpg");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let payload = encode_image_file(&path).unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        let decoded = STANDARD.decode(&payload.data).unwrap();
        assert_eq!(decoded, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn png_extension_maps_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_2.png");
        std::fs::write(&path, [0x89, 0x50]).unwrap();
        let payload = encode_image_file(&path).unwrap();
        assert_eq!(payload.mime_type, "image/png");
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = encode_image_file(Path::new("/nonexistent/page_1.jpg")).unwrap_err();
        assert!(matches!(err, PrepscanError::FileNotFound { .. }));
    }
}
