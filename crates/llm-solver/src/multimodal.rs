//! Problem image handling.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Image media types accepted for problem images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Largest accepted problem image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// A problem image: bytes and the media type they were sent with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// `image/jpeg`, `image/png` or `image/webp` for accepted images.
    pub media_type: String,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Reads an image from disk, taking the media type from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self { media_type, data })
    }

    /// Decodes standard-alphabet base64, as produced by browser file readers.
    pub fn from_base64(
        encoded: &str,
        media_type: impl Into<String>,
    ) -> Result<Self, base64::DecodeError> {
        STANDARD
            .decode(encoded.trim())
            .map(|data| Self::new(media_type, data))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Renders the image as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }

    /// Returns true if the media type is one of [`ALLOWED_IMAGE_TYPES`].
    pub fn is_supported(&self) -> bool {
        ALLOWED_IMAGE_TYPES.contains(&self.media_type.as_str())
    }

    /// Checks the media type and size limits for problem images.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_supported() {
            return Err(format!(
                "Unsupported image type '{}'. Allowed: {}",
                self.media_type,
                ALLOWED_IMAGE_TYPES.join(", ")
            ));
        }
        if self.data.len() > MAX_IMAGE_BYTES {
            return Err(format!(
                "Image is {} bytes, larger than the {} byte limit",
                self.data.len(),
                MAX_IMAGE_BYTES
            ));
        }
        Ok(())
    }
}

// Parses "data:image/png;base64,...". Media types outside the allowed set
// fall back to image/jpeg.
impl TryFrom<&str> for ImageData {
    type Error = String;

    fn try_from(data_url: &str) -> Result<Self, Self::Error> {
        let content = data_url.strip_prefix("data:").ok_or("Not a data URL")?;

        let (header, body) = content
            .split_once(',')
            .ok_or("Invalid data URL format")?;

        if !header.contains("base64") {
            return Err("Only base64 data URLs are supported".to_string());
        }

        let declared = header.split(';').next().unwrap_or_default();
        let media_type = if ALLOWED_IMAGE_TYPES.contains(&declared) {
            declared
        } else {
            "image/jpeg"
        };

        STANDARD
            .decode(body)
            .map(|data| Self::new(media_type, data))
            .map_err(|e| format!("Failed to decode base64 image: {e}"))
    }
}
