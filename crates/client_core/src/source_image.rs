//! In-memory, display-ready representation of the user's chosen photo.

use std::{io::Cursor, path::Path, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageReader;
use tracing::debug;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Any bytes are accepted; format sniffing and dimension probing are best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    mime_type: String,
    dimensions: Option<Dimensions>,
}

impl SourceImage {
    pub fn decode(bytes: Vec<u8>) -> Self {
        Self::decode_with_hint(bytes, None)
    }

    /// Like [`SourceImage::decode`], but falls back to the file extension for the MIME
    /// type when the content itself is not recognised.
    pub fn decode_from_path(bytes: Vec<u8>, path: &Path) -> Self {
        let hint = mime_guess::from_path(path).first_raw();
        Self::decode_with_hint(bytes, hint)
    }

    fn decode_with_hint(bytes: Vec<u8>, hint: Option<&str>) -> Self {
        let sniffed = image::guess_format(&bytes).ok();
        let mime_type = sniffed
            .map(|format| format.to_mime_type().to_string())
            .or_else(|| hint.map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        let dimensions = sniffed.and_then(|_| probe_dimensions(&bytes));
        debug!(
            len = bytes.len(),
            mime_type = %mime_type,
            ?dimensions,
            "decoded source image"
        );

        Self {
            bytes: bytes.into(),
            mime_type,
            dimensions,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URL a view can render directly.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions { width, height })
}
