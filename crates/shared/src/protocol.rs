use serde::{Deserialize, Serialize};

use crate::{domain::ImageId, error::ProtocolException};

pub const UPLOAD_IMAGE_PATH: &str = "/upload-image";
pub const UPLOAD_FIELD_FILE: &str = "file";
pub const UPLOAD_FIELD_TITLE: &str = "title";
pub const UPLOAD_FIELD_AUTO_COLORIZE: &str = "auto_colorize";
pub const UPLOAD_FILENAME: &str = "image.jpg";

/// Path segments of `POST /images/{id}/colorize`. The id is one opaque
/// segment and must be percent-encoded by the caller.
pub fn colorize_existing_segments(image_id: &ImageId) -> [&str; 3] {
    ["images", image_id.as_str(), "colorize"]
}

/// Body of a successful `POST /upload-image`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadImageResponse {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorized_cloudinary_url: Option<String>,
}

/// Body of a successful `POST /images/{id}/colorize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorizeResponse {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorized_cloudinary_url: Option<String>,
}

/// How an upload response should be acted on, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDisposition {
    /// The service colorized during upload.
    Colorized {
        image_id: Option<ImageId>,
        colorized_url: String,
    },
    /// Only the original was stored; a separate colorize call is needed.
    NeedsColorize { image_id: ImageId },
    /// Neither a colorized result nor an addressable original.
    Unrecognised,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|url| !url.trim().is_empty())
}

impl UploadImageResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolException> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn colorized_url(&self) -> Option<&str> {
        if self.colorized != Some(true) {
            return None;
        }
        non_empty(self.colorized_cloudinary_url.as_ref())
    }

    pub fn original_url(&self) -> Option<&str> {
        non_empty(self.cloudinary_url.as_ref())
    }

    pub fn disposition(&self) -> UploadDisposition {
        if let Some(url) = self.colorized_url() {
            return UploadDisposition::Colorized {
                image_id: self.id.clone(),
                colorized_url: url.to_string(),
            };
        }
        match (self.original_url(), &self.id) {
            (Some(_), Some(image_id)) if !image_id.as_str().is_empty() => {
                UploadDisposition::NeedsColorize {
                    image_id: image_id.clone(),
                }
            }
            _ => UploadDisposition::Unrecognised,
        }
    }
}

impl ColorizeResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolException> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn colorized_url(&self) -> Option<&str> {
        non_empty(self.colorized_cloudinary_url.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorized_upload_takes_priority_over_original() {
        let response = UploadImageResponse::from_slice(
            br#"{"_id":"123","cloudinary_url":"https://x/orig.jpg","colorized":true,"colorized_cloudinary_url":"https://x/a.jpg"}"#,
        )
        .expect("parse");
        assert_eq!(
            response.disposition(),
            UploadDisposition::Colorized {
                image_id: Some(ImageId::new("123")),
                colorized_url: "https://x/a.jpg".to_string(),
            }
        );
    }

    #[test]
    fn colorized_url_without_flag_needs_explicit_colorize() {
        let response = UploadImageResponse::from_slice(
            br#"{"_id":"123","cloudinary_url":"https://x/orig.jpg","colorized_cloudinary_url":"https://x/a.jpg"}"#,
        )
        .expect("parse");
        assert_eq!(
            response.disposition(),
            UploadDisposition::NeedsColorize {
                image_id: ImageId::new("123")
            }
        );
    }

    #[test]
    fn original_url_without_id_is_unrecognised() {
        let response =
            UploadImageResponse::from_slice(br#"{"cloudinary_url":"https://x/orig.jpg"}"#)
                .expect("parse");
        assert_eq!(response.disposition(), UploadDisposition::Unrecognised);
    }

    #[test]
    fn empty_urls_count_as_absent() {
        let response = UploadImageResponse::from_slice(
            br#"{"_id":"1","cloudinary_url":"","colorized":true,"colorized_cloudinary_url":""}"#,
        )
        .expect("parse");
        assert_eq!(response.disposition(), UploadDisposition::Unrecognised);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let response = ColorizeResponse::from_slice(
            br#"{"_id":"9","title":"t","colorized":true,"colorized_cloudinary_url":"https://x/b.jpg","created_at":"2024"}"#,
        )
        .expect("parse");
        assert_eq!(response.colorized_url(), Some("https://x/b.jpg"));
    }

    #[test]
    fn null_colorized_flag_falls_back_to_original() {
        let response = UploadImageResponse::from_slice(
            br#"{"_id":"1","cloudinary_url":"https://x/o.jpg","colorized":null,"colorized_cloudinary_url":"https://x/c.jpg"}"#,
        )
        .expect("parse");
        assert_eq!(response.colorized, None);
        assert_eq!(
            response.disposition(),
            UploadDisposition::NeedsColorize {
                image_id: ImageId::new("1")
            }
        );
    }

    #[test]
    fn colorize_segments_keep_identifier_whole() {
        assert_eq!(
            colorize_existing_segments(&ImageId::new("a/b?c")),
            ["images", "a/b?c", "colorize"]
        );
    }
}
