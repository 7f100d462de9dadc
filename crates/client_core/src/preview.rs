//! What the preview and comparison panes should show for a session.

use crate::session::{ProcessingState, SessionSnapshot};

pub const NO_IMAGE_SELECTED: &str = "No image selected";
pub const AWAITING_COLORIZATION: &str = "Awaiting colorization";
pub const PROCESSING: &str = "Processing...";
pub const UPLOADING: &str = "Uploading...";
pub const COLORIZE_ACTION: &str = "Colorize Image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pane {
    Image(String),
    Placeholder(&'static str),
}

impl Pane {
    pub fn image_src(&self) -> Option<&str> {
        match self {
            Self::Image(src) => Some(src),
            Self::Placeholder(_) => None,
        }
    }
}

/// Side-by-side view; only exists once both images are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonView {
    pub original_src: String,
    pub colorized_src: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewView {
    pub original: Pane,
    pub colorized: Pane,
    pub comparison: Option<ComparisonView>,
    pub process_label: &'static str,
    pub can_process: bool,
    pub can_download: bool,
    pub can_reset: bool,
    pub error_banner: Option<String>,
}

impl PreviewView {
    /// `in_flight` must only be set when the outstanding request belongs to
    /// this snapshot's session, not to one it replaced.
    pub fn from_snapshot(snapshot: &SessionSnapshot, in_flight: bool) -> Self {
        let original_src = snapshot.source_image.as_ref().map(|image| image.data_url());
        let colorized_src = snapshot.result_image().map(|result| result.url.clone());
        let processing = in_flight || matches!(snapshot.state, ProcessingState::Processing);

        let original = match &original_src {
            Some(src) => Pane::Image(src.clone()),
            None => Pane::Placeholder(NO_IMAGE_SELECTED),
        };
        let colorized = match (&colorized_src, &snapshot.state) {
            (Some(src), _) => Pane::Image(src.clone()),
            (None, _) if processing => Pane::Placeholder(PROCESSING),
            (None, ProcessingState::Uploading) => Pane::Placeholder(UPLOADING),
            (None, _) => Pane::Placeholder(AWAITING_COLORIZATION),
        };
        let comparison = match (original_src, colorized_src) {
            (Some(original_src), Some(colorized_src)) => Some(ComparisonView {
                original_src,
                colorized_src,
            }),
            _ => None,
        };
        let has_result = comparison.is_some();

        Self {
            original,
            colorized,
            comparison,
            process_label: if processing { PROCESSING } else { COLORIZE_ACTION },
            can_process: snapshot.source_image.is_some() && !snapshot.state.is_busy() && !in_flight,
            can_download: has_result,
            can_reset: has_result,
            error_banner: snapshot.last_error().map(ToString::to_string),
        }
    }
}
