//! Per-selection session state.

use shared::domain::{ImageId, ProcessingStatus, SessionId};

use crate::{error::WorkflowError, source_image::SourceImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorizedImage {
    pub url: String,
}

impl ColorizedImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A result exists only in `Done` and an error only in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Idle,
    Uploading,
    Processing,
    Done {
        result: ColorizedImage,
    },
    Failed {
        error: WorkflowError,
    },
}

impl ProcessingState {
    pub fn status(&self) -> ProcessingStatus {
        match self {
            Self::Idle => ProcessingStatus::Idle,
            Self::Uploading => ProcessingStatus::Uploading,
            Self::Processing => ProcessingStatus::Processing,
            Self::Done { .. } => ProcessingStatus::Done,
            Self::Failed { .. } => ProcessingStatus::Failed,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }
}

/// Read-only copy of a session handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub source_image: Option<SourceImage>,
    pub resource_id: Option<ImageId>,
    pub state: ProcessingState,
}

impl SessionSnapshot {
    pub fn status(&self) -> ProcessingStatus {
        self.state.status()
    }

    pub fn result_image(&self) -> Option<&ColorizedImage> {
        match &self.state {
            ProcessingState::Done { result } => Some(result),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&WorkflowError> {
        match &self.state {
            ProcessingState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Session {
    id: SessionId,
    source_image: Option<SourceImage>,
    resource_id: Option<ImageId>,
    state: ProcessingState,
    // Bumped whenever results are discarded so late responses can be dropped.
    revision: u64,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            id: SessionId::generate(),
            source_image: None,
            resource_id: None,
            state: ProcessingState::Idle,
            revision: 0,
        }
    }

    /// Starts over with a fresh id, keeping only the revision counter.
    pub(crate) fn restart(&mut self, source_image: Option<SourceImage>, state: ProcessingState) {
        self.id = SessionId::generate();
        self.source_image = source_image;
        self.resource_id = None;
        self.state = state;
        self.revision += 1;
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn source_image(&self) -> Option<&SourceImage> {
        self.source_image.as_ref()
    }

    pub(crate) fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub(crate) fn begin_processing(&mut self) {
        self.state = ProcessingState::Processing;
    }

    pub(crate) fn set_resource_id(&mut self, resource_id: ImageId) {
        self.resource_id = Some(resource_id);
    }

    pub(crate) fn complete(&mut self, result: ColorizedImage) {
        self.state = ProcessingState::Done { result };
    }

    pub(crate) fn fail(&mut self, error: WorkflowError) {
        self.state = ProcessingState::Failed { error };
    }

    /// Drops result, resource id and error. The source image stays.
    pub(crate) fn clear_results(&mut self) {
        self.resource_id = None;
        self.state = ProcessingState::Idle;
        self.revision += 1;
    }

    pub(crate) fn dismiss_error(&mut self) -> bool {
        if matches!(self.state, ProcessingState::Failed { .. }) {
            self.state = ProcessingState::Idle;
            return true;
        }
        false
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            source_image: self.source_image.clone(),
            resource_id: self.resource_id.clone(),
            state: self.state.clone(),
        }
    }
}
