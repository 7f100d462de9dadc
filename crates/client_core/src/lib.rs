use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{anyhow, Result};
use shared::{
    domain::{ImageId, SessionId, Stage},
    protocol::UploadDisposition,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub mod config;
pub mod error;
pub mod preview;
pub mod service;
pub mod session;
pub mod source_image;

pub use error::{ConfigError, ServiceError, WorkflowError};
pub use preview::PreviewView;
pub use service::{ColorizeService, HttpColorizeService, UploadRequest};
pub use session::{ColorizedImage, ProcessingState, SessionSnapshot};
pub use source_image::SourceImage;

use session::Session;

/// Receives view switches, e.g. to move from the upload tab to the process tab.
pub trait StageListener: Send + Sync {
    fn stage_changed(&self, stage: Stage);
}

pub struct NoopStageListener;

impl StageListener for NoopStageListener {
    fn stage_changed(&self, _stage: Stage) {}
}

/// Opens a result URL in a new viewing context.
pub trait ResultViewer: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

pub struct MissingResultViewer;

impl ResultViewer for MissingResultViewer {
    fn open(&self, _url: &str) -> Result<()> {
        Err(anyhow!("no result viewer is available"))
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StateChanged(SessionSnapshot),
    StageChanged(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSourceImage,
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    Completed(ColorizedImage),
    Failed(WorkflowError),
    /// The session was reset or replaced while the request was outstanding.
    Superseded,
}

pub struct WorkflowController {
    service: Arc<dyn ColorizeService>,
    stage_listener: Arc<dyn StageListener>,
    result_viewer: Arc<dyn ResultViewer>,
    upload_title: String,
    session: Mutex<Session>,
    stage: Mutex<Stage>,
    // Revision of the session whose request is outstanding.
    in_flight: Mutex<Option<u64>>,
    events: broadcast::Sender<WorkflowEvent>,
}

/// Claims the in-flight slot for one session revision and makes sure an
/// abandoned request never leaves its session in `Processing`.
///
/// Acquire it while holding the session lock: `Drop` takes that lock too.
struct InFlightGuard<'a> {
    controller: &'a WorkflowController,
    revision: u64,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(controller: &'a WorkflowController, revision: u64) -> Option<Self> {
        let mut in_flight = controller.lock_in_flight();
        if *in_flight == Some(revision) {
            return None;
        }
        *in_flight = Some(revision);
        Some(Self {
            controller,
            revision,
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let snapshot = {
            let mut session = self.controller.lock_session();
            if session.revision() == self.revision
                && matches!(session.state(), ProcessingState::Processing)
            {
                warn!(session_id = %session.id(), "processing abandoned before completion");
                session.fail(WorkflowError::Cancelled);
                Some(session.snapshot())
            } else {
                None
            }
        };
        {
            // A newer session may already own the slot.
            let mut in_flight = self.controller.lock_in_flight();
            if *in_flight == Some(self.revision) {
                *in_flight = None;
            }
        }
        if let Some(snapshot) = snapshot {
            self.controller.publish_state(snapshot);
        }
    }
}

impl WorkflowController {
    pub fn new(service: Arc<dyn ColorizeService>, upload_title: impl Into<String>) -> Arc<Self> {
        Self::new_with_dependencies(
            service,
            Arc::new(NoopStageListener),
            Arc::new(MissingResultViewer),
            upload_title,
        )
    }

    pub fn new_with_dependencies(
        service: Arc<dyn ColorizeService>,
        stage_listener: Arc<dyn StageListener>,
        result_viewer: Arc<dyn ResultViewer>,
        upload_title: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            service,
            stage_listener,
            result_viewer,
            upload_title: upload_title.into(),
            session: Mutex::new(Session::new()),
            stage: Mutex::new(Stage::Upload),
            in_flight: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_session().snapshot()
    }

    pub fn view(&self) -> PreviewView {
        let (snapshot, revision) = {
            let session = self.lock_session();
            (session.snapshot(), session.revision())
        };
        PreviewView::from_snapshot(&snapshot, self.is_in_flight(revision))
    }

    /// Whether the current session has a request outstanding. A request left
    /// over from a replaced or reset session does not count.
    pub fn is_processing(&self) -> bool {
        self.is_in_flight(self.current_revision())
    }

    fn is_in_flight(&self, revision: u64) -> bool {
        *self.lock_in_flight() == Some(revision)
    }

    pub fn stage(&self) -> Stage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches the visible stage and tells the listener, if it actually changed.
    pub fn show_stage(&self, stage: Stage) {
        {
            let mut current = self.stage.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == stage {
                return;
            }
            *current = stage;
        }
        self.stage_listener.stage_changed(stage);
        let _ = self.events.send(WorkflowEvent::StageChanged(stage));
    }

    /// Replaces the session with one holding `bytes` as its source image.
    pub fn select_image(&self, bytes: Vec<u8>) {
        self.install_source(SourceImage::decode(bytes));
    }

    /// Reads a file and selects it. The session reports `Uploading` while the read is pending.
    pub async fn select_image_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let (revision, snapshot) = {
            let mut session = self.lock_session();
            session.restart(None, ProcessingState::Uploading);
            (session.revision(), session.snapshot())
        };
        info!(session_id = %snapshot.session_id, path = %path.display(), "reading source image");
        self.publish_state(snapshot);

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                if self.current_revision() != revision {
                    warn!(path = %path.display(), "source image read superseded by a newer selection");
                    return;
                }
                self.install_source(SourceImage::decode_from_path(bytes, path));
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to read source image");
                self.update_if_current(revision, |session| {
                    session.fail(WorkflowError::SourceRead {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    });
                });
            }
        }
    }

    fn install_source(&self, source: SourceImage) {
        let snapshot = {
            let mut session = self.lock_session();
            session.restart(Some(source), ProcessingState::Idle);
            session.snapshot()
        };
        info!(
            session_id = %snapshot.session_id,
            len = snapshot.source_image.as_ref().map(SourceImage::len).unwrap_or_default(),
            "selected source image"
        );
        self.publish_state(snapshot);
        self.show_stage(Stage::Process);
    }

    /// Uploads the source image and drives it to `Done` or `Failed`.
    ///
    /// Never returns an error: failures are stored in the session and
    /// mirrored in the returned outcome.
    pub async fn process_image(&self) -> ProcessOutcome {
        let (_guard, request, revision, snapshot) = {
            let mut session = self.lock_session();
            let Some(source) = session.source_image() else {
                return ProcessOutcome::Skipped(SkipReason::NoSourceImage);
            };
            let revision = session.revision();
            let Some(guard) = InFlightGuard::acquire(self, revision) else {
                info!(session_id = %session.id(), "process request ignored; session already in flight");
                return ProcessOutcome::Skipped(SkipReason::AlreadyInFlight);
            };
            let request = UploadRequest {
                file: source.bytes().to_vec(),
                mime_type: source.mime_type().to_string(),
                title: self.upload_title.clone(),
                auto_colorize: true,
            };
            session.begin_processing();
            (guard, request, revision, session.snapshot())
        };
        let session_id = snapshot.session_id;
        info!(%session_id, len = request.file.len(), "processing started");
        self.publish_state(snapshot);

        self.colorize(&request, revision, session_id).await
    }

    async fn colorize(
        &self,
        request: &UploadRequest,
        revision: u64,
        session_id: SessionId,
    ) -> ProcessOutcome {
        let upload = match self.service.upload_image(request).await {
            Ok(upload) => upload,
            Err(err) => {
                error!(%session_id, error = %err, "upload-and-colorize request failed");
                return self.finish_failed(revision, err.into());
            }
        };

        match upload.disposition() {
            UploadDisposition::Colorized {
                image_id,
                colorized_url,
            } => {
                info!(%session_id, image_id = ?image_id, "image colorized during upload");
                self.finish_done(revision, image_id, ColorizedImage::new(colorized_url))
            }
            UploadDisposition::NeedsColorize { image_id } => {
                warn!(%session_id, %image_id, "upload stored original only; requesting colorize");
                if !self.update_if_current(revision, |session| {
                    session.set_resource_id(image_id.clone())
                }) {
                    return ProcessOutcome::Superseded;
                }
                self.colorize_stored(revision, session_id, image_id).await
            }
            UploadDisposition::Unrecognised => {
                error!(%session_id, ?upload, "upload response carried no usable image");
                self.finish_failed(revision, WorkflowError::UnexpectedResponseShape)
            }
        }
    }

    async fn colorize_stored(
        &self,
        revision: u64,
        session_id: SessionId,
        image_id: ImageId,
    ) -> ProcessOutcome {
        let reason = match self.service.colorize_existing(&image_id).await {
            Ok(response) => match response.colorized_url() {
                Some(url) => {
                    info!(%session_id, %image_id, "stored image colorized");
                    let result = ColorizedImage::new(url);
                    return self.finish_done(revision, Some(image_id), result);
                }
                None => "response carried no colorized image URL".to_string(),
            },
            Err(err) => err.to_string(),
        };

        error!(%session_id, %image_id, %reason, "colorize of stored image failed");
        self.finish_failed(revision, WorkflowError::FallbackFailure { image_id, reason })
    }

    fn finish_done(
        &self,
        revision: u64,
        image_id: Option<ImageId>,
        result: ColorizedImage,
    ) -> ProcessOutcome {
        let applied = self.update_if_current(revision, |session| {
            if let Some(image_id) = image_id {
                session.set_resource_id(image_id);
            }
            session.complete(result.clone());
        });
        if applied {
            ProcessOutcome::Completed(result)
        } else {
            ProcessOutcome::Superseded
        }
    }

    fn finish_failed(&self, revision: u64, error: WorkflowError) -> ProcessOutcome {
        if self.update_if_current(revision, |session| session.fail(error.clone())) {
            ProcessOutcome::Failed(error)
        } else {
            ProcessOutcome::Superseded
        }
    }

    /// Hands the result URL to the viewer. Returns whether there was a result to open.
    pub fn download_result(&self) -> bool {
        let Some(result) = self.snapshot().result_image().cloned() else {
            return false;
        };
        if let Err(err) = self.result_viewer.open(&result.url) {
            error!(url = %result.url, error = %err, "failed to open colorized image");
        }
        true
    }

    /// Fetches the colorized image bytes, if there is a result.
    pub async fn fetch_result(&self) -> std::result::Result<Option<Vec<u8>>, ServiceError> {
        let Some(result) = self.snapshot().result_image().cloned() else {
            return Ok(None);
        };
        self.service.fetch_result(&result.url).await.map(Some)
    }

    /// Clears result, resource id and error. The selected source image is kept.
    pub fn reset(&self) {
        let snapshot = {
            let mut session = self.lock_session();
            session.clear_results();
            session.snapshot()
        };
        info!(session_id = %snapshot.session_id, "session results cleared");
        self.publish_state(snapshot);
    }

    pub fn dismiss_error(&self) {
        let snapshot = {
            let mut session = self.lock_session();
            if !session.dismiss_error() {
                return;
            }
            session.snapshot()
        };
        self.publish_state(snapshot);
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<u64>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_revision(&self) -> u64 {
        self.lock_session().revision()
    }

    /// Applies `apply` only if the session has not been reset or replaced since `revision`.
    fn update_if_current(&self, revision: u64, apply: impl FnOnce(&mut Session)) -> bool {
        let snapshot = {
            let mut session = self.lock_session();
            if session.revision() != revision {
                warn!(session_id = %session.id(), "discarding result for a superseded session");
                return false;
            }
            apply(&mut session);
            session.snapshot()
        };
        self.publish_state(snapshot);
        true
    }

    fn publish_state(&self, snapshot: SessionSnapshot) {
        let _ = self.events.send(WorkflowEvent::StateChanged(snapshot));
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
