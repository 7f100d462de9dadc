use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use shared::{
    domain::{ImageId, Stage},
    protocol::{ColorizeResponse, UploadImageResponse},
};
use tokio::{net::TcpListener, sync::Notify};

use crate::{ColorizeService, ResultViewer, ServiceError, StageListener, UploadRequest};

pub(crate) fn status_error(code: u16) -> ServiceError {
    ServiceError::Status {
        status: StatusCode::from_u16(code).expect("status code"),
        detail: None,
    }
}

pub(crate) fn colorized_upload(id: &str, url: &str) -> UploadImageResponse {
    UploadImageResponse {
        id: Some(ImageId::new(id)),
        colorized: Some(true),
        colorized_cloudinary_url: Some(url.to_string()),
        ..UploadImageResponse::default()
    }
}

pub(crate) fn original_only_upload(id: &str, url: &str) -> UploadImageResponse {
    UploadImageResponse {
        id: Some(ImageId::new(id)),
        cloudinary_url: Some(url.to_string()),
        ..UploadImageResponse::default()
    }
}

/// Upload reply with an id but neither image URL.
pub(crate) fn bare_upload(id: &str) -> UploadImageResponse {
    UploadImageResponse {
        id: Some(ImageId::new(id)),
        ..UploadImageResponse::default()
    }
}

pub(crate) fn colorize_reply(url: Option<&str>) -> ColorizeResponse {
    ColorizeResponse {
        colorized_cloudinary_url: url.map(str::to_string),
        ..ColorizeResponse::default()
    }
}

/// Service fake that replays queued replies and records every call.
#[derive(Default)]
pub(crate) struct ScriptedService {
    upload_replies: Mutex<VecDeque<Result<UploadImageResponse, ServiceError>>>,
    colorize_replies: Mutex<VecDeque<Result<ColorizeResponse, ServiceError>>>,
    pub(crate) uploads: Mutex<Vec<UploadRequest>>,
    pub(crate) colorize_calls: Mutex<Vec<ImageId>>,
    pub(crate) fetched: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
    pub(crate) upload_started: Arc<Notify>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Uploads block until `gate` is notified.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn with_upload(self, reply: Result<UploadImageResponse, ServiceError>) -> Self {
        self.upload_replies
            .lock()
            .expect("upload replies")
            .push_back(reply);
        self
    }

    pub(crate) fn with_colorize(self, reply: Result<ColorizeResponse, ServiceError>) -> Self {
        self.colorize_replies
            .lock()
            .expect("colorize replies")
            .push_back(reply);
        self
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.uploads.lock().expect("uploads").len()
    }

    pub(crate) fn colorized_ids(&self) -> Vec<ImageId> {
        self.colorize_calls.lock().expect("colorize calls").clone()
    }
}

#[async_trait]
impl ColorizeService for ScriptedService {
    async fn upload_image(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadImageResponse, ServiceError> {
        self.uploads.lock().expect("uploads").push(request.clone());
        self.upload_started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.upload_replies
            .lock()
            .expect("upload replies")
            .pop_front()
            .unwrap_or_else(|| Err(status_error(500)))
    }

    async fn colorize_existing(
        &self,
        image_id: &ImageId,
    ) -> Result<ColorizeResponse, ServiceError> {
        self.colorize_calls
            .lock()
            .expect("colorize calls")
            .push(image_id.clone());
        self.colorize_replies
            .lock()
            .expect("colorize replies")
            .pop_front()
            .unwrap_or_else(|| Err(status_error(500)))
    }

    async fn fetch_result(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        self.fetched.lock().expect("fetched").push(url.to_string());
        Ok(b"colorized-bytes".to_vec())
    }
}

#[derive(Default)]
pub(crate) struct RecordingViewer {
    pub(crate) opened: Mutex<Vec<String>>,
}

impl ResultViewer for RecordingViewer {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().expect("opened").push(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingStageListener {
    pub(crate) stages: Mutex<Vec<Stage>>,
}

impl StageListener for RecordingStageListener {
    fn stage_changed(&self, stage: Stage) {
        self.stages.lock().expect("stages").push(stage);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CapturedField {
    pub(crate) file_name: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) data: Vec<u8>,
}

#[derive(Clone)]
pub(crate) struct MockServiceState {
    upload_reply: (StatusCode, Value),
    colorize_reply: (StatusCode, Value),
    pub(crate) uploads: Arc<Mutex<Vec<HashMap<String, CapturedField>>>>,
    pub(crate) colorized_ids: Arc<Mutex<Vec<String>>>,
}

async fn handle_upload(
    State(state): State<MockServiceState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut fields = HashMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        fields.insert(
            name,
            CapturedField {
                file_name,
                content_type,
                data,
            },
        );
    }
    state.uploads.lock().expect("uploads").push(fields);
    let (status, body) = state.upload_reply.clone();
    (status, Json(body))
}

async fn handle_colorize(
    State(state): State<MockServiceState>,
    Path(image_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state
        .colorized_ids
        .lock()
        .expect("colorized ids")
        .push(image_id);
    let (status, body) = state.colorize_reply.clone();
    (status, Json(body))
}

async fn handle_result(Path(name): Path<String>) -> Vec<u8> {
    format!("bytes-of-{name}").into_bytes()
}

/// Serves the colorize API on an ephemeral local port with canned replies.
pub(crate) async fn spawn_mock_service(
    upload_reply: (StatusCode, Value),
    colorize_reply: (StatusCode, Value),
) -> (String, MockServiceState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = MockServiceState {
        upload_reply,
        colorize_reply,
        uploads: Arc::new(Mutex::new(Vec::new())),
        colorized_ids: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/upload-image", post(handle_upload))
        .route("/images/:image_id/colorize", post(handle_colorize))
        .route("/results/:name", get(handle_result))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}
