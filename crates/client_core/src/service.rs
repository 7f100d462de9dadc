//! Client for the remote colorize service.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    domain::ImageId,
    error::ServiceErrorBody,
    protocol::{
        colorize_existing_segments, ColorizeResponse, UploadImageResponse, UPLOAD_FIELD_AUTO_COLORIZE,
        UPLOAD_FIELD_FILE, UPLOAD_FIELD_TITLE, UPLOAD_FILENAME, UPLOAD_IMAGE_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::{normalize_api_url, Settings},
    error::{ConfigError, ServiceError},
};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: Vec<u8>,
    pub mime_type: String,
    pub title: String,
    pub auto_colorize: bool,
}

#[async_trait]
pub trait ColorizeService: Send + Sync {
    /// `POST /upload-image`: store the original and, when asked, colorize it in the same call.
    async fn upload_image(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadImageResponse, ServiceError>;

    /// `POST /images/{id}/colorize`: colorize an already stored original.
    async fn colorize_existing(&self, image_id: &ImageId)
        -> Result<ColorizeResponse, ServiceError>;

    /// Fetches the bytes behind a result URL.
    async fn fetch_result(&self, url: &str) -> Result<Vec<u8>, ServiceError>;
}

pub struct HttpColorizeService {
    http: Client,
    api_url: String,
    base_url: Url,
}

impl HttpColorizeService {
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Self::with_client(Client::new(), api_url)
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ConfigError::HttpClient)?;
        Self::with_client(http, &settings.api_url)
    }

    fn with_client(http: Client, api_url: &str) -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(api_url)?;
        let base_url = Url::parse(&api_url).map_err(|source| ConfigError::InvalidApiUrl {
            url: api_url.clone(),
            source,
        })?;
        Ok(Self {
            http,
            api_url,
            base_url,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Maps a non-2xx response to [`ServiceError::Status`], keeping the `detail`
/// message when the body carries one.
async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .bytes()
        .await
        .ok()
        .and_then(|body| serde_json::from_slice::<ServiceErrorBody>(&body).ok())
        .map(|body| body.message());
    Err(ServiceError::Status { status, detail })
}

#[async_trait]
impl ColorizeService for HttpColorizeService {
    async fn upload_image(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadImageResponse, ServiceError> {
        let file = Part::bytes(request.file.clone())
            .file_name(UPLOAD_FILENAME)
            .mime_str(&request.mime_type)?;
        let form = Form::new()
            .part(UPLOAD_FIELD_FILE, file)
            .text(UPLOAD_FIELD_TITLE, request.title.clone())
            .text(UPLOAD_FIELD_AUTO_COLORIZE, request.auto_colorize.to_string());

        debug!(
            api_url = %self.api_url,
            len = request.file.len(),
            auto_colorize = request.auto_colorize,
            "uploading image"
        );
        let response = self
            .http
            .post(format!("{}{UPLOAD_IMAGE_PATH}", self.api_url))
            .multipart(form)
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        Ok(UploadImageResponse::from_slice(&body)?)
    }

    async fn colorize_existing(
        &self,
        image_id: &ImageId,
    ) -> Result<ColorizeResponse, ServiceError> {
        debug!(api_url = %self.api_url, %image_id, "requesting colorize of stored image");
        let response = self
            .http
            .post(self.endpoint(colorize_existing_segments(image_id)))
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        Ok(ColorizeResponse::from_slice(&body)?)
    }

    async fn fetch_result(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self.http.get(url).send().await?;
        let body = check_status(response).await?.bytes().await?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
