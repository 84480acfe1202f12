// Client for the SeedSync prediction backend (crop, fertilizer, yield, disease, rotation, schemes, profile)

use reqwest::{Client, StatusCode, Url, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use crate::advisories::crop::{CropRequest, CropResponse};
use crate::advisories::disease::DiseaseResponse;
use crate::advisories::fertilizer::{FertilizerRequest, FertilizerResponse};
use crate::advisories::rotation::{RotationRequest, RotationResponse};
use crate::advisories::yield_prediction::{YieldRequest, YieldResponse};
use crate::form::ImageUpload;
use crate::models::{ProfileEnvelope, ProfileUpdate, SchemePage, SchemeQuery, SchemeRecord};

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("could not reach the prediction service: {0}")]
    Transport(String),
    #[error("prediction service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("not found")]
    NotFound,
    #[error("unexpected response from the prediction service: {0}")]
    Decode(String),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        BackendError::Transport(error.to_string())
    }
}

#[derive(Clone)]
pub struct BackendClient {
    http: Arc<Client>,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    // Builds `{base}/seg/seg/...`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// POSTs a JSON body and decodes the JSON reply. One request, no retry.
    async fn post_json<Req, Resp>(&self, segments: &[&str], body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST to prediction backend");
        let response = self.http.post(url).json(body).send().await?;
        decode(response).await
    }

    /// POSTs one file as a multipart form under `field`.
    async fn post_file<Resp>(&self, segments: &[&str], field: &str, upload: &ImageUpload) -> Result<Resp, BackendError>
    where
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;
        let form = multipart::Form::new().part(field.to_string(), part);
        tracing::debug!(%url, file = %upload.file_name, size = upload.size, "POST multipart to prediction backend");
        let response = self.http.post(url).multipart(form).send().await?;
        decode(response).await
    }

    // --- Predictions ---

    pub async fn predict_crop(&self, request: &CropRequest) -> Result<CropResponse, BackendError> {
        self.post_json(&["api", "crop", "predict-crop"], request).await
    }

    pub async fn predict_fertilizer(&self, request: &FertilizerRequest) -> Result<FertilizerResponse, BackendError> {
        self.post_json(&["api", "fertilizer", "predict"], request).await
    }

    pub async fn predict_yield(&self, request: &YieldRequest) -> Result<YieldResponse, BackendError> {
        self.post_json(&["api", "yield", "predict"], request).await
    }

    pub async fn predict_disease(&self, image: &ImageUpload) -> Result<DiseaseResponse, BackendError> {
        self.post_file(&["api", "disease", "predict_disease"], "file", image).await
    }

    pub async fn generate_rotation_advice(&self, request: &RotationRequest) -> Result<RotationResponse, BackendError> {
        self.post_json(&["api", "rotation", "generate-advice"], request).await
    }

    // --- Government schemes ---

    pub async fn list_schemes(&self, query: &SchemeQuery) -> Result<SchemePage, BackendError> {
        let url = self.endpoint(&["api", "schemes"])?;
        tracing::debug!(%url, ?query, "Listing schemes");
        let response = self.http.get(url).query(query).send().await?;
        decode(response).await
    }

    pub async fn get_scheme(&self, id: &str) -> Result<SchemeRecord, BackendError> {
        let url = self.endpoint(&["api", "schemes", id])?;
        tracing::debug!(%url, "Fetching scheme");
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    // --- Profile ---

    pub async fn get_profile(&self, user_id: &str) -> Result<ProfileEnvelope, BackendError> {
        let url = self.endpoint(&["api", "profile", user_id])?;
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    pub async fn patch_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<ProfileEnvelope, BackendError> {
        let url = self.endpoint(&["api", "profile", user_id])?;
        let response = self.http.patch(url).json(update).send().await?;
        decode(response).await
    }

    pub async fn upload_profile_image(&self, user_id: &str, upload: &ImageUpload) -> Result<ProfileEnvelope, BackendError> {
        self.post_file(&["api", "profile", user_id, "image"], "image", upload).await
    }

    pub async fn remove_profile_image(&self, user_id: &str) -> Result<ProfileEnvelope, BackendError> {
        let url = self.endpoint(&["api", "profile", user_id, "image"])?;
        let response = self.http.delete(url).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            message: error_detail(&body),
        });
    }
    response.json::<T>().await.map_err(|e| BackendError::Decode(e.to_string()))
}

// FastAPI reports failures as {"detail": "..."}; fall back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
