// Handlers for the JSON API: sessions, uploads, weather, schemes and profile

use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::advisory::workspace;
use crate::AppState;
use crate::advisories::DiseaseAdvisory;
use crate::advisories::disease::IMAGE_FIELD;
use crate::auth::AuthenticatedUser;
use crate::controller::ControllerView;
use crate::error::{AppError, AppResult};
use crate::form::{FieldValue, ImageUpload};
use crate::models::{ProfileEnvelope, ProfileUpdate, SchemePage, SchemeQuery, SchemeRecord, WeatherSnapshot};
use crate::schemes::PAGE_SIZE;
use crate::session::SessionFeature;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_SCHEME_PAGE: u32 = 50;

// --- Sessions ---

pub async fn create_session(State(app_state): State<AppState>) -> impl IntoResponse {
    let id = app_state.sessions.create().await;
    tracing::info!("[HANDLER] /api/sessions - Opened session {} ({} active)", id, app_state.sessions.len().await);
    (StatusCode::CREATED, Json(json!({ "sessionId": id })))
}

pub async fn close_session(State(app_state): State<AppState>, Path(sid): Path<Uuid>) -> AppResult<StatusCode> {
    if app_state.sessions.remove(&sid).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Unknown session {}", sid)))
    }
}

// --- Uploads ---

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Images must be 5 MB or smaller".into())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Reads the first file part of a multipart body as an image of at most 5 MiB.
async fn read_image(mut multipart: Multipart) -> AppResult<ImageUpload> {
    let field = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
        .ok_or_else(|| AppError::BadRequest("No file in upload".into()))?;

    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!("Expected an image upload, got '{}'", content_type)));
    }
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge("Images must be 5 MB or smaller".into()));
    }
    tracing::debug!(file = %file_name, size = bytes.len(), "Image upload received");
    Ok(ImageUpload::new(file_name, content_type, bytes.to_vec()))
}

pub async fn upload_leaf_image(
    State(app_state): State<AppState>,
    Path(sid): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ControllerView>> {
    let ws = workspace(&app_state, sid).await?;
    let upload = read_image(multipart).await?;
    let view = DiseaseAdvisory::controller(&ws)
        .update([(IMAGE_FIELD.to_string(), FieldValue::Image(upload))])
        .await?;
    Ok(Json(view))
}

// --- Weather ---

#[derive(Deserialize)]
pub struct LocationQuery {
    location: String,
}

#[derive(Serialize)]
pub struct WeatherPanel {
    location: Option<String>,
    weather: Option<WeatherSnapshot>,
}

pub async fn current_weather(
    State(app_state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Json<Option<WeatherSnapshot>> {
    Json(app_state.services.weather.fetch(&query.location).await)
}

pub async fn select_weather_location(
    State(app_state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(query): Json<LocationQuery>,
) -> AppResult<Json<WeatherPanel>> {
    let ws = workspace(&app_state, sid).await?;
    let mut panel = ws.weather.lock().await;
    let weather = panel.select(&app_state.services.weather, &query.location).await.cloned();
    Ok(Json(WeatherPanel { location: panel.location().map(String::from), weather }))
}

pub async fn refresh_weather(State(app_state): State<AppState>, Path(sid): Path<Uuid>) -> AppResult<Json<WeatherPanel>> {
    let ws = workspace(&app_state, sid).await?;
    let mut panel = ws.weather.lock().await;
    let weather = panel.refresh(&app_state.services.weather).await.cloned();
    Ok(Json(WeatherPanel { location: panel.location().map(String::from), weather }))
}

pub async fn session_weather(State(app_state): State<AppState>, Path(sid): Path<Uuid>) -> AppResult<Json<WeatherPanel>> {
    let ws = workspace(&app_state, sid).await?;
    let panel = ws.weather.lock().await;
    Ok(Json(WeatherPanel {
        location: panel.location().map(String::from),
        weather: panel.snapshot().cloned(),
    }))
}

// --- Government schemes ---

#[derive(Deserialize)]
pub struct SchemeListParams {
    limit: Option<u32>,
    offset: Option<u32>,
    search: Option<String>,
    scheme_type: Option<String>,
}

pub async fn list_schemes(
    State(app_state): State<AppState>,
    Query(params): Query<SchemeListParams>,
) -> AppResult<Json<SchemePage>> {
    let query = SchemeQuery {
        limit: params.limit.unwrap_or(PAGE_SIZE).clamp(1, MAX_SCHEME_PAGE),
        offset: params.offset.unwrap_or(0),
        search: params.search.filter(|s| !s.trim().is_empty()),
        scheme_type: params.scheme_type.filter(|s| !s.trim().is_empty()),
    };
    tracing::info!("[HANDLER] /api/schemes - limit={} offset={}", query.limit, query.offset);
    Ok(Json(app_state.services.backend.list_schemes(&query).await?))
}

pub async fn get_scheme(State(app_state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<SchemeRecord>> {
    match app_state.services.backend.get_scheme(&id).await {
        Ok(scheme) => Ok(Json(scheme)),
        Err(crate::backend::BackendError::NotFound) => Err(AppError::NotFound(format!("Scheme '{}' not found", id))),
        Err(e) => Err(e.into()),
    }
}

// --- Profile (requires a Firebase ID token) ---

pub async fn get_profile(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileEnvelope>> {
    tracing::info!(
        "[HANDLER] /api/profile - Fetching profile for user {} ({})",
        user.user_id,
        user.email.as_deref().unwrap_or("no email")
    );
    Ok(Json(app_state.services.backend.get_profile(&user.user_id).await?))
}

pub async fn update_profile(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileEnvelope>> {
    tracing::info!(
        "[HANDLER] /api/profile - Updating profile for user {} ({})",
        user.user_id,
        user.email.as_deref().unwrap_or("no email")
    );
    Ok(Json(app_state.services.backend.patch_profile(&user.user_id, &update).await?))
}

pub async fn upload_profile_image(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<ProfileEnvelope>> {
    let upload = read_image(multipart).await?;
    Ok(Json(app_state.services.backend.upload_profile_image(&user.user_id, &upload).await?))
}

pub async fn remove_profile_image(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileEnvelope>> {
    Ok(Json(app_state.services.backend.remove_profile_image(&user.user_id).await?))
}
