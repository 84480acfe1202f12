// Handlers shared by every advisory; each is instantiated once per feature

use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::controller::{ControllerView, Report, Resolution};
use crate::error::{AppError, AppResult};
use crate::form::FieldValue;
use crate::session::{SessionFeature, Workspace};

pub(super) async fn workspace(state: &AppState, sid: Uuid) -> AppResult<Arc<Workspace>> {
    state
        .sessions
        .get(&sid)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Unknown session {}", sid)))
}

pub async fn view<A: SessionFeature>(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<ControllerView>> {
    let ws = workspace(&state, sid).await?;
    Ok(Json(A::controller(&ws).view().await))
}

pub async fn update<A: SessionFeature>(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
    Json(updates): Json<BTreeMap<String, FieldValue>>,
) -> AppResult<Json<ControllerView>> {
    let ws = workspace(&state, sid).await?;
    Ok(Json(A::controller(&ws).update(updates).await?))
}

pub async fn submit<A: SessionFeature>(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<Resolution>> {
    let ws = workspace(&state, sid).await?;
    Ok(Json(A::controller(&ws).submit(&state.services).await?))
}

pub async fn reset<A: SessionFeature>(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<ControllerView>> {
    let ws = workspace(&state, sid).await?;
    Ok(Json(A::controller(&ws).reset().await))
}

pub async fn report<A: SessionFeature>(
    State(state): State<AppState>,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<Report>> {
    let ws = workspace(&state, sid).await?;
    Ok(Json(A::controller(&ws).report().await?))
}
