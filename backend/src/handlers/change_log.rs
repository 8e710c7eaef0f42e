//! Change log handlers

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::TenantUser;
use crate::services::change_log::{
    ActivitySummary, ChangeLogEntry, ChangeLogFilter, CreateChangeLogInput,
};
use crate::AppState;
use shared::{Action, Resource};

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i32>,
}

/// List audit entries
pub async fn list_change_logs(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(filter): Query<ChangeLogFilter>,
) -> AppResult<Json<Vec<ChangeLogEntry>>> {
    user.require(Resource::Logs, Action::Read)?;

    let entries = state.change_logs().list(user.organization_id, filter).await?;
    Ok(Json(entries))
}

/// Record a manual audit entry
pub async fn create_change_log(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateChangeLogInput>,
) -> AppResult<(StatusCode, Json<ChangeLogEntry>)> {
    user.require(Resource::Logs, Action::Create)?;

    let entry = state
        .change_logs()
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Audit history of one SKU
pub async fn get_sku_change_logs(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Vec<ChangeLogEntry>>> {
    user.require(Resource::Logs, Action::Read)?;

    let entries = state
        .change_logs()
        .sku_history(user.organization_id, sku_id, query.days)
        .await?;

    Ok(Json(entries))
}

/// Recent activity overview
pub async fn get_activity_summary(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<ActivitySummary>> {
    user.require(Resource::Logs, Action::Read)?;

    let summary = state
        .change_logs()
        .activity_summary(user.organization_id, query.days)
        .await?;

    Ok(Json(summary))
}
