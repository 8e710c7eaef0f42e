//! User management handlers

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{page_of, visible};
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, TenantUser};
use crate::services::user::{
    role_catalogue, CheckPermissionInput, CreateUserInput, PermissionCheck, RoleInfo,
    UpdateUserInput, UserFilter, UserPermissions, UserWithDetails,
};
use crate::services::UserService;
use crate::AppState;
use shared::{Action, PaginatedResponse, PermissionTable, Resource};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn user_service(state: &AppState) -> UserService {
    UserService::with_change_logs(state.db.clone(), state.change_logs())
}

/// A user's own record is returned unfiltered
fn user_view(caller: &AuthUser, record: &UserWithDetails) -> AppResult<Json<Value>> {
    if record.id == caller.user_id {
        let value = serde_json::to_value(record).map_err(|e| AppError::Internal(e.to_string()))?;
        return Ok(Json(value));
    }
    visible(caller, Resource::Users, record)
}

/// List users of the organization
pub async fn list_users(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<PaginatedResponse<Value>>> {
    user.require(Resource::Users, Action::Read)?;

    let page = page_of(&state.config.pagination, query.page, query.limit);
    let filter = UserFilter {
        role: query.role,
        is_active: query.is_active,
        search: query.search,
    };
    let users = user_service(&state).list(user.organization_id, filter, page).await?;

    let fields = PermissionTable::global().fields(user.role, Resource::Users);
    let mut rows = Vec::with_capacity(users.data.len());
    for record in &users.data {
        let value = serde_json::to_value(record).map_err(|e| AppError::Internal(e.to_string()))?;
        if record.id == user.user_id {
            rows.push(value);
        } else {
            rows.push(fields.filter(value));
        }
    }

    Ok(Json(PaginatedResponse {
        data: rows,
        pagination: users.pagination,
    }))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    user.require_self_or(user_id, Resource::Users, Action::Read)?;

    let record = user_service(&state).get(user.organization_id, user_id).await?;
    user_view(&user, &record)
}

/// Create a user
pub async fn create_user(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require(Resource::Users, Action::Create)?;

    let record = user_service(&state)
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, user_view(&user, &record)?))
}

/// Update a user
pub async fn update_user(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Users, Action::Update)?;

    let record = user_service(&state)
        .update(user.organization_id, user.user_id, user_id, input)
        .await?;

    user_view(&user, &record)
}

/// Delete a user
pub async fn delete_user(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    user.require(Resource::Users, Action::Delete)?;

    user_service(&state)
        .delete(user.organization_id, user.user_id, user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Role catalogue with grants
pub async fn list_roles(TenantUser(user): TenantUser) -> AppResult<Json<Vec<RoleInfo>>> {
    user.require(Resource::Users, Action::Read)?;
    Ok(Json(role_catalogue()))
}

/// Effective permissions of a user
pub async fn get_user_permissions(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<UserPermissions>> {
    user.require_self_or(user_id, Resource::Users, Action::Read)?;

    let permissions = user_service(&state)
        .permissions(user.organization_id, user_id)
        .await?;

    Ok(Json(permissions))
}

/// Check one resource/action pair for a user
pub async fn check_user_permission(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<CheckPermissionInput>,
) -> AppResult<Json<PermissionCheck>> {
    user.require_self_or(user_id, Resource::Users, Action::Read)?;

    let check = user_service(&state)
        .check_permission(user.organization_id, user_id, input)
        .await?;

    Ok(Json(check))
}
