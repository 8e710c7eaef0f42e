//! Field alias handlers
//!
//! Any member of the organization may read aliases; changing them is a
//! settings update.

use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::TenantUser;
use crate::services::field_alias::{
    supported_tables, CreateFieldAliasInput, FieldAlias, FieldAliasFilter, SupportedTables,
    TableFields, UpdateFieldAliasInput,
};
use crate::services::FieldAliasService;
use crate::AppState;
use shared::{Action, Resource};

fn alias_service(state: &AppState) -> FieldAliasService {
    FieldAliasService::new(state.db.clone(), state.change_logs())
}

/// List aliases
pub async fn list_field_aliases(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(filter): Query<FieldAliasFilter>,
) -> AppResult<Json<Vec<FieldAlias>>> {
    let aliases = alias_service(&state).list(user.organization_id, filter).await?;
    Ok(Json(aliases))
}

/// Get an alias by ID
pub async fn get_field_alias(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, alias_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<FieldAlias>> {
    let alias = alias_service(&state).get(user.organization_id, alias_id).await?;
    Ok(Json(alias))
}

/// Create an alias
pub async fn create_field_alias(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateFieldAliasInput>,
) -> AppResult<(StatusCode, Json<FieldAlias>)> {
    user.require(Resource::Settings, Action::Update)?;

    let alias = alias_service(&state)
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, Json(alias)))
}

/// Update an alias
pub async fn update_field_alias(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, alias_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateFieldAliasInput>,
) -> AppResult<Json<FieldAlias>> {
    user.require(Resource::Settings, Action::Update)?;

    let alias = alias_service(&state)
        .update(user.organization_id, user.user_id, alias_id, input)
        .await?;

    Ok(Json(alias))
}

/// Delete an alias
pub async fn delete_field_alias(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, alias_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    user.require(Resource::Settings, Action::Update)?;

    alias_service(&state)
        .delete(user.organization_id, user.user_id, alias_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Tables that accept aliases
pub async fn list_alias_tables(TenantUser(_user): TenantUser) -> Json<SupportedTables> {
    Json(supported_tables())
}

/// Aliases of one table with metadata
pub async fn get_table_fields(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, table_name)): Path<(Uuid, String)>,
) -> AppResult<Json<TableFields>> {
    let fields = alias_service(&state)
        .table_fields(user.organization_id, &table_name)
        .await?;

    Ok(Json(fields))
}

/// Seed default aliases for a table that has none
pub async fn initialize_table_aliases(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, table_name)): Path<(Uuid, String)>,
) -> AppResult<Json<TableFields>> {
    user.require(Resource::Settings, Action::Update)?;

    let fields = alias_service(&state)
        .initialize_defaults(user.organization_id, user.user_id, &table_name)
        .await?;

    Ok(Json(fields))
}
