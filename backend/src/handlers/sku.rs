//! SKU handlers

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{page_of, visible, visible_page};
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::TenantUser;
use crate::services::sku::{CreateSkuInput, SkuFilter, UpdateSkuInput};
use crate::services::SkuService;
use crate::AppState;
use shared::{Action, PaginatedResponse, Resource};

#[derive(Debug, Deserialize)]
pub struct ListSkusQuery {
    pub include_deactivated: Option<bool>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSkuStatusRequest {
    pub is_active: bool,
}

fn sku_service(state: &AppState) -> SkuService {
    SkuService::new(state.db.clone(), state.change_logs())
}

/// List SKUs
pub async fn list_skus(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<ListSkusQuery>,
) -> AppResult<Json<PaginatedResponse<Value>>> {
    user.require(Resource::Skus, Action::Read)?;

    let page = page_of(&state.config.pagination, query.page, query.limit);
    let filter = SkuFilter {
        include_deactivated: query.include_deactivated.unwrap_or(false),
        category: query.category,
        search: query.search,
    };
    let skus = sku_service(&state).list(user.organization_id, filter, page).await?;

    visible_page(&user, Resource::Skus, skus)
}

/// Get a SKU by ID
pub async fn get_sku(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Skus, Action::Read)?;

    let sku = sku_service(&state).get(user.organization_id, sku_id).await?;
    visible(&user, Resource::Skus, &sku)
}

/// Create a SKU
pub async fn create_sku(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateSkuInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require(Resource::Skus, Action::Create)?;

    let sku = sku_service(&state)
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, visible(&user, Resource::Skus, &sku)?))
}

/// Update a SKU
pub async fn update_sku(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateSkuInput>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Skus, Action::Update)?;

    let sku = sku_service(&state)
        .update(user.organization_id, user.user_id, sku_id, input)
        .await?;

    visible(&user, Resource::Skus, &sku)
}

/// Activate or deactivate a SKU
pub async fn update_sku_status(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateSkuStatusRequest>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Skus, Action::Update)?;

    let sku = sku_service(&state)
        .set_status(user.organization_id, user.user_id, sku_id, body.is_active)
        .await?;

    visible(&user, Resource::Skus, &sku)
}

/// Distinct SKU categories
pub async fn list_sku_categories(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
) -> AppResult<Json<Vec<String>>> {
    user.require(Resource::Skus, Action::Read)?;

    let categories = sku_service(&state).categories(user.organization_id).await?;
    Ok(Json(categories))
}
