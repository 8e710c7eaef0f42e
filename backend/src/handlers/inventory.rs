//! Inventory handlers

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{page_of, visible, visible_page};
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::TenantUser;
use crate::services::inventory::{
    CreateInventoryInput, InventoryFilter, InventorySummary, UpdateManualCostInput,
};
use crate::services::InventoryService;
use crate::AppState;
use shared::{Action, PaginatedResponse, Resource};

#[derive(Debug, Deserialize)]
pub struct ListInventoryQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn inventory_service(state: &AppState) -> InventoryService {
    InventoryService::new(state.db.clone(), state.change_logs())
}

/// List stock rows
pub async fn list_inventory(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<ListInventoryQuery>,
) -> AppResult<Json<PaginatedResponse<Value>>> {
    user.require(Resource::Inventory, Action::Read)?;

    let page = page_of(&state.config.pagination, query.page, query.limit);
    let filter = InventoryFilter {
        category: query.category,
        search: query.search,
    };
    let rows = inventory_service(&state)
        .list(user.organization_id, filter, page)
        .await?;

    visible_page(&user, Resource::Inventory, rows)
}

/// Open a stock row for a SKU
pub async fn create_inventory(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateInventoryInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.require(Resource::Inventory, Action::Create)?;

    let row = inventory_service(&state)
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, visible(&user, Resource::Inventory, &row)?))
}

/// Get the stock row of a SKU
pub async fn get_inventory_by_sku(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Inventory, Action::Read)?;

    let row = inventory_service(&state)
        .get_by_sku(user.organization_id, sku_id)
        .await?;

    visible(&user, Resource::Inventory, &row)
}

/// Override the weighted cost of a SKU's stock
pub async fn update_manual_cost(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, sku_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateManualCostInput>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Inventory, Action::Update)?;

    let row = inventory_service(&state)
        .update_manual_cost(user.organization_id, user.user_id, sku_id, input)
        .await?;

    visible(&user, Resource::Inventory, &row)
}

/// Organization-wide stock totals
pub async fn get_inventory_summary(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
) -> AppResult<Json<InventorySummary>> {
    user.require(Resource::Inventory, Action::Read)?;

    let summary = inventory_service(&state).summary(user.organization_id).await?;
    Ok(Json(summary))
}
