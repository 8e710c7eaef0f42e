//! Inventory service: stock levels and their cost basis
//!
//! Rows are only ever rewritten from a `StockLevel` computed by
//! `shared::valuation`, which keeps `total_value == quantity * weighted_cost`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{like_pattern, ChangeLogService};
use crate::error::{AppError, AppResult};
use shared::{ChangeType, NewChangeLog, PaginatedResponse, Pagination, StockLevel};

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    change_logs: ChangeLogService,
}

/// One stock row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Inventory {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i32,
    pub weighted_cost: Decimal,
    pub total_value: Decimal,
    pub is_manual_cost: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    pub fn level(&self) -> StockLevel {
        StockLevel {
            quantity: self.quantity,
            weighted_cost: self.weighted_cost,
            total_value: self.total_value,
            is_manual_cost: self.is_manual_cost,
        }
    }
}

/// Stock row joined with its SKU
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryWithSku {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i32,
    pub weighted_cost: Decimal,
    pub total_value: Decimal,
    pub is_manual_cost: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sku_code: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub barcode: Option<String>,
    pub is_active: bool,
}

/// Input for opening a stock row
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryInput {
    pub sku_id: Uuid,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub quantity: i32,
    pub weighted_cost: Decimal,
}

/// Input for overriding the cost basis
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateManualCostInput {
    pub weighted_cost: Decimal,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Filters for the inventory list
#[derive(Debug, Default, Deserialize)]
pub struct InventoryFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Organization-wide stock totals
#[derive(Debug, Serialize, FromRow)]
pub struct InventorySummary {
    pub total_skus: i64,
    pub total_quantity: i64,
    pub total_value: Decimal,
    pub manual_cost_count: i64,
}

const INVENTORY_COLUMNS: &str = "id, organization_id, sku_id, quantity, weighted_cost, total_value, \
                                 is_manual_cost, created_at, updated_at";

const SELECT_WITH_SKU: &str = r#"
    SELECT i.id, i.organization_id, i.sku_id, i.quantity, i.weighted_cost, i.total_value,
           i.is_manual_cost, i.created_at, i.updated_at,
           s.sku_code, s.product_name, s.description, s.category, s.supplier, s.barcode, s.is_active
    FROM inventory i
    JOIN skus s ON s.id = i.sku_id AND s.organization_id = i.organization_id
"#;

const LIST_FILTER: &str = r#"
    WHERE i.organization_id = $1
      AND s.is_active
      AND ($2::text IS NULL OR s.category = $2)
      AND ($3::text IS NULL
           OR s.sku_code ILIKE $3
           OR s.product_name ILIKE $3
           OR COALESCE(s.description, '') ILIKE $3)
"#;

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool, change_logs: ChangeLogService) -> Self {
        Self { db, change_logs }
    }

    /// List stock rows of active SKUs, newest first
    pub async fn list(
        &self,
        org_id: Uuid,
        filter: InventoryFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<InventoryWithSku>> {
        let category = shared::normalize_optional(filter.category);
        let search = like_pattern(filter.search.as_deref());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*) FROM inventory i
            JOIN skus s ON s.id = i.sku_id AND s.organization_id = i.organization_id
            {}
            "#,
            LIST_FILTER
        ))
        .bind(org_id)
        .bind(&category)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, InventoryWithSku>(&format!(
            "{} {} ORDER BY i.created_at DESC LIMIT $4 OFFSET $5",
            SELECT_WITH_SKU, LIST_FILTER
        ))
        .bind(org_id)
        .bind(&category)
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, page, total.max(0) as u64))
    }

    /// Get the stock row of one SKU
    pub async fn get_by_sku(&self, org_id: Uuid, sku_id: Uuid) -> AppResult<InventoryWithSku> {
        sqlx::query_as::<_, InventoryWithSku>(&format!(
            "{} WHERE i.organization_id = $1 AND i.sku_id = $2",
            SELECT_WITH_SKU
        ))
        .bind(org_id)
        .bind(sku_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory"))
    }

    /// Open a stock row for a SKU that has none
    pub async fn create(&self, org_id: Uuid, actor_id: Uuid, input: CreateInventoryInput) -> AppResult<InventoryWithSku> {
        input.validate()?;
        let level = shared::opening_stock(input.quantity, input.weighted_cost)?;

        let sku_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM skus WHERE organization_id = $1 AND id = $2)",
        )
        .bind(org_id)
        .bind(input.sku_id)
        .fetch_one(&self.db)
        .await?;
        if !sku_exists {
            return Err(AppError::not_found("SKU"));
        }

        let mut conn = self.db.acquire().await?;
        let row = insert_level(&mut *conn, org_id, input.sku_id, &level)
            .await
            .map_err(|e| match e {
                AppError::Database(err) => {
                    AppError::on_unique_violation(err, "inventory record already exists for this SKU")
                }
                other => other,
            })?;
        drop(conn);

        tracing::info!(organization_id = %org_id, sku_id = %input.sku_id, quantity = level.quantity, "inventory opened");

        self.change_logs
            .record_best_effort(
                org_id,
                NewChangeLog::inventory(actor_id, row.id, row.sku_id, ChangeType::Create).with_metadata(
                    serde_json::json!({
                        "quantity": row.quantity,
                        "weighted_cost": row.weighted_cost,
                    }),
                ),
            )
            .await;

        self.get_by_sku(org_id, row.sku_id).await
    }

    /// Override the weighted cost by hand. Quantity is untouched and the row
    /// is flagged as manually costed until a later override.
    pub async fn update_manual_cost(
        &self,
        org_id: Uuid,
        actor_id: Uuid,
        sku_id: Uuid,
        input: UpdateManualCostInput,
    ) -> AppResult<InventoryWithSku> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current = lock_for_update(&mut *tx, org_id, sku_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory"))?;
        let level = shared::apply_manual_cost(&current.level(), input.weighted_cost)?;
        let updated = update_level(&mut *tx, current.id, &level).await?;

        tx.commit().await?;

        tracing::info!(
            organization_id = %org_id,
            sku_id = %sku_id,
            old_cost = %current.weighted_cost,
            new_cost = %updated.weighted_cost,
            "manual cost applied"
        );

        let mut entry = NewChangeLog::inventory(actor_id, updated.id, sku_id, ChangeType::ManualCostUpdate)
            .with_field(
                "weighted_cost",
                Some(current.weighted_cost.to_string()),
                Some(updated.weighted_cost.to_string()),
            );
        if let Some(reason) = shared::normalize_optional(input.reason) {
            entry = entry.with_reason(reason);
        }
        self.change_logs.record_best_effort(org_id, entry).await;

        self.get_by_sku(org_id, sku_id).await
    }

    /// Totals over stock rows of active SKUs
    pub async fn summary(&self, org_id: Uuid) -> AppResult<InventorySummary> {
        let summary = sqlx::query_as::<_, InventorySummary>(
            r#"
            SELECT COUNT(*) AS total_skus,
                   COALESCE(SUM(i.quantity), 0)::BIGINT AS total_quantity,
                   COALESCE(SUM(i.total_value), 0) AS total_value,
                   COUNT(*) FILTER (WHERE i.is_manual_cost) AS manual_cost_count
            FROM inventory i
            JOIN skus s ON s.id = i.sku_id AND s.organization_id = i.organization_id
            WHERE i.organization_id = $1 AND s.is_active
            "#,
        )
        .bind(org_id)
        .fetch_one(&self.db)
        .await?;

        Ok(summary)
    }
}

// ============================================================================
// Row access shared with the transaction service
// ============================================================================

/// Load the stock row of a SKU and hold its lock until the surrounding
/// database transaction ends
pub(crate) async fn lock_for_update(conn: &mut PgConnection, org_id: Uuid, sku_id: Uuid) -> AppResult<Option<Inventory>> {
    let row = sqlx::query_as::<_, Inventory>(&format!(
        "SELECT {} FROM inventory WHERE organization_id = $1 AND sku_id = $2 FOR UPDATE",
        INVENTORY_COLUMNS
    ))
    .bind(org_id)
    .bind(sku_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub(crate) async fn insert_level(conn: &mut PgConnection, org_id: Uuid, sku_id: Uuid, level: &StockLevel) -> AppResult<Inventory> {
    let row = sqlx::query_as::<_, Inventory>(&format!(
        r#"
        INSERT INTO inventory (organization_id, sku_id, quantity, weighted_cost, total_value, is_manual_cost)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        INVENTORY_COLUMNS
    ))
    .bind(org_id)
    .bind(sku_id)
    .bind(level.quantity)
    .bind(level.weighted_cost)
    .bind(level.total_value)
    .bind(level.is_manual_cost)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

pub(crate) async fn update_level(conn: &mut PgConnection, inventory_id: Uuid, level: &StockLevel) -> AppResult<Inventory> {
    let row = sqlx::query_as::<_, Inventory>(&format!(
        r#"
        UPDATE inventory
        SET quantity = $2, weighted_cost = $3, total_value = $4, is_manual_cost = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        INVENTORY_COLUMNS
    ))
    .bind(inventory_id)
    .bind(level.quantity)
    .bind(level.weighted_cost)
    .bind(level.total_value)
    .bind(level.is_manual_cost)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}
