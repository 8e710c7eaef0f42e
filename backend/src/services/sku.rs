//! SKU service: the per-organization product catalogue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{check_patch_len, like_pattern, normalize_patch, ChangeLogService};
use crate::error::{AppError, AppResult};
use shared::{apply_patch, ChangeType, NewChangeLog, PaginatedResponse, Pagination};

/// SKU service
#[derive(Clone)]
pub struct SkuService {
    db: PgPool,
    change_logs: ChangeLogService,
}

/// A product definition
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Sku {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku_code: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub barcode: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a SKU
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSkuInput {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub sku_code: String,
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub product_name: String,
    pub description: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub category: Option<String>,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub supplier: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub barcode: Option<String>,
}

/// Input for updating a SKU. The code is fixed once created.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSkuInput {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub product_name: String,
    #[serde(default, deserialize_with = "shared::patch_field")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "shared::patch_field")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "shared::patch_field")]
    pub supplier: Option<Option<String>>,
    #[serde(default, deserialize_with = "shared::patch_field")]
    pub barcode: Option<Option<String>>,
}

/// Filters for the SKU list
#[derive(Debug, Default, Deserialize)]
pub struct SkuFilter {
    #[serde(default)]
    pub include_deactivated: bool,
    pub category: Option<String>,
    pub search: Option<String>,
}

const SKU_COLUMNS: &str = "id, organization_id, sku_code, product_name, description, category, \
                           supplier, barcode, is_active, created_at, updated_at";

const SKU_FILTER: &str = r#"
    WHERE organization_id = $1
      AND ($2 OR is_active)
      AND ($3::text IS NULL OR category = $3)
      AND ($4::text IS NULL
           OR sku_code ILIKE $4
           OR product_name ILIKE $4
           OR COALESCE(description, '') ILIKE $4)
"#;

impl SkuService {
    /// Create a new SkuService instance
    pub fn new(db: PgPool, change_logs: ChangeLogService) -> Self {
        Self { db, change_logs }
    }

    /// List SKUs, newest first. Deactivated SKUs only when asked for.
    pub async fn list(&self, org_id: Uuid, filter: SkuFilter, page: Pagination) -> AppResult<PaginatedResponse<Sku>> {
        let category = shared::normalize_optional(filter.category);
        let search = like_pattern(filter.search.as_deref());

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM skus {}", SKU_FILTER))
            .bind(org_id)
            .bind(filter.include_deactivated)
            .bind(&category)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let skus = sqlx::query_as::<_, Sku>(&format!(
            "SELECT {} FROM skus {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            SKU_COLUMNS, SKU_FILTER
        ))
        .bind(org_id)
        .bind(filter.include_deactivated)
        .bind(&category)
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(skus, page, total.max(0) as u64))
    }

    /// Get a SKU by ID
    pub async fn get(&self, org_id: Uuid, sku_id: Uuid) -> AppResult<Sku> {
        sqlx::query_as::<_, Sku>(&format!(
            "SELECT {} FROM skus WHERE organization_id = $1 AND id = $2",
            SKU_COLUMNS
        ))
        .bind(org_id)
        .bind(sku_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("SKU"))
    }

    /// Create a new SKU, active
    pub async fn create(&self, org_id: Uuid, actor_id: Uuid, input: CreateSkuInput) -> AppResult<Sku> {
        input.validate()?;
        shared::validate_sku_code(&input.sku_code).map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        let sku = sqlx::query_as::<_, Sku>(&format!(
            r#"
            INSERT INTO skus (organization_id, sku_code, product_name, description, category, supplier, barcode)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SKU_COLUMNS
        ))
        .bind(org_id)
        .bind(input.sku_code.trim())
        .bind(input.product_name.trim())
        .bind(shared::normalize_optional(input.description))
        .bind(shared::normalize_optional(input.category))
        .bind(shared::normalize_optional(input.supplier))
        .bind(shared::normalize_optional(input.barcode))
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "SKU code already exists"))?;

        tracing::info!(organization_id = %org_id, sku_id = %sku.id, sku_code = %sku.sku_code, "SKU created");

        self.change_logs
            .record_best_effort(
                org_id,
                NewChangeLog::sku(actor_id, sku.id, ChangeType::Create)
                    .with_reason(format!("Created SKU {}", sku.sku_code)),
            )
            .await;

        Ok(sku)
    }

    /// Update a SKU. Absent optional fields are left unchanged.
    pub async fn update(&self, org_id: Uuid, actor_id: Uuid, sku_id: Uuid, input: UpdateSkuInput) -> AppResult<Sku> {
        input.validate()?;
        check_patch_len("category", &input.category, 100)?;
        check_patch_len("supplier", &input.supplier, 255)?;
        check_patch_len("barcode", &input.barcode, 50)?;

        let existing = self.get(org_id, sku_id).await?;

        let product_name = input.product_name.trim().to_string();
        let description = apply_patch(existing.description.clone(), normalize_patch(input.description));
        let category = apply_patch(existing.category.clone(), normalize_patch(input.category));
        let supplier = apply_patch(existing.supplier.clone(), normalize_patch(input.supplier));
        let barcode = apply_patch(existing.barcode.clone(), normalize_patch(input.barcode));

        let sku = sqlx::query_as::<_, Sku>(&format!(
            r#"
            UPDATE skus
            SET product_name = $3, description = $4, category = $5, supplier = $6, barcode = $7,
                updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {}
            "#,
            SKU_COLUMNS
        ))
        .bind(org_id)
        .bind(sku_id)
        .bind(&product_name)
        .bind(&description)
        .bind(&category)
        .bind(&supplier)
        .bind(&barcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("SKU"))?;

        for (field, old, new) in changed_fields(&existing, &sku) {
            self.change_logs
                .record_best_effort(
                    org_id,
                    NewChangeLog::sku(actor_id, sku.id, ChangeType::Update).with_field(field, old, new),
                )
                .await;
        }

        Ok(sku)
    }

    /// Activate or deactivate a SKU
    pub async fn set_status(&self, org_id: Uuid, actor_id: Uuid, sku_id: Uuid, is_active: bool) -> AppResult<Sku> {
        let existing = self.get(org_id, sku_id).await?;

        let sku = sqlx::query_as::<_, Sku>(&format!(
            r#"
            UPDATE skus SET is_active = $3, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {}
            "#,
            SKU_COLUMNS
        ))
        .bind(org_id)
        .bind(sku_id)
        .bind(is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("SKU"))?;

        if existing.is_active != is_active {
            tracing::info!(organization_id = %org_id, sku_id = %sku_id, is_active, "SKU status changed");
            self.change_logs
                .record_best_effort(
                    org_id,
                    NewChangeLog::sku(actor_id, sku_id, ChangeType::for_status(is_active)).with_field(
                        "is_active",
                        Some(existing.is_active.to_string()),
                        Some(is_active.to_string()),
                    ),
                )
                .await;
        }

        Ok(sku)
    }

    /// Distinct categories in use, sorted
    pub async fn categories(&self, org_id: Uuid) -> AppResult<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT category FROM skus
            WHERE organization_id = $1 AND category IS NOT NULL
            ORDER BY category
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }
}

/// Fields whose value differs between two versions of a SKU
fn changed_fields(before: &Sku, after: &Sku) -> Vec<(&'static str, Option<String>, Option<String>)> {
    let pairs = [
        ("product_name", Some(before.product_name.clone()), Some(after.product_name.clone())),
        ("description", before.description.clone(), after.description.clone()),
        ("category", before.category.clone(), after.category.clone()),
        ("supplier", before.supplier.clone(), after.supplier.clone()),
        ("barcode", before.barcode.clone(), after.barcode.clone()),
    ];

    pairs.into_iter().filter(|(_, old, new)| old != new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku() -> Sku {
        Sku {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            sku_code: "COF-001".to_string(),
            product_name: "House Blend".to_string(),
            description: None,
            category: Some("beverages".to_string()),
            supplier: None,
            barcode: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_changed_fields() {
        let before = sku();
        let mut after = before.clone();
        after.category = None;
        after.product_name = "House Blend 1kg".to_string();

        let changes = changed_fields(&before, &after);
        let names: Vec<_> = changes.iter().map(|(f, _, _)| *f).collect();
        assert_eq!(names, vec!["product_name", "category"]);
        assert_eq!(changes[1].1, Some("beverages".to_string()));
        assert_eq!(changes[1].2, None);
    }

    #[test]
    fn test_create_input_validation() {
        let input: CreateSkuInput = serde_json::from_str(
            r#"{"sku_code": "", "product_name": "Beans"}"#,
        )
        .unwrap();
        assert!(input.validate().is_err());

        let input: CreateSkuInput = serde_json::from_str(
            r#"{"sku_code": "COF-001", "product_name": "Beans", "barcode": "123"}"#,
        )
        .unwrap();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_update_requires_product_name() {
        let parsed = serde_json::from_str::<UpdateSkuInput>(r#"{"category": "tea"}"#);
        assert!(parsed.is_err());
    }
}
