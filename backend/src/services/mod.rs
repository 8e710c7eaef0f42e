//! Business logic services for the Stockroom platform
//!
//! Every service is tenant-scoped: each query filters on the organization id
//! the handler resolved from the caller's token.

pub mod auth;
pub mod change_log;
pub mod field_alias;
pub mod inventory;
pub mod sku;
pub mod transaction;
pub mod user;

pub use auth::AuthService;
pub use change_log::ChangeLogService;
pub use field_alias::FieldAliasService;
pub use inventory::InventoryService;
pub use sku::SkuService;
pub use transaction::TransactionService;
pub use user::UserService;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, AppResult};

/// Case-insensitive substring pattern for `ILIKE`, with wildcards escaped
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

/// Check a nullable text field of a partial update against a length bound
pub(crate) fn check_patch_len(field: &str, patch: &Option<Option<String>>, max_chars: usize) -> AppResult<()> {
    match patch {
        Some(Some(value)) if value.chars().count() > max_chars => Err(AppError::InvalidArgument(format!(
            "validation failed: {} must be at most {} characters",
            field, max_chars
        ))),
        _ => Ok(()),
    }
}

/// Trim a patch value, turning blank strings into an explicit clear
pub(crate) fn normalize_patch(patch: Option<Option<String>>) -> Option<Option<String>> {
    patch.map(shared::normalize_optional)
}

/// Midnight UTC at the start of a calendar day
pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Half-open timestamp range covering two inclusive calendar dates
pub(crate) fn day_bounds(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> AppResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(AppError::InvalidArgument(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }

    let since = start.map(start_of_day);
    let until = end.and_then(|d| d.succ_opt()).map(start_of_day);
    Ok((since, until))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
        assert_eq!(like_pattern(Some("  bean ")), Some("%bean%".to_string()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }

    #[test]
    fn test_check_patch_len() {
        assert!(check_patch_len("category", &None, 3).is_ok());
        assert!(check_patch_len("category", &Some(None), 3).is_ok());
        assert!(check_patch_len("category", &Some(Some("abc".into())), 3).is_ok());
        assert!(check_patch_len("category", &Some(Some("abcd".into())), 3).is_err());
    }

    #[test]
    fn test_day_bounds_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1);
        let end = NaiveDate::from_ymd_opt(2024, 3, 31);
        let (since, until) = day_bounds(start, end).unwrap();
        assert_eq!(since.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(until.unwrap().to_rfc3339(), "2024-04-01T00:00:00+00:00");

        assert!(day_bounds(end, start).is_err());
        assert_eq!(day_bounds(None, None).unwrap(), (None, None));
    }

    #[test]
    fn test_normalize_patch() {
        assert_eq!(normalize_patch(Some(Some("  ".into()))), Some(None));
        assert_eq!(normalize_patch(None), None);
    }
}

/// Scratch-database fixtures for the `#[ignore]`d service tests.
///
/// Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::ChangeLogService;
    use crate::config::ChangeLogConfig;

    pub async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
        pool
    }

    pub fn change_logs(pool: &PgPool) -> ChangeLogService {
        ChangeLogService::new(
            pool.clone(),
            ChangeLogConfig {
                default_window_days: 30,
                summary_top_users: 5,
                summary_recent: 10,
            },
        )
    }

    /// A fresh organization with one admin, returned as `(org_id, user_id)`
    pub async fn seed_org(pool: &PgPool) -> (Uuid, Uuid) {
        let org_id: Uuid = sqlx::query_scalar("INSERT INTO organizations (name) VALUES ('Service Test') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (organization_id, email, name, role) VALUES ($1, $2, 'Tester', 'admin') RETURNING id",
        )
        .bind(org_id)
        .bind(format!("{}@example.com", Uuid::new_v4().simple()))
        .fetch_one(pool)
        .await
        .unwrap();
        (org_id, user_id)
    }

    /// Insert a bare SKU row, returning its id
    pub async fn seed_sku(pool: &PgPool, org_id: Uuid) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO skus (organization_id, sku_code, product_name) VALUES ($1, $2, 'Widget') RETURNING id",
        )
        .bind(org_id)
        .bind(format!("T-{}", Uuid::new_v4().simple()))
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
