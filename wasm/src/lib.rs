//! WebAssembly module for the Stockroom platform
//!
//! Provides client-side computation for:
//! - Previewing a stock movement before it is submitted
//! - Permission checks for hiding controls the role cannot use
//! - Field visibility filtering of cached records
//! - Offline form validation

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{apply_manual_cost, apply_transaction, StockLevel};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Preview the stock row after a movement.
///
/// `current_json` is the row as returned by the API, or an empty string when
/// the SKU has no inventory yet. Returns the resulting row as JSON.
#[wasm_bindgen]
pub fn preview_transaction(
    current_json: &str,
    transaction_type: &str,
    quantity: i32,
    unit_cost: &str,
) -> Result<String, JsValue> {
    preview(current_json, transaction_type, quantity, unit_cost).map_err(|e| JsValue::from_str(&e))
}

/// Preview the stock row after a manual cost override
#[wasm_bindgen]
pub fn preview_manual_cost(current_json: &str, weighted_cost: &str) -> Result<String, JsValue> {
    preview_cost(current_json, weighted_cost).map_err(|e| JsValue::from_str(&e))
}

/// Whether a role may perform an action on a resource
#[wasm_bindgen]
pub fn check_permission(role: &str, resource: &str, action: &str) -> bool {
    shared::has_permission(role, resource, action)
}

/// Drop the fields of a record the role may not see
#[wasm_bindgen]
pub fn filter_visible_fields(role: &str, resource: &str, record_json: &str) -> Result<String, JsValue> {
    filter_record(role, resource, record_json).map_err(|e| JsValue::from_str(&e))
}

/// Whether a role's field rules let it edit one column of a resource
#[wasm_bindgen]
pub fn can_edit_field(role: &str, resource: &str, field: &str) -> bool {
    shared::field_visibility(role, resource).can_write(field)
}

/// Validate a SKU code, returning the problem or nothing
#[wasm_bindgen]
pub fn sku_code_error(code: &str) -> Option<String> {
    validate_sku_code(code).err().map(str::to_string)
}

/// Validate a required text input such as a product or user name
#[wasm_bindgen]
pub fn required_text_error(value: &str, max_chars: usize) -> Option<String> {
    validate_required_text(value, max_chars).err().map(str::to_string)
}

/// Validate an email address before it is submitted
#[wasm_bindgen]
pub fn email_error(email: &str) -> Option<String> {
    validate_email(email).err().map(str::to_string)
}

/// Validate a new password before it is submitted
#[wasm_bindgen]
pub fn password_error(password: &str) -> Option<String> {
    validate_password(password).err().map(str::to_string)
}

/// Built-in display name of a column, if one exists
#[wasm_bindgen]
pub fn default_field_label(table: &str, field_name: &str) -> Option<String> {
    shared::default_display_name(table, field_name).map(str::to_string)
}

fn parse_level(current_json: &str) -> Result<Option<StockLevel>, String> {
    if current_json.trim().is_empty() || current_json.trim() == "null" {
        return Ok(None);
    }
    serde_json::from_str(current_json)
        .map(Some)
        .map_err(|e| format!("Invalid inventory JSON: {}", e))
}

fn parse_cost(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid cost: {}", e))
}

fn preview(current_json: &str, transaction_type: &str, quantity: i32, unit_cost: &str) -> Result<String, String> {
    let current = parse_level(current_json)?;
    let kind: TransactionType = transaction_type.parse().map_err(|e: ParseEnumError| e.to_string())?;
    let cost = parse_cost(unit_cost)?;

    let next = apply_transaction(current.as_ref(), kind, quantity, cost).map_err(|e| e.to_string())?;
    serde_json::to_string(&next).map_err(|e| e.to_string())
}

fn preview_cost(current_json: &str, weighted_cost: &str) -> Result<String, String> {
    let current = parse_level(current_json)?.ok_or_else(|| "no inventory record found".to_string())?;
    let cost = parse_cost(weighted_cost)?;

    let next = apply_manual_cost(&current, cost).map_err(|e| e.to_string())?;
    serde_json::to_string(&next).map_err(|e| e.to_string())
}

fn filter_record(role: &str, resource: &str, record_json: &str) -> Result<String, String> {
    let record: serde_json::Value =
        serde_json::from_str(record_json).map_err(|e| format!("Invalid record JSON: {}", e))?;
    let visible = shared::field_visibility(role, resource).filter(record);
    serde_json::to_string(&visible).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn level(json: &str) -> StockLevel {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_preview_opens_stock() {
        let out = preview("", "in", 10, "5.00").unwrap();
        let next = level(&out);
        assert_eq!(next.quantity, 10);
        assert_eq!(next.weighted_cost, dec("5.00"));
        assert_eq!(next.total_value, dec("50.00"));
    }

    #[test]
    fn test_preview_blends_cost() {
        let opened = preview("null", "in", 10, "5").unwrap();
        let out = preview(&opened, "in", 10, "7").unwrap();
        let next = level(&out);
        assert_eq!(next.quantity, 20);
        assert_eq!(next.weighted_cost, dec("6"));
    }

    #[test]
    fn test_preview_rejects_shortage() {
        let opened = preview("", "in", 5, "2").unwrap();
        let err = preview(&opened, "out", 6, "2").unwrap_err();
        assert!(err.contains("requested 6"));
    }

    #[test]
    fn test_preview_rejects_value_overflow() {
        let err = preview("", "in", 10, &Decimal::MAX.to_string()).unwrap_err();
        assert!(err.contains("exceeds the supported range"));
    }

    #[test]
    fn test_preview_rejects_unknown_type() {
        assert!(preview("", "transfer", 1, "1").is_err());
    }

    #[test]
    fn test_preview_manual_cost_needs_row() {
        assert!(preview_cost("", "3").is_err());

        let opened = preview("", "in", 4, "2").unwrap();
        let next = level(&preview_cost(&opened, "3").unwrap());
        assert!(next.is_manual_cost);
        assert_eq!(next.total_value, dec("12"));
    }

    #[test]
    fn test_check_permission() {
        assert!(check_permission("admin", "users", "delete"));
        assert!(!check_permission("viewer", "skus", "create"));
        assert!(!check_permission("owner", "skus", "read"));
    }

    #[test]
    fn test_can_edit_field() {
        assert!(can_edit_field("user", "inventory", "quantity"));
        assert!(!can_edit_field("user", "inventory", "weighted_cost"));
        assert!(!can_edit_field("viewer", "inventory", "quantity"));
        assert!(!can_edit_field("nobody", "inventory", "quantity"));
    }

    #[test]
    fn test_sku_code_error() {
        assert!(sku_code_error("ABC-001").is_none());
        assert!(sku_code_error("").is_some());
    }

    #[test]
    fn test_form_errors() {
        assert!(required_text_error("Widget", 255).is_none());
        assert_eq!(required_text_error("  ", 255).as_deref(), Some("Value is required"));
        assert!(email_error("ops@example.com").is_none());
        assert!(email_error("ops@localhost").is_some());
        assert_eq!(
            password_error("short").as_deref(),
            Some("Password must be at least 8 characters")
        );
        assert!(password_error("longenough").is_none());
    }
}
