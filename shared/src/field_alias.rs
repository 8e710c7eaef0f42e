//! Default display labels for tenant-customizable fields

use serde::Serialize;

/// Tables whose columns can be relabelled per organization
pub const SUPPORTED_TABLES: [&str; 4] = ["skus", "inventory", "inventory_transactions", "users"];

/// Built-in label for one column
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DefaultField {
    pub field_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub sort_order: i32,
}

const fn field(field_name: &'static str, display_name: &'static str, description: &'static str, sort_order: i32) -> DefaultField {
    DefaultField {
        field_name,
        display_name,
        description,
        sort_order,
    }
}

const SKU_FIELDS: &[DefaultField] = &[
    field("sku_code", "SKU Code", "Unique product identifier", 1),
    field("product_name", "Product Name", "Name of the product", 2),
    field("description", "Description", "Product description", 3),
    field("category", "Category", "Product category", 4),
    field("supplier", "Supplier", "Product supplier", 5),
    field("barcode", "Barcode", "Scannable barcode", 6),
    field("is_active", "Active", "Whether the product is active", 7),
];

const INVENTORY_FIELDS: &[DefaultField] = &[
    field("quantity", "Stock Level", "Current stock quantity", 1),
    field("weighted_cost", "Avg Cost", "Weighted average unit cost", 2),
    field("total_value", "Total Value", "Quantity multiplied by average cost", 3),
    field("is_manual_cost", "Manual Cost", "Whether the cost was set by hand", 4),
];

const TRANSACTION_FIELDS: &[DefaultField] = &[
    field("transaction_type", "Type", "Stock in or stock out", 1),
    field("quantity", "Quantity", "Units moved", 2),
    field("unit_cost", "Unit Cost", "Cost per unit", 3),
    field("total_cost", "Total Cost", "Quantity multiplied by unit cost", 4),
    field("reference_number", "Reference", "External reference number", 5),
    field("notes", "Notes", "Free-text notes", 6),
    field("created_at", "Date", "When the movement was recorded", 7),
];

const USER_FIELDS: &[DefaultField] = &[
    field("name", "Full Name", "User's full name", 1),
    field("email", "Email", "Login email address", 2),
    field("role", "Role", "Access role", 3),
    field("is_active", "Status", "Whether the account is enabled", 4),
    field("last_login_at", "Last Login", "Most recent sign-in", 5),
];

pub fn is_supported_table(table: &str) -> bool {
    SUPPORTED_TABLES.contains(&table)
}

/// Built-in fields of a table, `None` for unsupported tables
pub fn default_fields(table: &str) -> Option<&'static [DefaultField]> {
    match table {
        "skus" => Some(SKU_FIELDS),
        "inventory" => Some(INVENTORY_FIELDS),
        "inventory_transactions" => Some(TRANSACTION_FIELDS),
        "users" => Some(USER_FIELDS),
        _ => None,
    }
}

/// Built-in label of one column, if it has one
pub fn default_display_name(table: &str, field_name: &str) -> Option<&'static str> {
    default_fields(table)?
        .iter()
        .find(|f| f.field_name == field_name)
        .map(|f| f.display_name)
}

/// Whether an alias renames a built-in column. Columns without a built-in
/// label never count.
pub fn is_custom_alias(table: &str, field_name: &str, display_name: &str) -> bool {
    default_display_name(table, field_name).is_some_and(|default| default != display_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_table_has_defaults() {
        for table in SUPPORTED_TABLES {
            let fields = default_fields(table).unwrap();
            assert!(!fields.is_empty());
            let mut orders: Vec<_> = fields.iter().map(|f| f.sort_order).collect();
            orders.dedup();
            assert_eq!(orders.len(), fields.len());
        }
    }

    #[test]
    fn test_unknown_table() {
        assert!(!is_supported_table("orders"));
        assert!(default_fields("orders").is_none());
    }

    #[test]
    fn test_custom_alias_detection() {
        assert!(!is_custom_alias("skus", "sku_code", "SKU Code"));
        assert!(is_custom_alias("skus", "sku_code", "Item #"));
        assert!(!is_custom_alias("skus", "color", "Color"));
        assert!(!is_custom_alias("warehouses", "sku_code", "Item #"));
    }
}
