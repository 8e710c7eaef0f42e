//! Role permission tests
//!
//! Tests for access control including:
//! - Role grant tables
//! - Field visibility and response filtering
//! - Self-access exemption

use proptest::prelude::*;
use serde_json::json;
use shared::{
    field_visibility, has_permission, self_or_permission, Action, FieldAccess, PermissionTable, Resource, Role,
};
use uuid::Uuid;

// ============================================================================
// Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn resource_strategy() -> impl Strategy<Value = Resource> {
    prop::sample::select(Resource::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

// ============================================================================
// Role Grant Tests
// ============================================================================

#[cfg(test)]
mod role_grant_tests {
    use super::*;

    #[test]
    fn test_admin_manages_everything() {
        for resource in [Resource::Skus, Resource::Inventory, Resource::Transactions, Resource::Users] {
            for action in Action::ALL {
                assert!(has_permission("admin", resource.as_str(), action.as_str()));
            }
        }
        assert!(has_permission("admin", "logs", "create"));
        assert!(!has_permission("admin", "logs", "delete"));
    }

    #[test]
    fn test_manager_cannot_delete() {
        for resource in Resource::ALL {
            assert!(!has_permission("manager", resource.as_str(), "delete"));
        }
        assert!(has_permission("manager", "users", "read"));
        assert!(!has_permission("manager", "users", "create"));
    }

    #[test]
    fn test_user_role_limits() {
        assert!(has_permission("user", "skus", "update"));
        assert!(has_permission("user", "transactions", "create"));
        assert!(!has_permission("user", "transactions", "update"));
        assert!(!has_permission("user", "inventory", "create"));
        assert!(!has_permission("user", "users", "read"));
        assert!(!has_permission("user", "settings", "update"));
    }

    #[test]
    fn test_viewer_is_read_only() {
        for resource in Resource::ALL {
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert!(!has_permission("viewer", resource.as_str(), action.as_str()));
            }
        }
        assert!(has_permission("viewer", "skus", "read"));
    }

    #[test]
    fn test_unknown_names_are_denied() {
        assert!(!has_permission("owner", "skus", "read"));
        assert!(!has_permission("admin", "lots", "read"));
        assert!(!has_permission("admin", "skus", "approve"));
        assert!(!has_permission("ADMIN ", "skus", "read"));
    }

    #[test]
    fn test_self_access_exemption() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(self_or_permission(&me, &me, Role::Viewer, Resource::Users, Action::Read));
        assert!(!self_or_permission(&me, &other, Role::Viewer, Resource::Users, Action::Read));
        assert!(self_or_permission(&me, &other, Role::Manager, Resource::Users, Action::Read));
    }

    #[test]
    fn test_permission_listing_matches_grants() {
        let table = PermissionTable::global();
        for role in Role::ALL {
            for permission in table.permissions(role) {
                assert!(!permission.actions.is_empty());
                for action in permission.actions {
                    assert!(table.allows(role, permission.resource, action));
                }
            }
        }
    }
}

// ============================================================================
// Field Visibility Tests
// ============================================================================

#[cfg(test)]
mod field_visibility_tests {
    use super::*;

    #[test]
    fn test_manager_reads_manual_cost_flag() {
        let fields = field_visibility("manager", "inventory");
        assert_eq!(fields.access("is_manual_cost"), FieldAccess::Read);
        assert_eq!(fields.access("quantity"), FieldAccess::Write);
    }

    #[test]
    fn test_user_writes_quantity_only() {
        let fields = field_visibility("user", "inventory");
        assert!(fields.can_write("quantity"));
        assert!(!fields.can_write("weighted_cost"));
        assert!(fields.can_read("weighted_cost"));
    }

    #[test]
    fn test_hidden_users_are_stripped() {
        let fields = field_visibility("viewer", "users");
        let filtered = fields.filter(json!({ "id": "1", "email": "a@b.c" }));
        assert_eq!(filtered, json!({}));
    }

    #[test]
    fn test_arrays_filtered_per_item() {
        let fields = field_visibility("user", "users");
        let filtered = fields.filter(json!([{ "name": "a" }, { "name": "b" }]));
        assert_eq!(filtered, json!([{}, {}]));
    }

    #[test]
    fn test_no_rules_pass_through() {
        let fields = field_visibility("viewer", "logs");
        assert!(fields.is_empty());
        let body = json!({ "id": 1, "reason": "x" });
        assert_eq!(fields.filter(body.clone()), body);
    }

    #[test]
    fn test_unknown_role_has_no_rules() {
        assert!(field_visibility("owner", "skus").is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property: String and typed lookups agree
    #[test]
    fn prop_string_lookup_matches_typed(
        role in role_strategy(),
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let typed = PermissionTable::global().allows(role, resource, action);
        prop_assert_eq!(has_permission(role.as_str(), resource.as_str(), action.as_str()), typed);
    }

    /// Property: Any granted write implies read on the same resource
    #[test]
    fn prop_write_implies_read(
        role in role_strategy(),
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let table = PermissionTable::global();
        if table.allows(role, resource, action) {
            prop_assert!(table.allows(role, resource, Action::Read));
        }
    }

    /// Property: Filtering never adds fields and never keeps a hidden one
    #[test]
    fn prop_filter_only_removes(
        role in role_strategy(),
        resource in resource_strategy(),
        keys in prop::collection::btree_set("[a-z_]{1,12}", 0..8),
    ) {
        let fields = PermissionTable::global().fields(role, resource);
        let body: serde_json::Map<String, serde_json::Value> =
            keys.iter().map(|k| (k.clone(), json!(1))).collect();

        let filtered = fields.filter(serde_json::Value::Object(body));
        let filtered = filtered.as_object().unwrap();
        for key in filtered.keys() {
            prop_assert!(keys.contains(key));
            prop_assert!(fields.can_read(key));
        }
        for key in &keys {
            if fields.can_read(key) {
                prop_assert!(filtered.contains_key(key));
            }
        }
    }
}
