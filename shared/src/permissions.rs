//! Role-based access control
//!
//! Capabilities are static: each role maps to a fixed set of
//! (resource, action) grants and a per-resource field visibility map. The
//! tables are assembled once, on first use, and read concurrently after that.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ParseEnumError, Role};

/// Resources guarded by the permission model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Skus,
    Inventory,
    Transactions,
    Users,
    Settings,
    Logs,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Skus,
        Resource::Inventory,
        Resource::Transactions,
        Resource::Users,
        Resource::Settings,
        Resource::Logs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Skus => "skus",
            Resource::Inventory => "inventory",
            Resource::Transactions => "transactions",
            Resource::Users => "users",
            Resource::Settings => "settings",
            Resource::Logs => "logs",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("resource", s))
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("action", s))
    }
}

/// Field-level access for one field of a resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldAccess {
    Read,
    Write,
    Hidden,
}

/// A grant of several actions on one resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

// ============================================================================
// Static role tables
// ============================================================================

const CRUD: &[Action] = &[Action::Read, Action::Create, Action::Update, Action::Delete];
const CRU: &[Action] = &[Action::Read, Action::Create, Action::Update];
const RC: &[Action] = &[Action::Read, Action::Create];
const RU: &[Action] = &[Action::Read, Action::Update];
const R: &[Action] = &[Action::Read];

type GrantTable = &'static [(Resource, &'static [Action])];
type FieldTable = &'static [(Resource, &'static [(&'static str, FieldAccess)])];

fn grant_table(role: Role) -> GrantTable {
    match role {
        Role::Admin => &[
            (Resource::Skus, CRUD),
            (Resource::Inventory, CRUD),
            (Resource::Transactions, CRUD),
            (Resource::Users, CRUD),
            (Resource::Settings, RU),
            (Resource::Logs, RC),
        ],
        Role::Manager => &[
            (Resource::Skus, CRU),
            (Resource::Inventory, CRU),
            (Resource::Transactions, CRU),
            (Resource::Users, R),
            (Resource::Settings, RU),
            (Resource::Logs, R),
        ],
        Role::User => &[
            (Resource::Skus, CRU),
            (Resource::Inventory, RU),
            (Resource::Transactions, RC),
            (Resource::Logs, R),
        ],
        Role::Viewer => &[
            (Resource::Skus, R),
            (Resource::Inventory, R),
            (Resource::Transactions, R),
            (Resource::Logs, R),
        ],
    }
}

fn field_table(role: Role) -> FieldTable {
    use FieldAccess::{Hidden, Read, Write};

    match role {
        Role::Admin => &[
            (Resource::Skus, &[("*", Write)]),
            (Resource::Inventory, &[("*", Write)]),
            (Resource::Transactions, &[("*", Write)]),
            (Resource::Users, &[("*", Write)]),
        ],
        Role::Manager => &[
            (Resource::Skus, &[("*", Write)]),
            (Resource::Inventory, &[("*", Write), ("is_manual_cost", Read)]),
            (Resource::Transactions, &[("*", Write)]),
            (Resource::Users, &[("*", Read)]),
        ],
        Role::User => &[
            (
                Resource::Skus,
                &[("*", Write), ("created_at", Read), ("updated_at", Read)],
            ),
            (Resource::Inventory, &[("*", Read), ("quantity", Write)]),
            (Resource::Transactions, &[("*", Write), ("created_by", Read)]),
            (Resource::Users, &[("*", Hidden)]),
        ],
        Role::Viewer => &[
            (Resource::Skus, &[("*", Read)]),
            (Resource::Inventory, &[("*", Read)]),
            (Resource::Transactions, &[("*", Read)]),
            (Resource::Users, &[("*", Hidden)]),
        ],
    }
}

// ============================================================================
// Lookup table
// ============================================================================

/// Field visibility for one role on one resource.
///
/// An empty map means the role has no field rules for the resource and
/// responses pass through unfiltered.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldPermissions(BTreeMap<String, FieldAccess>);

impl FieldPermissions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact entry, then the `*` wildcard, then `read`
    pub fn access(&self, field: &str) -> FieldAccess {
        self.0
            .get(field)
            .or_else(|| self.0.get("*"))
            .copied()
            .unwrap_or(FieldAccess::Read)
    }

    pub fn can_read(&self, field: &str) -> bool {
        self.access(field) != FieldAccess::Hidden
    }

    pub fn can_write(&self, field: &str) -> bool {
        self.access(field) == FieldAccess::Write
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, FieldAccess)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Remove hidden fields from a JSON object, or from every object in an array
    pub fn filter(&self, value: Value) -> Value {
        if self.is_empty() {
            return value;
        }

        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(field, _)| self.can_read(field))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.filter(v)).collect()),
            other => other,
        }
    }
}

struct RoleCapabilities {
    grants: HashSet<(Resource, Action)>,
    fields: HashMap<Resource, FieldPermissions>,
}

/// The immutable role → capability catalogue
pub struct PermissionTable {
    roles: HashMap<Role, RoleCapabilities>,
}

impl PermissionTable {
    fn build() -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| {
                let grants = grant_table(role)
                    .iter()
                    .flat_map(|(resource, actions)| actions.iter().map(move |a| (*resource, *a)))
                    .collect();

                let fields = field_table(role)
                    .iter()
                    .map(|(resource, entries)| {
                        let map = entries
                            .iter()
                            .map(|(field, access)| (field.to_string(), *access))
                            .collect();
                        (*resource, FieldPermissions(map))
                    })
                    .collect();

                (role, RoleCapabilities { grants, fields })
            })
            .collect();

        Self { roles }
    }

    /// The process-wide table
    pub fn global() -> &'static PermissionTable {
        static TABLE: OnceLock<PermissionTable> = OnceLock::new();
        TABLE.get_or_init(PermissionTable::build)
    }

    pub fn allows(&self, role: Role, resource: Resource, action: Action) -> bool {
        self.roles
            .get(&role)
            .is_some_and(|caps| caps.grants.contains(&(resource, action)))
    }

    pub fn fields(&self, role: Role, resource: Resource) -> FieldPermissions {
        self.roles
            .get(&role)
            .and_then(|caps| caps.fields.get(&resource))
            .cloned()
            .unwrap_or_default()
    }

    /// Grants of a role in stable resource/action order
    pub fn permissions(&self, role: Role) -> Vec<Permission> {
        let Some(caps) = self.roles.get(&role) else {
            return Vec::new();
        };

        Resource::ALL
            .into_iter()
            .filter_map(|resource| {
                let actions: Vec<Action> = Action::ALL
                    .into_iter()
                    .filter(|a| caps.grants.contains(&(resource, *a)))
                    .collect();
                (!actions.is_empty()).then_some(Permission { resource, actions })
            })
            .collect()
    }

    /// Field maps of a role for every resource that has one
    pub fn all_fields(&self, role: Role) -> BTreeMap<Resource, FieldPermissions> {
        self.roles
            .get(&role)
            .map(|caps| caps.fields.iter().map(|(r, f)| (*r, f.clone())).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// String-keyed entry points
// ============================================================================

/// Whether `role` may perform `action` on `resource`. Unknown names are denied.
pub fn has_permission(role: &str, resource: &str, action: &str) -> bool {
    match (role.parse::<Role>(), resource.parse::<Resource>(), action.parse::<Action>()) {
        (Ok(role), Ok(resource), Ok(action)) => PermissionTable::global().allows(role, resource, action),
        _ => false,
    }
}

/// Field visibility of `role` on `resource`; empty when either name is unknown
pub fn field_visibility(role: &str, resource: &str) -> FieldPermissions {
    match (role.parse::<Role>(), resource.parse::<Resource>()) {
        (Ok(role), Ok(resource)) => PermissionTable::global().fields(role, resource),
        _ => FieldPermissions::default(),
    }
}

/// Acting on one's own record is always allowed; anything else needs the grant
pub fn self_or_permission<Id: PartialEq>(
    caller: &Id,
    target: &Id,
    role: Role,
    resource: Resource,
    action: Action,
) -> bool {
    caller == target || PermissionTable::global().allows(role, resource, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_grants() {
        assert!(has_permission("admin", "users", "delete"));
        assert!(!has_permission("viewer", "users", "read"));
        assert!(!has_permission("manager", "skus", "delete"));
        assert!(has_permission("user", "transactions", "create"));
        assert!(!has_permission("user", "transactions", "update"));
    }

    #[test]
    fn test_unknown_names_denied() {
        assert!(!has_permission("unknown_role", "skus", "read"));
        assert!(!has_permission("admin", "warehouses", "read"));
        assert!(!has_permission("admin", "skus", "export"));
    }

    #[test]
    fn test_field_visibility_fallbacks() {
        let fields = field_visibility("manager", "inventory");
        assert_eq!(fields.access("is_manual_cost"), FieldAccess::Read);
        assert_eq!(fields.access("quantity"), FieldAccess::Write);

        let none = field_visibility("manager", "logs");
        assert!(none.is_empty());
        assert_eq!(none.access("anything"), FieldAccess::Read);
    }

    #[test]
    fn test_filter_drops_hidden() {
        let fields = field_visibility("viewer", "users");
        let filtered = fields.filter(json!({"id": 1, "email": "a@b.co"}));
        assert_eq!(filtered, json!({}));

        let open = field_visibility("admin", "users");
        let row = json!([{"id": 1, "email": "a@b.co"}]);
        assert_eq!(open.filter(row.clone()), row);
    }

    #[test]
    fn test_self_or_permission() {
        assert!(self_or_permission(&7, &7, Role::Viewer, Resource::Users, Action::Read));
        assert!(!self_or_permission(&7, &8, Role::Viewer, Resource::Users, Action::Read));
        assert!(self_or_permission(&7, &8, Role::Manager, Resource::Users, Action::Read));
    }

    #[test]
    fn test_permissions_listing_is_ordered() {
        let perms = PermissionTable::global().permissions(Role::User);
        let resources: Vec<_> = perms.iter().map(|p| p.resource).collect();
        assert_eq!(
            resources,
            vec![Resource::Skus, Resource::Inventory, Resource::Transactions, Resource::Logs]
        );
        assert_eq!(perms[1].actions, vec![Action::Read, Action::Update]);
    }
}
