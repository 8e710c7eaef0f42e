//! Audit trail vocabulary
//!
//! Entity and change kinds are closed sets; anything else is rejected before
//! a row is ever written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ParseEnumError, TransactionType};

/// Kinds of entity that carry an audit trail
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Sku,
    Inventory,
    Transaction,
    User,
    FieldAlias,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Sku,
        EntityType::Inventory,
        EntityType::Transaction,
        EntityType::User,
        EntityType::FieldAlias,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Sku => "sku",
            EntityType::Inventory => "inventory",
            EntityType::Transaction => "transaction",
            EntityType::User => "user",
            EntityType::FieldAlias => "field_alias",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("entity type", s))
    }
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Activate,
    Deactivate,
    ManualCostUpdate,
}

impl ChangeType {
    pub const ALL: [ChangeType; 6] = [
        ChangeType::Create,
        ChangeType::Update,
        ChangeType::Delete,
        ChangeType::Activate,
        ChangeType::Deactivate,
        ChangeType::ManualCostUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
            ChangeType::Activate => "activate",
            ChangeType::Deactivate => "deactivate",
            ChangeType::ManualCostUpdate => "manual_cost_update",
        }
    }

    /// Status toggle kind for an `is_active` value
    pub fn for_status(is_active: bool) -> Self {
        if is_active {
            ChangeType::Activate
        } else {
            ChangeType::Deactivate
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("change type", s))
    }
}

/// An audit entry waiting to be appended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewChangeLog {
    pub user_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub change_type: ChangeType,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

impl NewChangeLog {
    pub fn new(user_id: Uuid, entity_type: EntityType, entity_id: Option<Uuid>, change_type: ChangeType) -> Self {
        Self {
            user_id,
            entity_type,
            entity_id,
            sku_id: None,
            change_type,
            field_name: None,
            old_value: None,
            new_value: None,
            reason: None,
            metadata: None,
        }
    }

    /// SKU entries index under both the entity and the SKU column
    pub fn sku(user_id: Uuid, sku_id: Uuid, change_type: ChangeType) -> Self {
        Self {
            sku_id: Some(sku_id),
            ..Self::new(user_id, EntityType::Sku, Some(sku_id), change_type)
        }
    }

    pub fn inventory(user_id: Uuid, inventory_id: Uuid, sku_id: Uuid, change_type: ChangeType) -> Self {
        Self {
            sku_id: Some(sku_id),
            ..Self::new(user_id, EntityType::Inventory, Some(inventory_id), change_type)
        }
    }

    /// Movements are only ever created
    pub fn transaction(user_id: Uuid, transaction_id: Uuid, sku_id: Uuid) -> Self {
        Self {
            sku_id: Some(sku_id),
            ..Self::new(user_id, EntityType::Transaction, Some(transaction_id), ChangeType::Create)
        }
    }

    pub fn user(user_id: Uuid, target_user_id: Uuid, change_type: ChangeType) -> Self {
        Self::new(user_id, EntityType::User, Some(target_user_id), change_type)
    }

    pub fn field_alias(user_id: Uuid, alias_id: Option<Uuid>, change_type: ChangeType) -> Self {
        Self::new(user_id, EntityType::FieldAlias, alias_id, change_type)
    }

    pub fn with_field(
        mut self,
        field_name: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field_name = Some(field_name.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Reason line recorded for a stock movement, e.g. `OUT transaction - 5 units: damaged`
pub fn transaction_reason(kind: TransactionType, quantity: i32, notes: Option<&str>) -> String {
    let direction = kind.as_str().to_uppercase();
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{} transaction - {} units: {}", direction, quantity, notes),
        None => format!("{} transaction - {} units", direction, quantity),
    }
}
