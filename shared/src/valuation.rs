//! Weighted-average-cost valuation
//!
//! Pure state transitions for a single inventory row. The backend loads the
//! row under a lock, calls into this module, and persists whatever comes back;
//! nothing here touches storage.
//!
//! Money arithmetic is checked: a product or sum outside the `Decimal` range
//! is reported as `ValueOverflow` instead of panicking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TransactionType;

/// Quantity and cost basis of one (organization, SKU) inventory row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub quantity: i32,
    pub weighted_cost: Decimal,
    pub total_value: Decimal,
    pub is_manual_cost: bool,
}

impl StockLevel {
    /// A fresh row. `total_value` is derived, never supplied.
    pub fn new(quantity: i32, weighted_cost: Decimal) -> Result<Self, ValuationError> {
        Ok(Self {
            quantity,
            weighted_cost,
            total_value: extended_cost(quantity, weighted_cost)?,
            is_manual_cost: false,
        })
    }

    /// Whether the denormalized total still equals quantity times cost
    pub fn is_consistent(&self) -> bool {
        extended_cost(self.quantity, self.weighted_cost).is_ok_and(|total| total == self.total_value)
    }
}

/// Reasons a movement or cost change is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("quantity must not be negative")]
    NegativeQuantity,

    #[error("cost must not be negative")]
    NegativeCost,

    #[error("no inventory record found")]
    NoInventoryRecord,

    #[error("have {available}, requested {requested}")]
    Insufficient { available: i32, requested: i32 },

    #[error("resulting quantity exceeds the supported range")]
    QuantityOverflow,

    #[error("resulting value exceeds the supported range")]
    ValueOverflow,
}

impl ValuationError {
    /// True for the stock-shortage cases, false for malformed input
    pub fn is_shortage(&self) -> bool {
        matches!(
            self,
            ValuationError::NoInventoryRecord | ValuationError::Insufficient { .. }
        )
    }
}

/// `quantity × unit_cost`, or `ValueOverflow` when it leaves the `Decimal` range
pub fn extended_cost(quantity: i32, unit_cost: Decimal) -> Result<Decimal, ValuationError> {
    Decimal::from(quantity)
        .checked_mul(unit_cost)
        .ok_or(ValuationError::ValueOverflow)
}

fn check_cost(cost: Decimal) -> Result<(), ValuationError> {
    if cost.is_sign_negative() && !cost.is_zero() {
        return Err(ValuationError::NegativeCost);
    }
    Ok(())
}

/// Opening balance for a SKU that has no inventory row yet
pub fn opening_stock(quantity: i32, weighted_cost: Decimal) -> Result<StockLevel, ValuationError> {
    if quantity < 0 {
        return Err(ValuationError::NegativeQuantity);
    }
    check_cost(weighted_cost)?;
    StockLevel::new(quantity, weighted_cost)
}

/// Compute the row that results from recording one movement.
///
/// `current` is `None` when the SKU has no inventory row. An `in` movement
/// then opens one at the movement's unit cost; an `out` movement is refused.
/// The manual-cost flag is carried over untouched.
pub fn apply_transaction(
    current: Option<&StockLevel>,
    kind: TransactionType,
    quantity: i32,
    unit_cost: Decimal,
) -> Result<StockLevel, ValuationError> {
    if quantity <= 0 {
        return Err(ValuationError::NonPositiveQuantity);
    }
    check_cost(unit_cost)?;

    match (kind, current) {
        (TransactionType::In, None) => StockLevel::new(quantity, unit_cost),
        (TransactionType::In, Some(level)) => {
            let new_quantity = level
                .quantity
                .checked_add(quantity)
                .ok_or(ValuationError::QuantityOverflow)?;

            let weighted_cost = if new_quantity == 0 {
                level.weighted_cost
            } else {
                let existing_value = extended_cost(level.quantity, level.weighted_cost)?;
                let incoming_value = extended_cost(quantity, unit_cost)?;
                existing_value
                    .checked_add(incoming_value)
                    .and_then(|value| value.checked_div(Decimal::from(new_quantity)))
                    .ok_or(ValuationError::ValueOverflow)?
            };

            Ok(StockLevel {
                quantity: new_quantity,
                weighted_cost,
                total_value: extended_cost(new_quantity, weighted_cost)?,
                is_manual_cost: level.is_manual_cost,
            })
        }
        (TransactionType::Out, None) => Err(ValuationError::NoInventoryRecord),
        (TransactionType::Out, Some(level)) => {
            if level.quantity < quantity {
                return Err(ValuationError::Insufficient {
                    available: level.quantity,
                    requested: quantity,
                });
            }
            let new_quantity = level.quantity - quantity;

            Ok(StockLevel {
                quantity: new_quantity,
                weighted_cost: level.weighted_cost,
                total_value: extended_cost(new_quantity, level.weighted_cost)?,
                is_manual_cost: level.is_manual_cost,
            })
        }
    }
}

/// Override the cost basis by hand. Quantity is kept, the flag is forced on.
pub fn apply_manual_cost(current: &StockLevel, weighted_cost: Decimal) -> Result<StockLevel, ValuationError> {
    check_cost(weighted_cost)?;

    Ok(StockLevel {
        quantity: current.quantity,
        weighted_cost,
        total_value: extended_cost(current.quantity, weighted_cost)?,
        is_manual_cost: true,
    })
}
