//! Inventory valuation tests
//!
//! Tests for weighted-average costing including:
//! - Opening balances and the first receipt
//! - Blended cost on receipts, unchanged cost on issues
//! - Shortage rejection leaving the row untouched
//! - Manual cost overrides

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_manual_cost, apply_transaction, opening_stock, StockLevel, TransactionType, ValuationError,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Receipts blend, a shortage is refused, an issue keeps the cost
    #[test]
    fn test_end_to_end_movements() {
        let row = opening_stock(0, Decimal::ZERO).unwrap();

        let row = apply_transaction(Some(&row), TransactionType::In, 10, dec("2.00")).unwrap();
        assert_eq!(row.quantity, 10);
        assert_eq!(row.weighted_cost, dec("2.00"));
        assert_eq!(row.total_value, dec("20.00"));

        let row = apply_transaction(Some(&row), TransactionType::In, 10, dec("4.00")).unwrap();
        assert_eq!(row.quantity, 20);
        assert_eq!(row.weighted_cost, dec("3.00"));
        assert_eq!(row.total_value, dec("60.00"));

        let err = apply_transaction(Some(&row), TransactionType::Out, 25, dec("3.00")).unwrap_err();
        assert_eq!(
            err,
            ValuationError::Insufficient {
                available: 20,
                requested: 25
            }
        );
        assert!(err.is_shortage());

        let row = apply_transaction(Some(&row), TransactionType::Out, 5, dec("3.00")).unwrap();
        assert_eq!(row.quantity, 15);
        assert_eq!(row.weighted_cost, dec("3.00"));
        assert_eq!(row.total_value, dec("45.00"));
    }

    /// First receipt for a SKU without a row opens one at the receipt cost
    #[test]
    fn test_receipt_without_row() {
        let row = apply_transaction(None, TransactionType::In, 4, dec("2.50")).unwrap();
        assert_eq!(row, StockLevel::new(4, dec("2.50")).unwrap());
        assert!(!row.is_manual_cost);
    }

    /// Issue against a SKU without a row
    #[test]
    fn test_issue_without_row() {
        let err = apply_transaction(None, TransactionType::Out, 1, dec("1")).unwrap_err();
        assert_eq!(err, ValuationError::NoInventoryRecord);
        assert!(err.is_shortage());
    }

    /// Issuing everything leaves zero stock at the last known cost
    #[test]
    fn test_issue_to_zero() {
        let row = StockLevel::new(8, dec("1.25")).unwrap();
        let row = apply_transaction(Some(&row), TransactionType::Out, 8, dec("1.25")).unwrap();
        assert_eq!(row.quantity, 0);
        assert_eq!(row.weighted_cost, dec("1.25"));
        assert_eq!(row.total_value, Decimal::ZERO);
    }

    /// Malformed input is not a shortage
    #[test]
    fn test_invalid_input() {
        let row = StockLevel::new(5, dec("1")).unwrap();

        let err = apply_transaction(Some(&row), TransactionType::In, 0, dec("1")).unwrap_err();
        assert_eq!(err, ValuationError::NonPositiveQuantity);
        assert!(!err.is_shortage());

        let err = apply_transaction(Some(&row), TransactionType::In, 1, dec("-0.01")).unwrap_err();
        assert_eq!(err, ValuationError::NegativeCost);

        assert_eq!(opening_stock(-1, dec("1")).unwrap_err(), ValuationError::NegativeQuantity);
    }

    /// Receipts that would overflow the quantity column are refused
    #[test]
    fn test_quantity_overflow() {
        let row = StockLevel::new(i32::MAX, dec("1")).unwrap();
        let err = apply_transaction(Some(&row), TransactionType::In, 1, dec("1")).unwrap_err();
        assert_eq!(err, ValuationError::QuantityOverflow);
    }

    /// Costs whose extended value leaves the Decimal range are refused, not panicked on
    #[test]
    fn test_value_overflow() {
        let err = apply_transaction(None, TransactionType::In, 10, Decimal::MAX).unwrap_err();
        assert_eq!(err, ValuationError::ValueOverflow);
        assert!(!err.is_shortage());

        let half = Decimal::MAX / Decimal::TWO;
        let row = StockLevel::new(1, half).unwrap();
        let err = apply_transaction(Some(&row), TransactionType::In, 2, half).unwrap_err();
        assert_eq!(err, ValuationError::ValueOverflow);

        assert_eq!(
            opening_stock(100, Decimal::MAX).unwrap_err(),
            ValuationError::ValueOverflow
        );
        assert!(StockLevel::new(2, Decimal::MAX).is_err());
    }

    /// A manual override sets the flag, and later receipts keep it
    #[test]
    fn test_manual_cost_override() {
        let row = StockLevel::new(10, dec("3")).unwrap();
        let row = apply_manual_cost(&row, dec("5")).unwrap();
        assert!(row.is_manual_cost);
        assert_eq!(row.total_value, dec("50"));

        let row = apply_transaction(Some(&row), TransactionType::In, 10, dec("7")).unwrap();
        assert!(row.is_manual_cost);
        assert_eq!(row.weighted_cost, dec("6"));
    }

    /// Zero cost is allowed
    #[test]
    fn test_zero_cost_receipt() {
        let row = StockLevel::new(10, dec("4")).unwrap();
        let row = apply_transaction(Some(&row), TransactionType::In, 10, Decimal::ZERO).unwrap();
        assert_eq!(row.weighted_cost, dec("2"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn cost_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn level_strategy() -> impl Strategy<Value = StockLevel> {
    (0i32..100_000, cost_strategy()).prop_map(|(quantity, cost)| StockLevel::new(quantity, cost).unwrap())
}

proptest! {
    /// Property: Receipt adds exactly its quantity and keeps the total consistent
    #[test]
    fn prop_receipt_accumulates(
        row in level_strategy(),
        quantity in 1i32..100_000,
        cost in cost_strategy(),
    ) {
        let next = apply_transaction(Some(&row), TransactionType::In, quantity, cost).unwrap();
        prop_assert_eq!(next.quantity, row.quantity + quantity);
        prop_assert!(next.is_consistent());
    }

    /// Property: Blended cost lies between the old cost and the receipt cost
    #[test]
    fn prop_blended_cost_is_bounded(
        row in level_strategy(),
        quantity in 1i32..100_000,
        cost in cost_strategy(),
    ) {
        let next = apply_transaction(Some(&row), TransactionType::In, quantity, cost).unwrap();
        let low = row.weighted_cost.min(cost);
        let high = row.weighted_cost.max(cost);
        let tolerance = dec("0.000001");
        prop_assert!(next.weighted_cost >= low - tolerance);
        prop_assert!(next.weighted_cost <= high + tolerance);
    }

    /// Property: Issues never drive stock negative and never move the cost
    #[test]
    fn prop_issue_never_negative(
        row in level_strategy(),
        quantity in 1i32..200_000,
    ) {
        match apply_transaction(Some(&row), TransactionType::Out, quantity, row.weighted_cost) {
            Ok(next) => {
                prop_assert!(quantity <= row.quantity);
                prop_assert!(next.quantity >= 0);
                prop_assert_eq!(next.quantity, row.quantity - quantity);
                prop_assert_eq!(next.weighted_cost, row.weighted_cost);
                prop_assert!(next.is_consistent());
            }
            Err(err) => {
                prop_assert!(quantity > row.quantity);
                prop_assert!(err.is_shortage());
            }
        }
    }

    /// Property: Manual cost keeps quantity and recomputes the total
    #[test]
    fn prop_manual_cost_consistent(
        row in level_strategy(),
        cost in cost_strategy(),
    ) {
        let next = apply_manual_cost(&row, cost).unwrap();
        prop_assert_eq!(next.quantity, row.quantity);
        prop_assert_eq!(next.weighted_cost, cost);
        prop_assert!(next.is_manual_cost);
        prop_assert!(next.is_consistent());
    }
}
