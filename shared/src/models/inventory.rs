//! Stock movement models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Receipt: adds stock and blends the unit cost into the average
    In,
    /// Issue: removes stock at the current average cost
    Out,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "in",
            TransactionType::Out => "out",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(TransactionType::In),
            "out" => Ok(TransactionType::Out),
            other => Err(ParseEnumError::new("transaction type", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction_type() {
        assert_eq!("in".parse::<TransactionType>(), Ok(TransactionType::In));
        assert_eq!("out".parse::<TransactionType>(), Ok(TransactionType::Out));
        assert!("IN".parse::<TransactionType>().is_err());
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&TransactionType::Out).unwrap();
        assert_eq!(json, "\"out\"");
    }
}
