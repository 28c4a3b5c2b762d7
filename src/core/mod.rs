//! Core business logic - framework-agnostic ledger operations.
//!
//! Every operation takes the acting user and checks it against the scope
//! computed by [`visibility`] before touching any row. Money-moving operations
//! run inside a single database transaction.

pub mod cash_box;
pub mod client;
pub mod credit;
pub mod limit;
pub mod stats;
pub mod transaction;
pub mod user;
pub mod visibility;

use crate::errors::{Error, Result};
use serde::Deserialize;

/// Tolerance used when comparing money amounts.
pub const EPSILON: f64 = 1e-9;

/// Offset pagination for list operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Page {
    /// Rows to skip
    pub skip: u64,
    /// Maximum rows to return
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
        }
    }
}

/// Rejects zero, negative and non-finite amounts.
pub(crate) fn require_positive(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount { amount })
    }
}

/// Trims an optional string and drops it when empty.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert!(require_positive(0.01).is_ok());
        assert!(matches!(
            require_positive(0.0),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(require_positive(-5.0).is_err());
        assert!(require_positive(f64::NAN).is_err());
        assert!(require_positive(f64::INFINITY).is_err());
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Some("  Lima ".to_string())), Some("Lima".to_string()));
        assert_eq!(clean(Some("   ".to_string())), None);
        assert_eq!(clean(None), None);
    }
}
