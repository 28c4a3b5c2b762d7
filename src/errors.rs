//! Unified error type for the ledger.
//!
//! Every operation returns [`Result`]; the HTTP layer maps each variant to a
//! status code in [`crate::api::error`].

use thiserror::Error;

/// All failures surfaced by the ledger and its ambient layers.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row that was looked up ("user", "client", ...)
        entity: &'static str,
        /// The identifier that was looked up
        id: i64,
    },

    /// The actor's scope excludes the target, or the role may not perform the action.
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Human-readable explanation
        reason: String,
    },

    /// No authenticated actor was supplied, or the actor is inactive.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed or missing input.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Amount is zero, negative, or not finite where a positive amount is required.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A PAYMENT was submitted without a credit.
    #[error("A payment must reference a credit")]
    CreditRequired,

    /// A box debit exceeds the available balance.
    #[error("Insufficient funds: balance {current:.2}, required {required:.2}")]
    InsufficientFunds {
        /// Balance at the time of the attempt
        current: f64,
        /// Amount the operation needed
        required: f64,
    },

    /// A payment exceeds the credit's outstanding balance.
    #[error("Payment of {requested:.2} exceeds remaining balance {remaining:.2}")]
    AmountExceedsBalance {
        /// Outstanding balance on the credit
        remaining: f64,
        /// Payment amount requested
        requested: f64,
    },

    /// Uniqueness or referential conflict (duplicate DNI, username, ...).
    #[error("Conflict: {message}")]
    Conflict {
        /// What conflicted
        message: String,
    },

    /// Password hashing failed.
    #[error("Password hashing failed: {message}")]
    Hashing {
        /// Details from the hasher
        message: String,
    },

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Details of the failure
        message: String,
    },

    /// Database driver or ORM error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::PermissionDenied`] with the given reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Conflict`] with the given message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
