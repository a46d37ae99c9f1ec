//! Error classification shared across the workspace
//!
//! Detailed error enums live next to the code that raises them; each of them
//! reports one of the coarse [`ErrorKind`]s below so callers can branch on
//! the class of failure without matching every variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse failure class reported by every fallible ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or out-of-range arguments (zero reserves, unknown asset, ...)
    InvalidInput,
    /// An account or pool cannot cover a transfer or loan
    InsufficientBalance,
    /// Caller lacks the capability the operation requires
    Unauthorized,
    /// A delayed action is not (yet) executable
    NotReady,
    /// State machine transition not allowed from the current state
    InvalidState,
    /// A settlement or explicit check failed after the fact
    PostconditionFailed,
    /// The unit was aborted on request
    Aborted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InsufficientBalance => "InsufficientBalance",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotReady => "NotReady",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::PostconditionFailed => "PostconditionFailed",
            ErrorKind::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Errors raised while parsing human-readable amounts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitsError {
    /// Input is not a number followed by an optional unit
    #[error("Invalid amount '{input}': expected '<number> [ether|gwei|wei]'")]
    InvalidAmount { input: String },

    /// Unit suffix not recognised
    #[error("Unknown unit '{unit}' in '{input}'")]
    UnknownUnit { unit: String, input: String },

    /// Value has more fractional digits than the unit can represent
    #[error("Amount '{input}' is not a whole number of base units")]
    FractionalBaseUnits { input: String },

    /// Value does not fit in u128 base units
    #[error("Amount '{input}' overflows u128 base units")]
    Overflow { input: String },
}

impl UnitsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}
