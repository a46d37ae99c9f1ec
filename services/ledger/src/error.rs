//! Ledger errors and the atomic-unit abort report
//!
//! Each variant carries enough context to diagnose the failing step without
//! re-running the unit, and maps onto one [`ErrorKind`].

use breach_amm::AmmError;
use breach_types::{AccountId, Amount, Asset, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("AMM rejected operation: {0}")]
    Amm(#[from] AmmError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown {component} '{id}'")]
    UnknownComponent { component: &'static str, id: AccountId },

    #[error("Duplicate {component} '{id}'")]
    DuplicateComponent { component: &'static str, id: AccountId },

    #[error("{account} holds {available} {asset}, needs {required}")]
    InsufficientBalance {
        account: AccountId,
        asset: Asset,
        available: Amount,
        required: Amount,
    },

    #[error("Pool {pool} can lend {available} {asset}, requested {requested}")]
    InsufficientPool {
        pool: AccountId,
        asset: Asset,
        available: Amount,
        requested: Amount,
    },

    #[error("{account} is not authorized: {capability}")]
    Unauthorized {
        account: AccountId,
        capability: String,
    },

    #[error("Action {id} not ready at t={now} ({reason})")]
    NotReady {
        id: String,
        now: u64,
        reason: String,
    },

    #[error("Action {id} already executed")]
    AlreadyExecuted { id: String },

    #[error("Action {id} already scheduled")]
    AlreadyScheduled { id: String },

    #[error("Reentrant flash borrow on guarded lender {lender}")]
    Reentrancy { lender: AccountId },

    #[error("Call depth {depth} exceeds limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Flash loan from {lender} not repaid: balance {actual} {asset}, required {required}")]
    FlashNotRepaid {
        lender: AccountId,
        asset: Asset,
        actual: Amount,
        required: Amount,
    },

    #[error("Postcondition failed: {0}")]
    Postcondition(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Amm(e) => e.kind(),
            LedgerError::InvalidInput(_)
            | LedgerError::UnknownComponent { .. }
            | LedgerError::DuplicateComponent { .. }
            | LedgerError::Overflow(_) => ErrorKind::InvalidInput,
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientPool { .. } => {
                ErrorKind::InsufficientBalance
            }
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LedgerError::NotReady { .. } => ErrorKind::NotReady,
            LedgerError::AlreadyExecuted { .. }
            | LedgerError::AlreadyScheduled { .. }
            | LedgerError::Reentrancy { .. }
            | LedgerError::CallDepthExceeded { .. }
            | LedgerError::InvalidState(_) => ErrorKind::InvalidState,
            LedgerError::FlashNotRepaid { .. } | LedgerError::Postcondition(_) => {
                ErrorKind::PostconditionFailed
            }
            LedgerError::Aborted(_) => ErrorKind::Aborted,
        }
    }

    pub(crate) fn unauthorized(account: &AccountId, capability: impl Into<String>) -> Self {
        LedgerError::Unauthorized {
            account: account.clone(),
            capability: capability.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Why an atomic unit was rolled back
///
/// `index` is the failing top-level operation; `path` walks down through
/// flash callbacks, timelock batches and invokes to the operation that raised
/// `error`. An empty `path` means the unit-level settlement checks failed.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Unit aborted at operation {index} (path {path:?}, {kind}): {error}")]
pub struct UnitAbort {
    pub index: usize,
    pub path: Vec<usize>,
    pub kind: ErrorKind,
    #[source]
    pub error: LedgerError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_variants() {
        let amm: LedgerError = AmmError::ZeroAmount.into();
        assert_eq!(amm.kind(), ErrorKind::InvalidInput);

        let not_ready = LedgerError::NotReady {
            id: "ab".into(),
            now: 5,
            reason: "ready at t=10".into(),
        };
        assert_eq!(not_ready.kind(), ErrorKind::NotReady);
        assert_eq!(
            LedgerError::AlreadyExecuted { id: "ab".into() }.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            LedgerError::Aborted("stop".into()).kind(),
            ErrorKind::Aborted
        );
    }
}
