//! Errors raised by the pricing engine

use breach_types::ErrorKind;
use ethers_core::types::U256;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    #[error("Input amount must be positive")]
    ZeroAmount,

    #[error("Reserves must be positive (reserve_in={reserve_in}, reserve_out={reserve_out})")]
    EmptyReserves { reserve_in: u128, reserve_out: u128 },

    #[error("Invalid fee ratio {numerator}/{denominator}: need 0 < numerator <= denominator")]
    InvalidFee { numerator: u32, denominator: u32 },

    #[error("Slippage exceeded: output {amount_out} below minimum {min_out}")]
    SlippageExceeded { amount_out: u128, min_out: u128 },

    #[error("Arithmetic overflow in {context}")]
    Overflow { context: &'static str },

    #[error("Target price {target} unreachable from current price {current}")]
    UnreachablePrice { target: u128, current: u128 },

    #[error("Constant product decreased: k {k_before} -> {k_after}")]
    InvariantViolated { k_before: U256, k_after: U256 },
}

impl AmmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmmError::SlippageExceeded { .. } | AmmError::InvariantViolated { .. } => {
                ErrorKind::PostconditionFailed
            }
            _ => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, AmmError>;
