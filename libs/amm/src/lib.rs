//! # Breach AMM Library - Exact Constant Product Pricing
//!
//! ## Purpose
//!
//! Pure pricing engine for constant-product liquidity pools. Computes swap
//! outputs, spot prices and the exact input needed to push a
//! price to a target, all in integer arithmetic so results agree with an
//! on-chain `uint256` implementation to the last base unit.
//!
//! ## Integration Points
//!
//! - **Input Sources**: pool reserves read from ledger balances, trade parameters from operations
//! - **Output Destinations**: ledger swaps, spot-price collateral checks, price-shift planning
//! - **Precision**: `u128` base units, 256-bit intermediates, floor division in the pool's favour
//! - **Validation**: zero amounts, empty reserves, invalid fees and overflow all surface as [`AmmError`]
//!
//! ## Architecture Role
//!
//! ```text
//! Ledger balances → [ConstantProductPool] → swap / spot_price → Ledger transfers
//!                          ↓
//!                 [price_shift] exact inverse solve → ShiftPrice operations
//! ```
//!
//! ## Invariants
//!
//! - `swap_output` is non-decreasing in `amount_in` and strictly below `reserve_out`
//! - `reserve_in'·reserve_out' >= reserve_in·reserve_out` for every executed swap
//! - No floating point anywhere in the pricing path

pub mod constant_product;
pub mod error;
pub mod pool;
pub mod price_shift;

pub use constant_product::{ConstantProduct, FeeRatio};
pub use error::AmmError;
pub use pool::{ConstantProductPool, SwapDirection, SwapOutcome};
pub use price_shift::{plan_price_shift, required_input_for_price_shift, PriceShift};

/// Common types for AMM calculations
pub use ethers_core::types::U256;
