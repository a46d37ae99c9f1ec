//! # Breach Shared Types
//!
//! Common vocabulary for every Breach crate: who acts, what they hold, how
//! amounts are scaled and how failures are classified.
//!
//! ## Design Philosophy
//!
//! - **Integer Amounts**: all balances are `u128` base units (wei-style, 18 decimals)
//! - **No Floating Point**: human-readable input goes through `rust_decimal`
//! - **Stable Error Kinds**: every crate maps its detailed errors onto [`ErrorKind`]
//! - **Plain Identities**: accounts and assets are readable symbols, not key material
//!
//! ## Quick Start
//!
//! ```rust
//! use breach_types::{parse_amount, AccountId, Asset, WEI_PER_ETHER};
//!
//! let attacker = AccountId::new("attacker");
//! let eth = Asset::native();
//! let amount = parse_amount("25 ether").unwrap();
//!
//! assert_eq!(amount, 25 * WEI_PER_ETHER);
//! assert_eq!(eth.as_str(), "ETH");
//! assert_eq!(attacker.to_string(), "attacker");
//! ```

pub mod errors;
pub mod identity;
pub mod precision;

pub use errors::{ErrorKind, UnitsError};
pub use identity::{AccountId, Asset};
pub use precision::{
    format_ether, parse_amount, serde_amount, serde_amount_map, Amount, PRICE_PRECISION,
    WEI_PER_ETHER, WEI_PER_GWEI,
};
