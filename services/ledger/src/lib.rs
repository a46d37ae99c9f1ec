//! # Breach Ledger - Atomic Multi-Step Economic Operations
//!
//! ## Purpose
//!
//! Executes sequences of economic operations (swaps, borrows, flash loans,
//! oracle posts, governance actions) against a serialized in-memory ledger,
//! where every sequence commits or aborts as a single unit. Scenarios are
//! run end to end by [`run_attack`], which reports final balances and
//! whether pool-solvency and zero-residual-debt invariants held.
//!
//! ## Integration Points
//!
//! - **Pricing**: `breach-amm` constant-product math for swaps and price shifts
//! - **Price Feeds**: [`oracle::MedianAggregator`], manipulable by a reporter majority
//! - **Collateral**: [`collateral::required_collateral`] over spot or oracle prices
//! - **Flash Loans**: [`flash::FlashFrame`] stack, balance-only settlement
//! - **Governance**: [`timelock::Timelock`] with check-before-act execution
//! - **Configuration**: [`ScenarioConfig`] from JSON/TOML or [`presets`]
//!
//! ## Architecture Role
//!
//! ```text
//! ScenarioConfig → SetupConfig::build → LedgerState
//!                                           ↓
//! UnitConfig ──→ Ledger::submit → Interpreter (staged clone, recursive)
//!                      ↓                    ↓
//!               commit / rollback     flash frames, batch calls, invokes
//!                      ↓
//!               run_attack → AttackOutcome (balances + invariants)
//! ```
//!
//! ## Atomicity
//!
//! A unit runs against a clone of the committed state and replaces it only
//! when every operation succeeded, no flash loan is left open and asset
//! supply is conserved. Failures report the failing operation's index path
//! and [`breach_types::ErrorKind`].

pub mod attack;
pub mod collateral;
pub mod config;
pub mod effects;
pub mod error;
pub mod exchange;
pub mod flash;
mod interpreter;
pub mod logging;
pub mod operation;
pub mod oracle;
pub mod pools;
pub mod presets;
pub mod rewards;
pub mod sequencer;
pub mod state;
pub mod timelock;
pub mod vault;

pub use attack::{run_attack, AttackOutcome, InvariantReport, UnitReport};
pub use collateral::{required_collateral, LendingPool, LendingPosition, PriceSource};
pub use config::{LedgerSettings, ScenarioConfig, SetupConfig, UnitConfig};
pub use effects::{Effect, Effects};
pub use error::{LedgerError, UnitAbort};
pub use flash::{CallbackMode, FlashFee, FlashFrame, FlashLender, FlashState};
pub use operation::{Check, Operation};
pub use oracle::{median, MedianAggregator, PriceOracle, PriceReport};
pub use pools::AmmPool;
pub use sequencer::{AtomicUnit, Ledger, LedgerStats};
pub use state::LedgerState;
pub use timelock::{ActionId, ActionState, Call, ProposalGate, Role, ScheduledAction, Timelock};
pub use vault::{Vault, VaultLogic};
