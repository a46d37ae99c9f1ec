//! Serialized ledger and atomic units
//!
//! ## Commit Protocol
//!
//! 1. Clone the committed [`LedgerState`] into a staging copy
//! 2. Run every operation of the unit against the copy
//! 3. Verify flash frames are closed and supply is conserved
//! 4. On success swap the copy in; on any failure drop it
//!
//! `&mut Ledger` is held for the whole unit, so units never interleave and
//! nothing outside the unit observes the staging copy.

use crate::config::LedgerSettings;
use crate::effects::Effects;
use crate::error::{LedgerError, UnitAbort};
use crate::interpreter::Interpreter;
use crate::logging::LogEmoji;
use crate::operation::Operation;
use crate::state::LedgerState;
use crate::{log_abort, log_commit};
use breach_types::{AccountId, Amount, Asset};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub units_committed: u64,
    pub units_aborted: u64,
    pub flash_loans_settled: u64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerState,
    settings: LedgerSettings,
    stats: LedgerStats,
}

impl Ledger {
    pub fn new(state: LedgerState) -> Self {
        Self::with_settings(state, LedgerSettings::default())
    }

    pub fn with_settings(state: LedgerState, settings: LedgerSettings) -> Self {
        Self {
            state,
            settings,
            stats: LedgerStats::default(),
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    pub fn now(&self) -> u64 {
        self.state.now()
    }

    pub fn balance(&self, account: &AccountId, asset: &Asset) -> Amount {
        self.state.balance(account, asset)
    }

    /// Move the clock forward between units
    pub fn advance_time(&mut self, seconds: u64) -> Result<(), LedgerError> {
        self.state.advance_time(seconds)?;
        debug!("{} t={} (+{}s)", LogEmoji::CLOCK, self.state.now(), seconds);
        Ok(())
    }

    /// Start building a unit for `caller`
    pub fn unit(&mut self, caller: impl Into<AccountId>) -> AtomicUnit<'_> {
        AtomicUnit {
            ledger: self,
            caller: caller.into(),
            ops: Vec::new(),
        }
    }

    /// Run `ops` as one all-or-nothing unit
    pub fn submit(&mut self, caller: &AccountId, ops: &[Operation]) -> Result<Effects, UnitAbort> {
        let mut staged = self.state.clone();
        let result = Interpreter::new(&mut staged, &self.settings).run_unit(caller, ops);

        match result {
            Ok(effects) => {
                self.state = staged;
                self.stats.units_committed += 1;
                self.stats.flash_loans_settled += effects.flash_loans;
                log_commit!(
                    "{} committed {} ops ({} effects, {} flash loans)",
                    caller,
                    ops.len(),
                    effects.len(),
                    effects.flash_loans
                );
                Ok(effects)
            }
            Err(fault) => {
                self.stats.units_aborted += 1;
                let abort = UnitAbort {
                    index: fault.path.first().copied().unwrap_or(ops.len()),
                    kind: fault.error.kind(),
                    path: fault.path,
                    error: fault.error,
                };
                log_abort!("{} unit rolled back: {}", caller, abort);
                Err(abort)
            }
        }
    }
}

/// Ordered operations awaiting one commit-or-abort outcome
pub struct AtomicUnit<'l> {
    ledger: &'l mut Ledger,
    caller: AccountId,
    ops: Vec<Operation>,
}

impl<'l> AtomicUnit<'l> {
    pub fn then(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    pub fn extend(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.ops.extend(ops);
        self
    }

    pub fn commit(self) -> Result<Effects, UnitAbort> {
        self.ledger.submit(&self.caller, &self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::FlashLender;
    use crate::operation::Check;
    use breach_types::{ErrorKind, WEI_PER_ETHER};

    fn eth() -> Asset {
        Asset::native()
    }

    fn ledger() -> Ledger {
        let mut state = LedgerState::new(0);
        state.mint(&"alice".into(), &eth(), 10 * WEI_PER_ETHER).unwrap();
        state.mint(&"pool".into(), &eth(), 1_000 * WEI_PER_ETHER).unwrap();
        state
            .add_flash_lender(FlashLender::new("pool", eth()))
            .unwrap();
        Ledger::new(state)
    }

    fn transfer(to: &str, amount: Amount) -> Operation {
        Operation::Transfer {
            to: to.into(),
            asset: eth(),
            amount,
        }
    }

    #[test]
    fn test_commit_applies_all_operations() {
        let mut ledger = ledger();
        let effects = ledger
            .unit("alice")
            .then(transfer("bob", WEI_PER_ETHER))
            .then(transfer("carol", 2 * WEI_PER_ETHER))
            .commit()
            .unwrap();

        assert_eq!(effects.len(), 2);
        assert_eq!(ledger.balance(&"alice".into(), &eth()), 7 * WEI_PER_ETHER);
        assert_eq!(ledger.stats().units_committed, 1);
    }

    #[test]
    fn test_abort_rolls_back_every_prior_effect() {
        let mut ledger = ledger();
        let abort = ledger
            .unit("alice")
            .then(transfer("bob", WEI_PER_ETHER))
            .then(Operation::Abort {
                reason: "changed my mind".into(),
            })
            .commit()
            .unwrap_err();

        assert_eq!(abort.index, 1);
        assert_eq!(abort.kind, ErrorKind::Aborted);
        assert_eq!(ledger.balance(&"alice".into(), &eth()), 10 * WEI_PER_ETHER);
        assert_eq!(ledger.balance(&"bob".into(), &eth()), 0);
        assert_eq!(ledger.stats().units_aborted, 1);
    }

    #[test]
    fn test_unrepaid_flash_loan_leaves_pool_unchanged() {
        let mut ledger = ledger();
        let abort = ledger
            .unit("alice")
            .then(Operation::FlashBorrow {
                lender: "pool".into(),
                amount: 500 * WEI_PER_ETHER,
                receiver: None,
                callback: vec![transfer("bob", 500 * WEI_PER_ETHER)],
            })
            .commit()
            .unwrap_err();

        assert_eq!(abort.kind, ErrorKind::PostconditionFailed);
        assert_eq!(abort.path, vec![0]);
        assert_eq!(ledger.balance(&"pool".into(), &eth()), 1_000 * WEI_PER_ETHER);
        assert_eq!(ledger.balance(&"bob".into(), &eth()), 0);
    }

    #[test]
    fn test_nested_failure_reports_path() {
        let mut ledger = ledger();
        let abort = ledger
            .unit("alice")
            .then(transfer("bob", 1))
            .then(Operation::FlashBorrow {
                lender: "pool".into(),
                amount: WEI_PER_ETHER,
                receiver: None,
                callback: vec![
                    Operation::RepayFlash {
                        lender: "pool".into(),
                    },
                    Operation::Require {
                        check: Check::BalanceAtLeast {
                            account: "alice".into(),
                            asset: eth(),
                            amount: 100 * WEI_PER_ETHER,
                        },
                    },
                ],
            })
            .commit()
            .unwrap_err();

        assert_eq!(abort.index, 1);
        assert_eq!(abort.path, vec![1, 1]);
        assert_eq!(abort.kind, ErrorKind::PostconditionFailed);
    }

    #[test]
    fn test_call_depth_limit() {
        let mut state = LedgerState::new(0);
        state.mint(&"alice".into(), &eth(), 1).unwrap();
        let settings = LedgerSettings {
            max_call_depth: 3,
            ..LedgerSettings::default()
        };
        let mut ledger = Ledger::with_settings(state, settings);

        let mut ops = vec![transfer("bob", 1)];
        for _ in 0..3 {
            ops = vec![Operation::Invoke {
                account: "alice".into(),
                ops,
            }];
        }
        let abort = ledger.submit(&"alice".into(), &ops).unwrap_err();
        assert_eq!(abort.kind, ErrorKind::InvalidState);
        assert_eq!(ledger.balance(&"bob".into(), &eth()), 0);
    }

    #[test]
    fn test_time_only_moves_between_units() {
        let mut ledger = ledger();
        ledger.advance_time(60).unwrap();
        assert_eq!(ledger.now(), 60);
        assert!(ledger.advance_time(u64::MAX).is_err());
    }
}
