//! Flash lenders and the frames that track an open flash loan
//!
//! Settlement compares the lender's balance against `balance_before + fee`
//! and nothing else. Funds the borrower hands back through any path (a
//! deposit credited to the borrower, a transfer from a third party) count.

use crate::error::{LedgerError, Result};
use breach_types::{serde_amount, AccountId, Amount, Asset};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlashFee {
    #[default]
    Zero,
    /// Flat fee charged on every loan, including zero-amount loans
    Fixed {
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    /// Proportional fee in basis points, rounded down
    Bps { bps: u32 },
}

impl FlashFee {
    pub fn fee_for(&self, amount: Amount) -> Result<Amount> {
        match self {
            FlashFee::Zero => Ok(0),
            FlashFee::Fixed { amount: fee } => Ok(*fee),
            FlashFee::Bps { bps } => {
                let fee = U256::from(amount) * U256::from(*bps) / U256::from(10_000u32);
                if fee > U256::from(u128::MAX) {
                    return Err(LedgerError::Overflow("flash fee"));
                }
                Ok(fee.as_u128())
            }
        }
    }
}

/// Whose identity an inline flash callback runs under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackMode {
    #[default]
    Receiver,
    /// The lender performs the callback itself (arbitrary call on its behalf)
    Lender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLender {
    pub account: AccountId,
    pub asset: Asset,
    #[serde(default)]
    pub fee: FlashFee,
    #[serde(default)]
    pub callback_mode: CallbackMode,
    #[serde(default)]
    pub reentrancy_guard: bool,
    #[serde(default)]
    pub accepts_deposits: bool,
    #[serde(default)]
    pub deposits: BTreeMap<AccountId, Amount>,
    #[serde(default)]
    pub governor: Option<AccountId>,
}

impl FlashLender {
    pub fn new(account: impl Into<AccountId>, asset: Asset) -> Self {
        Self {
            account: account.into(),
            asset,
            fee: FlashFee::Zero,
            callback_mode: CallbackMode::Receiver,
            reentrancy_guard: false,
            accepts_deposits: false,
            deposits: BTreeMap::new(),
            governor: None,
        }
    }

    pub fn deposit_of(&self, account: &AccountId) -> Amount {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    /// Sum of every credited deposit the lender owes back
    pub fn total_deposits(&self) -> Amount {
        self.deposits
            .values()
            .fold(0u128, |total, amount| total.saturating_add(*amount))
    }

    pub(crate) fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let entry = self.deposits.entry(account.clone()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("flash lender deposit"))?;
        Ok(())
    }

    /// Remove and return `account`'s whole deposit
    pub(crate) fn take_deposit(&mut self, account: &AccountId) -> Amount {
        self.deposits.remove(account).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashState {
    Idle,
    Lent,
    Settled,
    Reverted,
}

/// One open flash loan on the interpreter's frame stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashFrame {
    pub lender: AccountId,
    pub asset: Asset,
    pub receiver: AccountId,
    pub amount: Amount,
    pub fee: Amount,
    pub balance_before: Amount,
    pub depth: usize,
    pub state: FlashState,
}

impl FlashFrame {
    pub fn new(
        lender: &FlashLender,
        receiver: AccountId,
        amount: Amount,
        fee: Amount,
        balance_before: Amount,
        depth: usize,
    ) -> Self {
        Self {
            lender: lender.account.clone(),
            asset: lender.asset.clone(),
            receiver,
            amount,
            fee,
            balance_before,
            depth,
            state: FlashState::Idle,
        }
    }

    pub fn lend(&mut self) -> Result<()> {
        if self.state != FlashState::Idle {
            return Err(LedgerError::InvalidState(format!(
                "flash frame for {} is {:?}, expected Idle",
                self.lender, self.state
            )));
        }
        self.state = FlashState::Lent;
        Ok(())
    }

    /// What the lender must hold when the callback returns
    pub fn required_balance(&self) -> Result<Amount> {
        self.balance_before
            .checked_add(self.fee)
            .ok_or(LedgerError::Overflow("flash settlement"))
    }

    /// Amount a `RepayFlash` hands back: principal plus fee
    pub fn outstanding(&self) -> Result<Amount> {
        self.amount
            .checked_add(self.fee)
            .ok_or(LedgerError::Overflow("flash repayment"))
    }

    /// Lent → Settled if `balance_after` covers principal and fee, else Reverted
    pub fn settle(&mut self, balance_after: Amount) -> Result<()> {
        if self.state != FlashState::Lent {
            return Err(LedgerError::InvalidState(format!(
                "flash frame for {} is {:?}, expected Lent",
                self.lender, self.state
            )));
        }
        let required = self.required_balance()?;
        if balance_after < required {
            self.state = FlashState::Reverted;
            return Err(LedgerError::FlashNotRepaid {
                lender: self.lender.clone(),
                asset: self.asset.clone(),
                actual: balance_after,
                required,
            });
        }
        self.state = FlashState::Settled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_types::WEI_PER_ETHER;

    #[test]
    fn test_fees() {
        assert_eq!(FlashFee::Zero.fee_for(1_000).unwrap(), 0);
        assert_eq!(
            FlashFee::Fixed {
                amount: WEI_PER_ETHER
            }
            .fee_for(0)
            .unwrap(),
            WEI_PER_ETHER
        );
        assert_eq!(FlashFee::Bps { bps: 9 }.fee_for(10_000).unwrap(), 9);
        assert_eq!(FlashFee::Bps { bps: 9 }.fee_for(1_000).unwrap(), 0);
    }

    #[test]
    fn test_frame_lifecycle() {
        let lender = FlashLender::new("pool", Asset::native());
        let mut frame = FlashFrame::new(&lender, "receiver".into(), 100, 1, 1_000, 1);
        assert_eq!(frame.state, FlashState::Idle);

        frame.lend().unwrap();
        assert_eq!(frame.outstanding().unwrap(), 101);
        frame.settle(1_001).unwrap();
        assert_eq!(frame.state, FlashState::Settled);
        assert!(frame.settle(1_001).is_err());
    }

    #[test]
    fn test_short_settlement_reverts() {
        let lender = FlashLender::new("pool", Asset::native());
        let mut frame = FlashFrame::new(&lender, "receiver".into(), 100, 1, 1_000, 1);
        frame.lend().unwrap();

        let err = frame.settle(1_000).unwrap_err();
        assert_eq!(err.kind(), breach_types::ErrorKind::PostconditionFailed);
        assert_eq!(frame.state, FlashState::Reverted);
    }

    #[test]
    fn test_fee_config_from_json() {
        let fee: FlashFee = serde_json::from_str(r#"{"kind":"fixed","amount":"1 ether"}"#).unwrap();
        assert_eq!(
            fee,
            FlashFee::Fixed {
                amount: WEI_PER_ETHER
            }
        );
    }
}
