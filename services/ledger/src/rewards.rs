//! Round-based reward distribution over a deposit snapshot
//!
//! The snapshot for a round is taken by the first distribution after the
//! round opens, from live deposits at that instant. A deposit made and
//! withdrawn inside one unit still lands in the snapshot if it triggers it.

use crate::error::{LedgerError, Result};
use breach_types::{AccountId, Amount, Asset, WEI_PER_ETHER};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reward tokens minted per round, split pro-rata
pub const REWARDS_PER_ROUND: Amount = 100 * WEI_PER_ETHER;

/// Seconds between rounds
pub const ROUND_DURATION: u64 = 5 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    pub account: AccountId,
    pub liquidity_asset: Asset,
    pub reward_asset: Asset,
    pub deposits: BTreeMap<AccountId, Amount>,
    pub round: u64,
    pub last_round_start: u64,
    pub snapshot: BTreeMap<AccountId, Amount>,
    /// Last round each account claimed in
    pub claimed: BTreeMap<AccountId, u64>,
}

impl RewardPool {
    /// Open round 1 at `now` with the given deposits already snapshotted
    pub fn new(
        account: impl Into<AccountId>,
        liquidity_asset: Asset,
        reward_asset: Asset,
        deposits: BTreeMap<AccountId, Amount>,
        now: u64,
    ) -> Self {
        Self {
            account: account.into(),
            liquidity_asset,
            reward_asset,
            snapshot: deposits.clone(),
            deposits,
            round: 1,
            last_round_start: now,
            claimed: BTreeMap::new(),
        }
    }

    pub fn deposit_of(&self, account: &AccountId) -> Amount {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    pub fn total_deposits(&self) -> Amount {
        self.deposits
            .values()
            .fold(0u128, |total, amount| total.saturating_add(*amount))
    }

    fn snapshot_total(&self) -> Amount {
        self.snapshot
            .values()
            .fold(0u128, |total, amount| total.saturating_add(*amount))
    }

    pub(crate) fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let entry = self.deposits.entry(account.clone()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("reward pool deposit"))?;
        Ok(())
    }

    pub(crate) fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.deposit_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                asset: self.liquidity_asset.clone(),
                available,
                required: amount,
            });
        }
        self.deposits.insert(account.clone(), available - amount);
        Ok(())
    }

    pub fn is_new_round(&self, now: u64) -> bool {
        now >= self.last_round_start.saturating_add(ROUND_DURATION)
    }

    /// Snapshot live deposits if a new round has opened; true if it did
    pub(crate) fn roll_round(&mut self, now: u64) -> bool {
        if !self.is_new_round(now) {
            return false;
        }
        self.round += 1;
        self.last_round_start = now;
        self.snapshot = self.deposits.clone();
        true
    }

    /// Reward `account` may still claim this round
    pub fn claimable(&self, account: &AccountId) -> Amount {
        if self.claimed.get(account) == Some(&self.round) {
            return 0;
        }
        let share = self.snapshot.get(account).copied().unwrap_or(0);
        let total = self.snapshot_total();
        if share == 0 || total == 0 {
            return 0;
        }
        (U256::from(share) * U256::from(REWARDS_PER_ROUND) / U256::from(total)).as_u128()
    }

    pub(crate) fn mark_claimed(&mut self, account: &AccountId) {
        self.claimed.insert(account.clone(), self.round);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> RewardPool {
        let deposits = ["alice", "bob", "charlie", "david"]
            .into_iter()
            .map(|name| (AccountId::from(name), 100 * WEI_PER_ETHER))
            .collect();
        RewardPool::new("rewarder", "DVT".into(), "RWT".into(), deposits, 0)
    }

    #[test]
    fn test_even_split_and_single_claim() {
        let mut rewards = pool();
        let alice = AccountId::from("alice");
        assert_eq!(rewards.claimable(&alice), 25 * WEI_PER_ETHER);
        rewards.mark_claimed(&alice);
        assert_eq!(rewards.claimable(&alice), 0);
    }

    #[test]
    fn test_round_rolls_after_duration() {
        let mut rewards = pool();
        let whale = AccountId::from("whale");
        rewards.credit(&whale, 1_000_000 * WEI_PER_ETHER).unwrap();

        assert!(!rewards.roll_round(ROUND_DURATION - 1));
        assert_eq!(rewards.claimable(&whale), 0);

        assert!(rewards.roll_round(ROUND_DURATION));
        assert_eq!(rewards.round, 2);
        assert!(rewards.claimable(&whale) > 99 * WEI_PER_ETHER);

        rewards.debit(&whale, 1_000_000 * WEI_PER_ETHER).unwrap();
        assert!(rewards.debit(&whale, 1).is_err());
        // withdrawing after the snapshot keeps the share
        assert!(rewards.claimable(&whale) > 99 * WEI_PER_ETHER);
    }
}
