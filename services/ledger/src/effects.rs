//! Observable effects of a committed unit

use crate::timelock::Role;
use crate::vault::VaultLogic;
use breach_types::{serde_amount, AccountId, Amount, Asset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Transferred {
        from: AccountId,
        to: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Swapped {
        pool: AccountId,
        trader: AccountId,
        asset_in: Asset,
        #[serde(with = "serde_amount")]
        amount_in: Amount,
        asset_out: Asset,
        #[serde(with = "serde_amount")]
        amount_out: Amount,
    },
    PricePosted {
        oracle: AccountId,
        reporter: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        price: Amount,
    },
    Borrowed {
        lending_pool: AccountId,
        borrower: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(with = "serde_amount")]
        collateral: Amount,
    },
    Repaid {
        lending_pool: AccountId,
        borrower: AccountId,
        #[serde(with = "serde_amount")]
        principal: Amount,
        #[serde(with = "serde_amount")]
        collateral: Amount,
    },
    FlashLent {
        lender: AccountId,
        receiver: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(with = "serde_amount")]
        fee: Amount,
        depth: usize,
    },
    FlashSettled {
        lender: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(with = "serde_amount")]
        fee: Amount,
        depth: usize,
    },
    RoleGranted {
        timelock: AccountId,
        role: Role,
        account: AccountId,
    },
    RoleRevoked {
        timelock: AccountId,
        role: Role,
        account: AccountId,
    },
    DelayUpdated {
        timelock: AccountId,
        delay: u64,
    },
    ActionScheduled {
        timelock: AccountId,
        id: String,
        ready_at: u64,
    },
    ActionExecuted {
        timelock: AccountId,
        id: String,
    },
    Upgraded {
        vault: AccountId,
        logic: VaultLogic,
    },
    SweeperSet {
        vault: AccountId,
        sweeper: AccountId,
    },
    RewardsClaimed {
        rewarder: AccountId,
        account: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        round: u64,
    },
    ItemBought {
        exchange: AccountId,
        buyer: AccountId,
        #[serde(with = "serde_amount")]
        price: Amount,
    },
    ItemSold {
        exchange: AccountId,
        seller: AccountId,
        #[serde(with = "serde_amount")]
        price: Amount,
    },
}

/// Everything a committed unit did, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Effects {
    pub effects: Vec<Effect>,
    pub flash_loans: u64,
}

impl Effects {
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn swaps(&self) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .filter(|effect| matches!(effect, Effect::Swapped { .. }))
    }
}
