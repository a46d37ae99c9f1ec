//! Constant-product pools registered on the ledger
//!
//! Reserves are not stored here: they are the pool account's balances of its
//! two assets, read fresh for every quote.

use crate::error::{LedgerError, Result};
use crate::state::LedgerState;
use breach_amm::{ConstantProductPool, FeeRatio, SwapDirection, U256};
use breach_types::{AccountId, Amount, Asset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmPool {
    pub account: AccountId,
    pub asset_a: Asset,
    pub asset_b: Asset,
    #[serde(default)]
    pub fee: FeeRatio,
}

impl AmmPool {
    pub fn new(account: impl Into<AccountId>, asset_a: Asset, asset_b: Asset, fee: FeeRatio) -> Self {
        Self {
            account: account.into(),
            asset_a,
            asset_b,
            fee,
        }
    }

    /// Swap direction and output asset for selling `asset_in`
    pub fn direction(&self, asset_in: &Asset) -> Result<(SwapDirection, Asset)> {
        if *asset_in == self.asset_a {
            Ok((SwapDirection::AToB, self.asset_b.clone()))
        } else if *asset_in == self.asset_b {
            Ok((SwapDirection::BToA, self.asset_a.clone()))
        } else {
            Err(LedgerError::InvalidInput(format!(
                "pool {} does not trade {asset_in}",
                self.account
            )))
        }
    }

    pub fn trades(&self, asset: &Asset) -> bool {
        *asset == self.asset_a || *asset == self.asset_b
    }

    /// Snapshot of the pool's reserves as a pricing pool
    pub fn reserves(&self, state: &LedgerState) -> Result<ConstantProductPool> {
        Ok(ConstantProductPool::new(
            state.balance(&self.account, &self.asset_a),
            state.balance(&self.account, &self.asset_b),
            self.fee,
        )?)
    }

    pub fn invariant(&self, state: &LedgerState) -> U256 {
        U256::from(state.balance(&self.account, &self.asset_a))
            * U256::from(state.balance(&self.account, &self.asset_b))
    }

    /// Price of one whole `base` unit in the pool's other asset
    pub fn spot_price_of(&self, state: &LedgerState, base: &Asset) -> Result<Amount> {
        let (direction, _) = self.direction(base)?;
        Ok(self.reserves(state)?.spot_price(direction)?)
    }
}
