//! Collateral requirements and the lending pools that enforce them

use crate::error::{LedgerError, Result};
use crate::state::LedgerState;
use breach_types::{serde_amount, AccountId, Amount, Asset, PRICE_PRECISION};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `floor(borrow_amount·oracle_price·ratio / PRICE_PRECISION)`
///
/// `oracle_price` is the price of one whole borrowed unit in collateral units.
/// Pool liquidity is checked by the caller, not here.
pub fn required_collateral(borrow_amount: Amount, oracle_price: Amount, ratio: u32) -> Result<Amount> {
    let product = U256::from(borrow_amount)
        .checked_mul(U256::from(oracle_price))
        .and_then(|value| value.checked_mul(U256::from(ratio)))
        .ok_or(LedgerError::Overflow("required_collateral"))?;
    let required = product / U256::from(PRICE_PRECISION);
    if required > U256::from(u128::MAX) {
        return Err(LedgerError::Overflow("required_collateral"));
    }
    Ok(required.as_u128())
}

/// Where a lending pool reads the price of its lent asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceSource {
    /// Instantaneous reserves of a constant-product pool
    SpotPool { pool: AccountId },
    /// Median of an oracle's reports
    Oracle { oracle: AccountId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPosition {
    pub borrower: AccountId,
    #[serde(with = "serde_amount")]
    pub principal: Amount,
    #[serde(with = "serde_amount")]
    pub collateral_deposited: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPool {
    pub account: AccountId,
    pub asset: Asset,
    pub collateral_asset: Asset,
    pub price_source: PriceSource,
    pub collateral_ratio: u32,
    #[serde(default)]
    pub positions: BTreeMap<AccountId, LendingPosition>,
}

impl LendingPool {
    pub fn position(&self, borrower: &AccountId) -> Option<&LendingPosition> {
        self.positions.get(borrower)
    }

    /// Create or grow `borrower`'s position
    pub(crate) fn record_borrow(
        &mut self,
        borrower: &AccountId,
        principal: Amount,
        collateral: Amount,
    ) -> Result<()> {
        let position = self
            .positions
            .entry(borrower.clone())
            .or_insert_with(|| LendingPosition {
                borrower: borrower.clone(),
                principal: 0,
                collateral_deposited: 0,
            });
        position.principal = position
            .principal
            .checked_add(principal)
            .ok_or(LedgerError::Overflow("position principal"))?;
        position.collateral_deposited = position
            .collateral_deposited
            .checked_add(collateral)
            .ok_or(LedgerError::Overflow("position collateral"))?;
        Ok(())
    }

    pub(crate) fn close(&mut self, borrower: &AccountId) -> Result<LendingPosition> {
        self.positions.remove(borrower).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "{borrower} has no open position in {}",
                self.account
            ))
        })
    }

    pub fn total_principal(&self) -> Amount {
        self.positions
            .values()
            .fold(0u128, |total, p| total.saturating_add(p.principal))
    }

    pub fn total_collateral(&self) -> Amount {
        self.positions
            .values()
            .fold(0u128, |total, p| total.saturating_add(p.collateral_deposited))
    }
}

impl LedgerState {
    /// Current price of one whole unit of the pool's lent asset, in collateral units
    pub fn lending_price(&self, lending_pool: &AccountId) -> Result<Amount> {
        let pool = self.lending_pool(lending_pool)?;
        match &pool.price_source {
            PriceSource::SpotPool { pool: amm } => {
                let amm = self.amm_pool(amm)?;
                if !amm.trades(&pool.collateral_asset) {
                    return Err(LedgerError::InvalidInput(format!(
                        "pool {} does not quote {}",
                        amm.account, pool.collateral_asset
                    )));
                }
                amm.spot_price_of(self, &pool.asset)
            }
            PriceSource::Oracle { oracle } => self.oracle(oracle)?.median_price(&pool.asset),
        }
    }

    /// Collateral a borrower must deposit to take `amount` right now
    ///
    /// Spot prices are floored per whole unit before scaling by `amount`.
    pub fn deposit_required(&self, lending_pool: &AccountId, amount: Amount) -> Result<Amount> {
        let ratio = self.lending_pool(lending_pool)?.collateral_ratio;
        required_collateral(amount, self.lending_price(lending_pool)?, ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::AmmPool;
    use breach_amm::FeeRatio;
    use breach_types::WEI_PER_ETHER;

    #[test]
    fn test_required_collateral_floors() {
        assert_eq!(required_collateral(1, PRICE_PRECISION, 2).unwrap(), 2);
        assert_eq!(
            required_collateral(WEI_PER_ETHER, WEI_PER_ETHER / 10, 3).unwrap(),
            300_000_000_000_000_000
        );
        assert_eq!(required_collateral(1, 1, 1).unwrap(), 0);
        assert!(required_collateral(u128::MAX, u128::MAX, 2).is_err());
    }

    #[test]
    fn test_spot_pool_deposit_required() {
        let dvt = Asset::from("DVT");
        let eth = Asset::native();
        let mut state = LedgerState::new(0);
        state
            .add_pool(AmmPool::new("exchange", dvt.clone(), eth.clone(), FeeRatio::UNISWAP))
            .unwrap();
        state.mint(&"exchange".into(), &dvt, 10 * WEI_PER_ETHER).unwrap();
        state.mint(&"exchange".into(), &eth, 10 * WEI_PER_ETHER).unwrap();
        state
            .add_lending_pool(LendingPool {
                account: "lending".into(),
                asset: dvt,
                collateral_asset: eth,
                price_source: PriceSource::SpotPool {
                    pool: "exchange".into(),
                },
                collateral_ratio: 2,
                positions: BTreeMap::new(),
            })
            .unwrap();

        // 1:1 pool, 2x collateral
        assert_eq!(
            state.deposit_required(&"lending".into(), WEI_PER_ETHER).unwrap(),
            2 * WEI_PER_ETHER
        );
    }

    #[test]
    fn test_positions_accumulate_and_close() {
        let mut pool = LendingPool {
            account: "lending".into(),
            asset: "DVT".into(),
            collateral_asset: "WETH".into(),
            price_source: PriceSource::Oracle {
                oracle: "oracle".into(),
            },
            collateral_ratio: 3,
            positions: BTreeMap::new(),
        };
        let borrower = AccountId::from("alice");
        pool.record_borrow(&borrower, 10, 30).unwrap();
        pool.record_borrow(&borrower, 5, 15).unwrap();
        assert_eq!(pool.total_principal(), 15);
        assert_eq!(pool.total_collateral(), 45);

        let closed = pool.close(&borrower).unwrap();
        assert_eq!(closed.principal, 15);
        assert!(pool.close(&borrower).is_err());
    }
}
