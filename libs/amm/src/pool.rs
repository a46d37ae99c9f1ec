//! Pool state with k-checked swaps

use crate::constant_product::{ConstantProduct, FeeRatio};
use crate::error::{AmmError, Result};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// Which reserve receives the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    AToB,
    BToA,
}

/// Two reserves plus fee. Mutated only through [`ConstantProductPool::swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPool {
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub fee: FeeRatio,
}

/// Result of an executed swap, with k before and after for auditing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_in: u128,
    pub amount_out: u128,
    pub k_before: U256,
    pub k_after: U256,
}

impl ConstantProductPool {
    pub fn new(reserve_a: u128, reserve_b: u128, fee: FeeRatio) -> Result<Self> {
        fee.validate()?;
        Ok(Self {
            reserve_a,
            reserve_b,
            fee,
        })
    }

    /// (reserve_in, reserve_out) for a direction
    pub fn oriented(&self, direction: SwapDirection) -> (u128, u128) {
        match direction {
            SwapDirection::AToB => (self.reserve_a, self.reserve_b),
            SwapDirection::BToA => (self.reserve_b, self.reserve_a),
        }
    }

    /// Price of the input asset in output units, scaled by `PRICE_PRECISION`
    pub fn spot_price(&self, direction: SwapDirection) -> Result<u128> {
        let (reserve_in, reserve_out) = self.oriented(direction);
        ConstantProduct::spot_price(reserve_in, reserve_out)
    }

    pub fn invariant(&self) -> U256 {
        ConstantProduct::invariant(self.reserve_a, self.reserve_b)
    }

    /// Execute a swap against the reserves
    ///
    /// Fails without touching the reserves if the output is below `min_out`.
    /// The product of the reserves never decreases across a successful call.
    pub fn swap(
        &mut self,
        direction: SwapDirection,
        amount_in: u128,
        min_out: u128,
    ) -> Result<SwapOutcome> {
        let (reserve_in, reserve_out) = self.oriented(direction);
        let amount_out = ConstantProduct::swap_output(amount_in, reserve_in, reserve_out, self.fee)?;
        if amount_out < min_out {
            return Err(AmmError::SlippageExceeded {
                amount_out,
                min_out,
            });
        }

        let new_in = reserve_in.checked_add(amount_in).ok_or(AmmError::Overflow {
            context: "swap reserve_in",
        })?;
        let new_out = reserve_out - amount_out;

        let k_before = self.invariant();
        let k_after = ConstantProduct::invariant(new_in, new_out);
        if k_after < k_before {
            return Err(AmmError::InvariantViolated { k_before, k_after });
        }

        match direction {
            SwapDirection::AToB => {
                self.reserve_a = new_in;
                self.reserve_b = new_out;
            }
            SwapDirection::BToA => {
                self.reserve_b = new_in;
                self.reserve_a = new_out;
            }
        }

        Ok(SwapOutcome {
            amount_in,
            amount_out,
            k_before,
            k_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_moves_reserves_and_grows_k() {
        let mut pool = ConstantProductPool::new(100, 10, FeeRatio::UNISWAP).unwrap();
        let outcome = pool.swap(SwapDirection::AToB, 10_000, 0).unwrap();

        assert_eq!(outcome.amount_out, 9);
        assert_eq!((pool.reserve_a, pool.reserve_b), (10_100, 1));
        assert!(outcome.k_after >= outcome.k_before);
    }

    #[test]
    fn test_swap_slippage_leaves_pool_untouched() {
        let mut pool = ConstantProductPool::new(1_000, 2_000, FeeRatio::UNISWAP).unwrap();
        let before = pool;

        let result = pool.swap(SwapDirection::BToA, 100, 1_000);
        assert!(matches!(result, Err(AmmError::SlippageExceeded { .. })));
        assert_eq!(pool, before);
    }
}
