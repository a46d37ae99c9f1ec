//! Constant product (x*y=k) AMM math with exact integer arithmetic
//!
//! Every function works on `u128` base units and widens to 256 bits for the
//! intermediate products, so results match an on-chain `uint256` implementation
//! bit for bit. Division floors, which always rounds in the pool's favour.

use crate::error::{AmmError, Result};
use breach_types::PRICE_PRECISION;
use ethers_core::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fraction of the input that stays tradable after the fee (997/1000 = 0.3% fee)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeRatio {
    pub numerator: u32,
    pub denominator: u32,
}

impl FeeRatio {
    /// Uniswap V1/V2 pricing
    pub const UNISWAP: FeeRatio = FeeRatio {
        numerator: 997,
        denominator: 1000,
    };

    /// No fee retained by the pool
    pub const NONE: FeeRatio = FeeRatio {
        numerator: 1,
        denominator: 1,
    };

    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        let fee = Self {
            numerator,
            denominator,
        };
        fee.validate()?;
        Ok(fee)
    }

    /// Build from a fee in basis points (30 = 0.3%)
    pub fn from_bps(fee_bps: u32) -> Result<Self> {
        if fee_bps >= 10_000 {
            return Err(AmmError::InvalidFee {
                numerator: 10_000u32.saturating_sub(fee_bps),
                denominator: 10_000,
            });
        }
        Self::new(10_000 - fee_bps, 10_000)
    }

    pub fn validate(&self) -> Result<()> {
        if self.denominator == 0 || self.numerator == 0 || self.numerator > self.denominator {
            return Err(AmmError::InvalidFee {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        Ok(())
    }
}

impl Default for FeeRatio {
    fn default() -> Self {
        Self::UNISWAP
    }
}

/// Constant product pricing functions
pub struct ConstantProduct;

impl ConstantProduct {
    /// Exact output for selling `amount_in` into the pool
    ///
    /// `amount_out = floor(amount_in·num·reserve_out / (reserve_in·den + amount_in·num))`
    pub fn swap_output(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee: FeeRatio,
    ) -> Result<u128> {
        fee.validate()?;
        if amount_in == 0 {
            return Err(AmmError::ZeroAmount);
        }
        Self::check_reserves(reserve_in, reserve_out)?;

        let amount_in_with_fee = U256::from(amount_in) * U256::from(fee.numerator);
        let numerator = amount_in_with_fee
            .checked_mul(U256::from(reserve_out))
            .ok_or(AmmError::Overflow {
                context: "swap_output numerator",
            })?;
        let denominator = (U256::from(reserve_in) * U256::from(fee.denominator))
            .checked_add(amount_in_with_fee)
            .ok_or(AmmError::Overflow {
                context: "swap_output denominator",
            })?;

        to_u128(numerator / denominator, "swap_output")
    }

    /// Price of one whole `base` unit in `quote` units, scaled by `PRICE_PRECISION`
    pub fn spot_price(reserve_base: u128, reserve_quote: u128) -> Result<u128> {
        Self::check_reserves(reserve_base, reserve_quote)?;
        let scaled = U256::from(reserve_quote)
            .checked_mul(U256::from(PRICE_PRECISION))
            .ok_or(AmmError::Overflow {
                context: "spot_price",
            })?;
        to_u128(scaled / U256::from(reserve_base), "spot_price")
    }

    /// The constant product k = reserve_a·reserve_b
    pub fn invariant(reserve_a: u128, reserve_b: u128) -> U256 {
        U256::from(reserve_a) * U256::from(reserve_b)
    }

    /// Price impact of a trade in percent (two decimals), fee excluded
    pub fn price_impact(amount_in: u128, reserve_in: u128, reserve_out: u128) -> Result<Decimal> {
        let price_before = Self::spot_price(reserve_in, reserve_out)?;
        let amount_out = Self::swap_output(amount_in, reserve_in, reserve_out, FeeRatio::NONE)?;
        let new_reserve_in = reserve_in.checked_add(amount_in).ok_or(AmmError::Overflow {
            context: "price_impact",
        })?;
        let price_after = Self::spot_price(new_reserve_in, reserve_out - amount_out)?;

        if price_before == 0 {
            return Ok(Decimal::ZERO);
        }
        let drop = U256::from(price_before.saturating_sub(price_after)) * U256::from(10_000u32);
        let bps = to_u128(drop / U256::from(price_before), "price_impact")?;
        // bps <= 10_000, always representable
        Ok(Decimal::new(bps as i64, 2))
    }

    fn check_reserves(reserve_in: u128, reserve_out: u128) -> Result<()> {
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::EmptyReserves {
                reserve_in,
                reserve_out,
            });
        }
        Ok(())
    }
}

pub(crate) fn to_u128(value: U256, context: &'static str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::Overflow { context });
    }
    Ok(value.as_u128())
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_types::WEI_PER_ETHER;
    use rust_decimal_macros::dec;

    #[test]
    fn test_swap_output_matches_closed_form() {
        // 10_000 tokens into (token=100, eth=10) at 997/1000
        let out = ConstantProduct::swap_output(10_000, 100, 10, FeeRatio::UNISWAP).unwrap();
        assert_eq!(out, (997 * 10_000 * 10) / (100 * 1000 + 997 * 10_000));
        assert_eq!(out, 9);

        let scaled = ConstantProduct::swap_output(
            10_000 * WEI_PER_ETHER,
            100 * WEI_PER_ETHER,
            10 * WEI_PER_ETHER,
            FeeRatio::UNISWAP,
        )
        .unwrap();
        assert_eq!(scaled, 9_900_695_134_061_569_016);
    }

    #[test]
    fn test_swap_output_rejects_zero_inputs() {
        assert_eq!(
            ConstantProduct::swap_output(0, 100, 10, FeeRatio::UNISWAP),
            Err(AmmError::ZeroAmount)
        );
        assert!(matches!(
            ConstantProduct::swap_output(5, 0, 10, FeeRatio::UNISWAP),
            Err(AmmError::EmptyReserves { .. })
        ));
        assert!(matches!(
            ConstantProduct::swap_output(5, 100, 0, FeeRatio::UNISWAP),
            Err(AmmError::EmptyReserves { .. })
        ));
    }

    #[test]
    fn test_spot_price() {
        // 100 DVT / 10 WETH: one DVT costs 0.1 WETH
        let price = ConstantProduct::spot_price(100 * WEI_PER_ETHER, 10 * WEI_PER_ETHER).unwrap();
        assert_eq!(price, WEI_PER_ETHER / 10);
        assert_eq!(
            ConstantProduct::spot_price(10 * WEI_PER_ETHER, 100 * WEI_PER_ETHER).unwrap(),
            10 * WEI_PER_ETHER
        );
    }

    #[test]
    fn test_fee_ratio_validation() {
        assert_eq!(FeeRatio::from_bps(30).unwrap(), FeeRatio::new(9_970, 10_000).unwrap());
        assert!(FeeRatio::new(0, 1000).is_err());
        assert!(FeeRatio::new(1001, 1000).is_err());
        assert!(FeeRatio::new(1, 0).is_err());
        assert!(FeeRatio::from_bps(10_000).is_err());
    }

    #[test]
    fn test_price_impact() {
        let impact = ConstantProduct::price_impact(100, 1000, 2000).unwrap();

        // Trading 10% of reserves moves the price noticeably but not wildly
        assert!(impact > dec!(0));
        assert!(impact < dec!(20));
    }
}
