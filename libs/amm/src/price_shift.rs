//! Exact inverse solve: how much must be sold to push a price down to a target
//!
//! Downstream collateral checks read the post-swap reserves exactly, so the
//! solve never approximates. The post-swap price of the input asset,
//! `(reserve_out - out(a))·P / (reserve_in + a)`, is non-increasing in the
//! input `a`; a doubling bracket followed by bisection over the exact integer
//! swap function returns the smallest qualifying input.

use crate::constant_product::{ConstantProduct, FeeRatio};
use crate::error::{AmmError, Result};
use serde::{Deserialize, Serialize};

/// A solved price shift: input to sell and the resulting prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceShift {
    pub amount_in: u128,
    pub amount_out: u128,
    pub price_before: u128,
    pub price_after: u128,
}

/// Smallest input whose swap leaves the input asset priced at or below `target_price`
///
/// Prices are quoted as output units per whole input unit, scaled by
/// `PRICE_PRECISION`. Returns 0 when the pool already satisfies the target.
pub fn required_input_for_price_shift(
    target_price: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee: FeeRatio,
) -> Result<u128> {
    plan_price_shift(target_price, reserve_in, reserve_out, fee).map(|shift| shift.amount_in)
}

/// Same solve as [`required_input_for_price_shift`], returning the full plan
pub fn plan_price_shift(
    target_price: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee: FeeRatio,
) -> Result<PriceShift> {
    fee.validate()?;
    let price_before = ConstantProduct::spot_price(reserve_in, reserve_out)?;
    if price_before <= target_price {
        return Ok(PriceShift {
            amount_in: 0,
            amount_out: 0,
            price_before,
            price_after: price_before,
        });
    }

    let unreachable = AmmError::UnreachablePrice {
        target: target_price,
        current: price_before,
    };

    // Bracket: post(lo) > target, post(hi) <= target
    let mut lo = 0u128;
    let mut hi = reserve_in;
    loop {
        match price_after(hi, reserve_in, reserve_out, fee) {
            Ok(price) if price <= target_price => break,
            Ok(_) => {
                lo = hi;
                hi = hi.checked_mul(2).ok_or_else(|| unreachable.clone())?;
            }
            Err(AmmError::Overflow { .. }) => return Err(unreachable),
            Err(e) => return Err(e),
        }
    }

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if price_after(mid, reserve_in, reserve_out, fee)? <= target_price {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let amount_out = ConstantProduct::swap_output(hi, reserve_in, reserve_out, fee)?;
    Ok(PriceShift {
        amount_in: hi,
        amount_out,
        price_before,
        price_after: price_after(hi, reserve_in, reserve_out, fee)?,
    })
}

fn price_after(amount_in: u128, reserve_in: u128, reserve_out: u128, fee: FeeRatio) -> Result<u128> {
    let amount_out = ConstantProduct::swap_output(amount_in, reserve_in, reserve_out, fee)?;
    let new_in = reserve_in.checked_add(amount_in).ok_or(AmmError::Overflow {
        context: "price_after",
    })?;
    ConstantProduct::spot_price(new_in, reserve_out - amount_out)
}
