//! Item exchange priced by an oracle median
//!
//! Each item is one base unit of `item_asset`, minted on purchase and burned
//! on sale. The exchange pays sellers from its own balance.

use crate::error::Result;
use crate::state::LedgerState;
use breach_types::{AccountId, Amount, Asset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub account: AccountId,
    pub oracle: AccountId,
    pub item_asset: Asset,
    pub payment_asset: Asset,
}

impl LedgerState {
    /// Current price of one item, in payment units
    pub fn exchange_price(&self, exchange: &AccountId) -> Result<Amount> {
        let exchange = self.exchange(exchange)?;
        self.oracle(&exchange.oracle)?
            .median_price(&exchange.item_asset)
    }
}
