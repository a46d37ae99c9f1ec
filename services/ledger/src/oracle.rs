//! Median-of-reports price aggregation
//!
//! One live report per (reporter, asset); a new post replaces the old one.
//! The aggregator is only as honest as a strict majority of its reporters:
//! there is no staleness or deviation check, and consumers that feed it into
//! borrow limits inherit that exposure.

use crate::error::{LedgerError, Result};
use breach_types::{serde_amount, AccountId, Amount, Asset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReport {
    pub reporter: AccountId,
    pub asset: Asset,
    #[serde(with = "serde_amount")]
    pub price: Amount,
    pub timestamp: u64,
}

/// Median of `prices`; an even count takes the floor of the mean of the
/// two middle values. `None` for an empty slice.
pub fn median(prices: &mut [Amount]) -> Option<Amount> {
    if prices.is_empty() {
        return None;
    }
    prices.sort_unstable();
    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        return Some(prices[mid]);
    }
    let (low, high) = (prices[mid - 1], prices[mid]);
    // floor((low + high) / 2) without overflowing u128
    Some(low / 2 + high / 2 + (low % 2 + high % 2) / 2)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedianAggregator {
    reports: BTreeMap<Asset, BTreeMap<AccountId, PriceReport>>,
}

impl MedianAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reporter`'s latest price, returning the report it replaced
    pub fn post_price(
        &mut self,
        reporter: AccountId,
        asset: Asset,
        price: Amount,
        timestamp: u64,
    ) -> Option<PriceReport> {
        let report = PriceReport {
            reporter: reporter.clone(),
            asset: asset.clone(),
            price,
            timestamp,
        };
        self.reports.entry(asset).or_default().insert(reporter, report)
    }

    pub fn reports(&self, asset: &Asset) -> impl Iterator<Item = &PriceReport> {
        self.reports.get(asset).into_iter().flat_map(|by_reporter| by_reporter.values())
    }

    pub fn report_count(&self, asset: &Asset) -> usize {
        self.reports.get(asset).map_or(0, BTreeMap::len)
    }

    pub fn median_price(&self, asset: &Asset) -> Result<Amount> {
        let mut prices: Vec<Amount> = self.reports(asset).map(|report| report.price).collect();
        median(&mut prices)
            .ok_or_else(|| LedgerError::InvalidInput(format!("no price reports for {asset}")))
    }
}

/// An aggregator bound to the set of accounts allowed to report to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOracle {
    pub account: AccountId,
    pub sources: BTreeSet<AccountId>,
    #[serde(default)]
    pub aggregator: MedianAggregator,
}

impl PriceOracle {
    pub fn new(account: impl Into<AccountId>, sources: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            account: account.into(),
            sources: sources.into_iter().collect(),
            aggregator: MedianAggregator::new(),
        }
    }

    pub fn post_price(
        &mut self,
        reporter: &AccountId,
        asset: &Asset,
        price: Amount,
        now: u64,
    ) -> Result<Option<PriceReport>> {
        if !self.sources.contains(reporter) {
            return Err(LedgerError::unauthorized(
                reporter,
                format!("report prices to {}", self.account),
            ));
        }
        Ok(self
            .aggregator
            .post_price(reporter.clone(), asset.clone(), price, now))
    }

    pub fn median_price(&self, asset: &Asset) -> Result<Amount> {
        self.aggregator.median_price(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [5, 1, 3]), Some(3));
        assert_eq!(median(&mut [4, 1, 3, 10]), Some(3));
        assert_eq!(median(&mut [1, 2]), Some(1));
        assert_eq!(median(&mut [u128::MAX, u128::MAX]), Some(u128::MAX));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_new_report_replaces_old() {
        let nft = Asset::from("DVNFT");
        let mut aggregator = MedianAggregator::new();
        assert!(aggregator
            .post_price("source-1".into(), nft.clone(), 999, 0)
            .is_none());
        let replaced = aggregator
            .post_price("source-1".into(), nft.clone(), 1, 5)
            .unwrap();

        assert_eq!(replaced.price, 999);
        assert_eq!(aggregator.report_count(&nft), 1);
        assert_eq!(aggregator.median_price(&nft).unwrap(), 1);
    }

    #[test]
    fn test_unknown_reporter_rejected() {
        let mut oracle = PriceOracle::new("oracle", ["source-1".into()]);
        let err = oracle
            .post_price(&"mallory".into(), &Asset::from("DVNFT"), 0, 0)
            .unwrap_err();
        assert_eq!(err.kind(), breach_types::ErrorKind::Unauthorized);
    }

    #[test]
    fn test_empty_asset_has_no_median() {
        let aggregator = MedianAggregator::new();
        assert!(aggregator.median_price(&Asset::from("DVNFT")).is_err());
    }

    proptest! {
        /// A strict majority of identical reports fixes the median
        #[test]
        fn prop_majority_decides_median(
            price in 0u128..1_000_000_000_000_000_000_000,
            honest in 1usize..8,
            noise in proptest::collection::vec(any::<u128>(), 0..8),
        ) {
            prop_assume!(honest > noise.len());
            let mut aggregator = MedianAggregator::new();
            let asset = Asset::from("DVNFT");
            for i in 0..honest {
                aggregator.post_price(AccountId::new(format!("honest-{i}")), asset.clone(), price, 0);
            }
            for (i, value) in noise.iter().enumerate() {
                aggregator.post_price(AccountId::new(format!("noisy-{i}")), asset.clone(), *value, 0);
            }
            prop_assert_eq!(aggregator.median_price(&asset).unwrap(), price);
        }
    }
}
