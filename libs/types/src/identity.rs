//! Account and asset identities
//!
//! Both are readable symbols. Contracts (pools, lenders, timelocks, ...) are
//! accounts too: a component is registered under the account that holds its
//! funds, so "the pool's balance" is simply that account's balance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an externally owned account or of a component's own account
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Asset symbol ("ETH", "DVT", "WETH", ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(String);

impl Asset {
    /// Symbol of the native asset moved by timelock call values
    pub const NATIVE: &'static str = "ETH";

    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn native() -> Self {
        Self::new(Self::NATIVE)
    }

    pub fn is_native(&self) -> bool {
        self.0 == Self::NATIVE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Asset {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Asset {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&AccountId::new("attacker")).unwrap();
        assert_eq!(json, "\"attacker\"");

        let asset: Asset = serde_json::from_str("\"DVT\"").unwrap();
        assert_eq!(asset, Asset::from("DVT"));
        assert!(!asset.is_native());
        assert!(Asset::native().is_native());
    }
}
