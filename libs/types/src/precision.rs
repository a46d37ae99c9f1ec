//! Precision Handling for Ledger Amounts
//!
//! Every balance, reserve and price in the workspace is a `u128` count of base
//! units. Assets use 18 decimals (`1 ETH = 1_000_000_000_000_000_000 wei`) and
//! prices are fixed point with [`PRICE_PRECISION`] as the scale.
//!
//! ## Critical Rules
//!
//! 1. **NO FLOATING POINT**: amounts are parsed with `rust_decimal` and converted
//!    exactly, or rejected
//! 2. **Explicit Units**: configuration strings carry their unit (`"0.1 ether"`),
//!    bare integers are base units
//! 3. **Strings on the Wire**: serialized amounts are decimal strings so TOML
//!    (i64 only) and JSON readers never truncate them
//!
//! ## Example Usage
//!
//! ```rust
//! use breach_types::{format_ether, parse_amount, WEI_PER_ETHER};
//!
//! assert_eq!(parse_amount("0.1 ether").unwrap(), WEI_PER_ETHER / 10);
//! assert_eq!(parse_amount("42").unwrap(), 42);
//! assert_eq!(format_ether(1_500_000_000_000_000_000), "1.5");
//! ```

use crate::errors::UnitsError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Base-unit amount of any asset
pub type Amount = u128;

/// Fixed-point scale for prices (price of one whole unit, 18 decimals)
pub const PRICE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Base units per whole ether-denominated token
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Base units per gwei
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Parse `"<number> [ether|eth|gwei|wei]"` into base units
///
/// Bare integers are read as base units without going through `Decimal`, so
/// the full u128 range is accepted. Values with a unit must convert to a whole
/// number of base units.
pub fn parse_amount(input: &str) -> Result<Amount, UnitsError> {
    let trimmed = input.trim();
    let mut parts = trimmed.split_whitespace();
    let number = parts.next().ok_or_else(|| UnitsError::InvalidAmount {
        input: input.to_string(),
    })?;
    let unit = parts.next();
    if parts.next().is_some() {
        return Err(UnitsError::InvalidAmount {
            input: input.to_string(),
        });
    }

    let decimals = match unit.map(str::to_ascii_lowercase).as_deref() {
        None | Some("wei") => 0u32,
        Some("gwei") => 9,
        Some("ether") | Some("eth") => 18,
        Some(other) => {
            return Err(UnitsError::UnknownUnit {
                unit: other.to_string(),
                input: input.to_string(),
            })
        }
    };

    let plain = number.replace('_', "");
    if decimals == 0 {
        if let Ok(value) = plain.parse::<u128>() {
            return Ok(value);
        }
    }

    let value = Decimal::from_str(&plain).map_err(|_| UnitsError::InvalidAmount {
        input: input.to_string(),
    })?;
    if value.is_sign_negative() {
        return Err(UnitsError::InvalidAmount {
            input: input.to_string(),
        });
    }

    let scale = Decimal::from(10u64.pow(decimals));
    let scaled = value
        .checked_mul(scale)
        .ok_or_else(|| UnitsError::Overflow {
            input: input.to_string(),
        })?;
    if !scaled.fract().is_zero() {
        return Err(UnitsError::FractionalBaseUnits {
            input: input.to_string(),
        });
    }
    scaled.to_u128().ok_or_else(|| UnitsError::Overflow {
        input: input.to_string(),
    })
}

/// Render base units as whole tokens (18 decimals), trailing zeros stripped
///
/// Amounts beyond `Decimal`'s 96-bit mantissa fall back to `"<n> wei"`.
pub fn format_ether(amount: Amount) -> String {
    let as_signed = match i128::try_from(amount) {
        Ok(value) => value,
        Err(_) => return format!("{amount} wei"),
    };
    match Decimal::try_from_i128_with_scale(as_signed, 18) {
        Ok(value) => value.normalize().to_string(),
        Err(_) => format!("{amount} wei"),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Int(u64),
    Text(String),
}

impl RawAmount {
    fn into_amount(self) -> Result<Amount, UnitsError> {
        match self {
            RawAmount::Int(value) => Ok(Amount::from(value)),
            RawAmount::Text(text) => parse_amount(&text),
        }
    }
}

/// `#[serde(with = "serde_amount")]` for a single [`Amount`] field
pub mod serde_amount {
    use super::{Amount, RawAmount};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        RawAmount::deserialize(deserializer)?
            .into_amount()
            .map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "serde_amount_map")]` for per-asset balance maps
pub mod serde_amount_map {
    use super::{Amount, RawAmount};
    use crate::identity::Asset;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<Asset, Amount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (asset, amount) in map {
            out.serialize_entry(asset, &amount.to_string())?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Asset, Amount>, D::Error> {
        let raw = BTreeMap::<Asset, RawAmount>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(asset, amount)| {
                amount
                    .into_amount()
                    .map(|value| (asset, value))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Asset;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_amount("1000 ether").unwrap(), 1000 * WEI_PER_ETHER);
        assert_eq!(parse_amount("0.1 ETH").unwrap(), WEI_PER_ETHER / 10);
        assert_eq!(parse_amount("3 gwei").unwrap(), 3 * WEI_PER_GWEI);
        assert_eq!(parse_amount("1_000_000").unwrap(), 1_000_000);
        assert_eq!(
            parse_amount("340282366920938463463374607431768211455").unwrap(),
            u128::MAX
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            parse_amount("1 wei extra"),
            Err(UnitsError::InvalidAmount { .. })
        ));
        assert!(matches!(
            parse_amount("5 dollars"),
            Err(UnitsError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_amount("0.5 wei"),
            Err(UnitsError::FractionalBaseUnits { .. })
        ));
        assert!(matches!(
            parse_amount("-1 ether"),
            Err(UnitsError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(0), "0");
        assert_eq!(format_ether(25 * WEI_PER_ETHER), "25");
        assert_eq!(format_ether(WEI_PER_ETHER / 10), "0.1");
        assert_eq!(format_ether(u128::MAX), format!("{} wei", u128::MAX));
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Holding {
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(default, with = "serde_amount_map")]
        balances: BTreeMap<Asset, Amount>,
    }

    #[test]
    fn test_serde_amounts_from_json_and_toml() {
        let json: Holding =
            serde_json::from_str(r#"{"amount": 7, "balances": {"ETH": "2 ether"}}"#).unwrap();
        assert_eq!(json.amount, 7);
        assert_eq!(json.balances[&Asset::native()], 2 * WEI_PER_ETHER);

        let toml_doc: Holding = toml::from_str(
            "amount = \"1000000 ether\"\n[balances]\nDVT = \"100\"\n",
        )
        .unwrap();
        assert_eq!(toml_doc.amount, 1_000_000 * WEI_PER_ETHER);
        assert_eq!(toml_doc.balances[&Asset::from("DVT")], 100);

        let back = serde_json::to_string(&json).unwrap();
        assert!(back.contains("\"amount\":\"7\""));
    }
}
