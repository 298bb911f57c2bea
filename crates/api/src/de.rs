//! Lenient deserializers: the services report numbers either as JSON numbers
//! or as strings.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(u64),
    Float(f64),
}

fn u256_from_f64<E: serde::de::Error>(n: f64) -> Result<U256, E> {
    if !n.is_finite() || n < 0.0 || n >= u128::MAX as f64 {
        return Err(E::custom(format!("amount out of range: {n}")));
    }
    Ok(U256::from(n.trunc() as u128))
}

/// `U256` from a decimal/hex string or a JSON number. Missing or null is 0.
pub(crate) fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(U256::ZERO),
        Some(StringOrNumber::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(U256::ZERO)
            } else {
                U256::from_str(s).map_err(serde::de::Error::custom)
            }
        }
        Some(StringOrNumber::Int(n)) => Ok(U256::from(n)),
        Some(StringOrNumber::Float(n)) => u256_from_f64(n),
    }
}

/// Optional `u8` from a string or a JSON number.
pub(crate) fn deserialize_optional_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(StringOrNumber::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(StringOrNumber::String(s)) => s.trim().parse::<u64>().map_err(serde::de::Error::custom)?,
        Some(StringOrNumber::Int(n)) => n,
        Some(StringOrNumber::Float(n)) if n.fract() == 0.0 && n >= 0.0 => n as u64,
        Some(StringOrNumber::Float(n)) => {
            return Err(serde::de::Error::custom(format!("invalid decimals: {n}")))
        }
    };
    u8::try_from(value)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("decimals out of range: {value}")))
}

/// Optional string where an empty string counts as absent.
pub(crate) fn deserialize_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
