//! Token discovery service: which tokens a wallet holds.

use crate::de::{deserialize_non_empty, deserialize_optional_u8, deserialize_u256};
use crate::error::ApiError;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;

/// One token reported by the discovery service.
///
/// Metadata fields are optional; the registry introspects anything missing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredToken {
    pub address: Address,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_u8")]
    pub decimals: Option<u8>,
    #[serde(default, alias = "logoURI", deserialize_with = "deserialize_non_empty")]
    pub logo_uri: Option<String>,
    /// Balance in smallest units as last indexed by the service
    #[serde(default, alias = "balance", deserialize_with = "deserialize_u256")]
    pub raw_balance: U256,
}

impl DiscoveredToken {
    /// Token with only an address and balance known.
    pub fn bare(address: Address, raw_balance: U256) -> Self {
        Self {
            address,
            symbol: None,
            name: None,
            decimals: None,
            logo_uri: None,
            raw_balance,
        }
    }
}

/// Source of the tokens held by a wallet.
#[async_trait]
pub trait TokenDiscovery: Send + Sync + Debug {
    async fn discover_tokens(&self, wallet: Address) -> Result<Vec<DiscoveredToken>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_number_formats() {
        let json = r#"[
            {
                "address": "0x1111111111111111111111111111111111111111",
                "symbol": "ABC",
                "name": "Alpha Beta",
                "decimals": "6",
                "logoUri": "https://example.org/abc.png",
                "rawBalance": "2500000"
            },
            {
                "address": "0x2222222222222222222222222222222222222222",
                "decimals": 18,
                "rawBalance": 42
            },
            {
                "address": "0x3333333333333333333333333333333333333333",
                "symbol": "",
                "decimals": null,
                "rawBalance": "0x10"
            }
        ]"#;

        let tokens: Vec<DiscoveredToken> = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.len(), 3);

        assert_eq!(tokens[0].symbol.as_deref(), Some("ABC"));
        assert_eq!(tokens[0].decimals, Some(6));
        assert_eq!(tokens[0].raw_balance, U256::from(2_500_000u64));

        assert_eq!(tokens[1].symbol, None);
        assert_eq!(tokens[1].decimals, Some(18));
        assert_eq!(tokens[1].raw_balance, U256::from(42u64));

        assert_eq!(tokens[2].symbol, None);
        assert_eq!(tokens[2].decimals, None);
        assert_eq!(tokens[2].raw_balance, U256::from(16u64));
    }

    #[test]
    fn test_missing_balance_is_zero() {
        let json = r#"{"address": "0x1111111111111111111111111111111111111111"}"#;
        let token: DiscoveredToken = serde_json::from_str(json).unwrap();
        assert_eq!(token, DiscoveredToken::bare(token.address, U256::ZERO));
    }

    #[test]
    fn test_rejects_out_of_range_decimals() {
        let json = r#"{"address": "0x1111111111111111111111111111111111111111", "decimals": 300}"#;
        assert!(serde_json::from_str::<DiscoveredToken>(json).is_err());
    }
}
