//! Token descriptors.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Sentinel address standing for the chain's native asset.
pub const NATIVE_ADDRESS: Address = Address::ZERO;

/// Immutable token metadata. Identity is the contract address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl TokenDescriptor {
    pub fn new(
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
            display_name: display_name.into(),
            logo_uri: None,
        }
    }

    pub fn with_logo(mut self, logo_uri: Option<String>) -> Self {
        self.logo_uri = logo_uri;
        self
    }

    /// Native asset descriptor (sentinel address).
    pub fn native(symbol: impl Into<String>, display_name: impl Into<String>, decimals: u8) -> Self {
        Self::new(NATIVE_ADDRESS, symbol, decimals, display_name)
    }

    /// Placeholder for a token nothing is known about: shortened address, 18 decimals.
    pub fn unknown(address: Address) -> Self {
        let short = short_address(address);
        Self::new(address, short.clone(), 18, short)
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ADDRESS
    }

    /// Lowercase hex rendering of the address.
    pub fn key(&self) -> String {
        self.address.to_string().to_lowercase()
    }

    /// Logo placeholder: first two letters/digits of the symbol, uppercase.
    pub fn glyph(&self) -> String {
        let glyph: String = self
            .symbol
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();
        if glyph.is_empty() {
            "?".to_string()
        } else {
            glyph
        }
    }
}

/// `0x1234...abcd` form of an address.
pub fn short_address(address: Address) -> String {
    let full = address.to_string().to_lowercase();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph() {
        let token = TokenDescriptor::new(Address::repeat_byte(1), "weth", 18, "Wrapped Ether");
        assert_eq!(token.glyph(), "WE");

        let token = TokenDescriptor::new(Address::repeat_byte(1), "$x", 18, "X");
        assert_eq!(token.glyph(), "X");

        let token = TokenDescriptor::new(Address::repeat_byte(1), "", 18, "");
        assert_eq!(token.glyph(), "?");
    }

    #[test]
    fn test_short_address() {
        let addr: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        assert_eq!(short_address(addr), "0xabcd...ef01");
        let unknown = TokenDescriptor::unknown(addr);
        assert_eq!(unknown.symbol, "0xabcd...ef01");
        assert_eq!(unknown.decimals, 18);
    }

    #[test]
    fn test_native() {
        let native = TokenDescriptor::native("ETH", "Ether", 18);
        assert!(native.is_native());
        assert_eq!(native.key(), "0x0000000000000000000000000000000000000000");
    }
}
