//! Chain and contract configuration.

use alloy::primitives::{address, Address};
use folio_chain::MULTICALL3_ADDRESS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    /// HTTP RPC endpoint; `${VAR}` patterns are expanded from the environment
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Chain ID (informational, checked against the node at startup)
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Native asset symbol (e.g., "ETH")
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,

    /// Native asset display name
    #[serde(default = "default_native_name")]
    pub native_name: String,

    /// Native asset decimals
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,

    /// Multicall3 deployment used for every batched read
    #[serde(default = "default_multicall")]
    pub multicall: Address,

    /// Maximum calls per aggregate3 request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout for one aggregate3 request (milliseconds)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Latest block older than this marks the network unhealthy (seconds)
    #[serde(default = "default_max_block_age")]
    pub max_block_age_secs: u64,
}

fn default_rpc_url() -> String {
    "${FOLIO_RPC_URL}".to_string()
}
fn default_chain_id() -> u64 {
    1
}
fn default_native_symbol() -> String {
    "ETH".to_string()
}
fn default_native_name() -> String {
    "Ether".to_string()
}
fn default_native_decimals() -> u8 {
    18
}
fn default_multicall() -> Address {
    MULTICALL3_ADDRESS
}
fn default_batch_size() -> usize {
    200
}
fn default_call_timeout() -> u64 {
    8_000
}
fn default_max_block_age() -> u64 {
    120
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            native_symbol: default_native_symbol(),
            native_name: default_native_name(),
            native_decimals: default_native_decimals(),
            multicall: default_multicall(),
            batch_size: default_batch_size(),
            call_timeout_ms: default_call_timeout(),
            max_block_age_secs: default_max_block_age(),
        }
    }
}

impl ChainSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
    pub fn max_block_age(&self) -> Duration {
        Duration::from_secs(self.max_block_age_secs)
    }
}

/// Contract addresses. Each reader/tier is disabled when its address is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSettings {
    /// Uniswap V3 QuoterV2 (external aggregator venue)
    #[serde(default = "default_quoter")]
    pub quoter: Option<Address>,

    /// In-ecosystem UniswapV2-style factory
    #[serde(default)]
    pub ecosystem_factory: Option<Address>,

    /// Multi-pool staking contract
    #[serde(default)]
    pub staking: Option<Address>,
}

fn default_quoter() -> Option<Address> {
    Some(address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"))
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            quoter: default_quoter(),
            ecosystem_factory: None,
            staking: None,
        }
    }
}

/// Expand ${VAR_NAME} patterns with environment variable values.
/// Unknown variables are left as-is.
pub(crate) fn expand_env(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env() {
        // Unique var name: tests run in parallel
        std::env::set_var("FOLIO_CHAIN_TEST_VAR", "test_value");
        assert_eq!(expand_env("${FOLIO_CHAIN_TEST_VAR}"), "test_value");
        assert_eq!(
            expand_env("https://rpc/${FOLIO_CHAIN_TEST_VAR}/v2"),
            "https://rpc/test_value/v2"
        );
        assert_eq!(expand_env("no_vars"), "no_vars");
        assert_eq!(
            expand_env("${FOLIO_CHAIN_TEST_UNSET_VAR}"),
            "${FOLIO_CHAIN_TEST_UNSET_VAR}"
        );
        std::env::remove_var("FOLIO_CHAIN_TEST_VAR");
    }

    #[test]
    fn test_chain_defaults() {
        let chain = ChainSettings::default();
        assert_eq!(chain.multicall, MULTICALL3_ADDRESS);
        assert_eq!(chain.call_timeout(), Duration::from_secs(8));
        assert_eq!(chain.native_decimals, 18);
    }
}
