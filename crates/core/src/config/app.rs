//! Application configuration with profile support.
//!
//! Provides centralized configuration for the portfolio service with
//! support for different profiles (default, fast, conservative), loading from
//! a TOML file and `${VAR}` expansion for secrets in URLs.

use super::chain::{expand_env, ChainSettings, ContractSettings};
use alloy::primitives::{address, Address};
use folio_chain::FeeTier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::token::TokenDescriptor;

/// Main configuration structure containing all service parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Where hidden-token preferences are persisted
    #[serde(default = "default_visibility_file")]
    pub visibility_file: PathBuf,

    /// Network connection
    #[serde(default)]
    pub chain: ChainSettings,

    /// Contract addresses
    #[serde(default)]
    pub contracts: ContractSettings,

    /// Price resolution
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Liquidity pair enumeration
    #[serde(default)]
    pub liquidity: LiquidityConfig,

    /// Polling cadence and failure thresholds
    #[serde(default)]
    pub polling: PollingConfig,

    /// HTTP collaborators
    #[serde(default)]
    pub api: ApiConfig,

    /// Static token allow-list
    #[serde(default = "default_tokens")]
    pub tokens: Vec<StaticTokenConfig>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

fn default_visibility_file() -> PathBuf {
    PathBuf::from("folio-hidden-tokens.json")
}

const MAINNET_USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
const MAINNET_WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Price resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Stablecoin every quote is denominated in
    #[serde(default = "default_reference_stablecoin")]
    pub reference_stablecoin: Address,

    /// Wrapped native asset used for routed quotes (and as the native alias)
    #[serde(default = "default_base_asset")]
    pub base_asset: Option<Address>,

    /// Quoter fee tiers, probed in order
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,

    /// Symbols priced at exactly 1 USD (case-insensitive)
    #[serde(default = "default_stable_symbols")]
    pub stable_symbols: Vec<String>,

    /// Quotes above this are treated as no result
    #[serde(default = "default_max_usd_price")]
    pub max_usd_price: Decimal,

    /// Tokens resolved concurrently per cycle
    #[serde(default = "default_max_concurrent_quotes")]
    pub max_concurrent_quotes: usize,
}

fn default_reference_stablecoin() -> Address {
    MAINNET_USDC
}
fn default_base_asset() -> Option<Address> {
    Some(MAINNET_WETH)
}
fn default_fee_tiers() -> Vec<u32> {
    FeeTier::default_order()
}
fn default_stable_symbols() -> Vec<String> {
    ["USDC", "USDT", "DAI", "USDC.E", "USDT0", "BUSD", "FRAX", "LUSD", "PYUSD"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_usd_price() -> Decimal {
    Decimal::from(10_000_000u64)
}
fn default_max_concurrent_quotes() -> usize {
    8
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            reference_stablecoin: default_reference_stablecoin(),
            base_asset: default_base_asset(),
            fee_tiers: default_fee_tiers(),
            stable_symbols: default_stable_symbols(),
            max_usd_price: default_max_usd_price(),
            max_concurrent_quotes: default_max_concurrent_quotes(),
        }
    }
}

impl PricingConfig {
    /// Whether a symbol is configured as a USD stable.
    pub fn is_stable_symbol(&self, symbol: &str) -> bool {
        self.stable_symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol.trim()))
    }
}

/// Liquidity pair enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Cap on enumerated pairs, keeping the most recent; 0 reads every pair
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,

    /// Only return pairs the wallet holds LP tokens in
    #[serde(default = "default_only_held")]
    pub only_held: bool,
}

fn default_max_pairs() -> usize {
    0
}
fn default_only_held() -> bool {
    true
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            max_pairs: default_max_pairs(),
            only_held: default_only_held(),
        }
    }
}

/// Polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Token discovery refresh (seconds)
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// On-chain position + price refresh (seconds)
    #[serde(default = "default_onchain_interval")]
    pub onchain_interval_secs: u64,

    /// Upper bound for one reader family to settle (seconds)
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: u64,

    /// Consecutive discovery failures before the view reports data unavailable
    #[serde(default = "default_unavailable_after")]
    pub unavailable_after_failures: u32,
}

fn default_discovery_interval() -> u64 {
    60
}
fn default_onchain_interval() -> u64 {
    30
}
fn default_settle_timeout() -> u64 {
    20
}
fn default_unavailable_after() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            discovery_interval_secs: default_discovery_interval(),
            onchain_interval_secs: default_onchain_interval(),
            settle_timeout_secs: default_settle_timeout(),
            unavailable_after_failures: default_unavailable_after(),
        }
    }
}

impl PollingConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
    pub fn onchain_interval(&self) -> Duration {
        Duration::from_secs(self.onchain_interval_secs)
    }
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }
}

/// HTTP collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Token discovery service base URL
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,

    /// Position feed base URL (lending + collections); disabled when unset
    #[serde(default)]
    pub positions_url: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_discovery_url() -> String {
    "${FOLIO_DISCOVERY_URL}".to_string()
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            positions_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One curated token in the static allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTokenConfig {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
}

impl StaticTokenConfig {
    pub fn descriptor(&self) -> TokenDescriptor {
        let name = self.name.clone().unwrap_or_else(|| self.symbol.clone());
        TokenDescriptor::new(self.address, self.symbol.clone(), self.decimals, name)
            .with_logo(self.logo_uri.clone())
    }
}

fn default_tokens() -> Vec<StaticTokenConfig> {
    vec![
        StaticTokenConfig {
            address: MAINNET_USDC,
            symbol: "USDC".to_string(),
            decimals: 6,
            name: Some("USD Coin".to_string()),
            logo_uri: None,
        },
        StaticTokenConfig {
            address: MAINNET_WETH,
            symbol: "WETH".to_string(),
            decimals: 18,
            name: Some("Wrapped Ether".to_string()),
            logo_uri: None,
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            visibility_file: default_visibility_file(),
            chain: ChainSettings::default(),
            contracts: ContractSettings::default(),
            pricing: PricingConfig::default(),
            liquidity: LiquidityConfig::default(),
            polling: PollingConfig::default(),
            api: ApiConfig::default(),
            tokens: default_tokens(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and expand environment variables.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Create a fast profile: short intervals for an actively watched wallet.
    pub fn fast() -> Self {
        let base = Self::default();
        Self {
            profile: "fast".to_string(),
            chain: ChainSettings {
                call_timeout_ms: 4_000,
                max_block_age_secs: 60,
                ..base.chain
            },
            polling: PollingConfig {
                discovery_interval_secs: 20,
                onchain_interval_secs: 10,
                settle_timeout_secs: 8,
                unavailable_after_failures: 5,
            },
            pricing: PricingConfig {
                max_concurrent_quotes: 16,
                ..base.pricing
            },
            ..base
        }
    }

    /// Create a conservative profile: light load on public RPC endpoints.
    pub fn conservative() -> Self {
        let base = Self::default();
        Self {
            profile: "conservative".to_string(),
            chain: ChainSettings {
                batch_size: 100,
                call_timeout_ms: 15_000,
                max_block_age_secs: 300,
                ..base.chain
            },
            polling: PollingConfig {
                discovery_interval_secs: 300,
                onchain_interval_secs: 120,
                settle_timeout_secs: 45,
                unavailable_after_failures: 2,
            },
            pricing: PricingConfig {
                max_concurrent_quotes: 4,
                ..base.pricing
            },
            liquidity: LiquidityConfig {
                max_pairs: 200,
                only_held: true,
            },
            ..base
        }
    }

    /// Get profile from environment variable FOLIO_PROFILE, or default.
    /// Supported values: default, fast, conservative
    pub fn from_env() -> Self {
        let profile = std::env::var("FOLIO_PROFILE").unwrap_or_else(|_| "default".to_string());
        let mut config = match profile.to_lowercase().as_str() {
            "fast" => Self::fast(),
            "conservative" | "slow" => Self::conservative(),
            _ => Self::default(),
        };
        config.expand_env_vars();
        config
    }

    /// Load from the file named by FOLIO_CONFIG, else from the FOLIO_PROFILE profile.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("FOLIO_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::from_env()),
        }
    }

    /// Static allow-list as token descriptors.
    pub fn static_tokens(&self) -> Vec<TokenDescriptor> {
        self.tokens.iter().map(StaticTokenConfig::descriptor).collect()
    }

    /// Descriptor of the chain's native asset.
    pub fn native_token(&self) -> TokenDescriptor {
        TokenDescriptor::native(
            self.chain.native_symbol.clone(),
            self.chain.native_name.clone(),
            self.chain.native_decimals,
        )
    }

    /// Expand environment variables in URL values.
    pub fn expand_env_vars(&mut self) {
        self.chain.rpc_url = expand_env(&self.chain.rpc_url);
        self.api.discovery_url = expand_env(&self.api.discovery_url);
        if let Some(ref mut positions) = self.api.positions_url {
            *positions = expand_env(positions);
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Portfolio configuration loaded");
        tracing::info!(
            chain_id = self.chain.chain_id,
            multicall = %self.chain.multicall,
            batch_size = self.chain.batch_size,
            call_timeout_ms = self.chain.call_timeout_ms,
            "Chain settings"
        );
        tracing::info!(
            quoter = ?self.contracts.quoter,
            factory = ?self.contracts.ecosystem_factory,
            staking = ?self.contracts.staking,
            "Contracts"
        );
        tracing::info!(
            reference = %self.pricing.reference_stablecoin,
            base = ?self.pricing.base_asset,
            fee_tiers = ?self.pricing.fee_tiers,
            stables = self.pricing.stable_symbols.len(),
            max_concurrent = self.pricing.max_concurrent_quotes,
            "Pricing"
        );
        tracing::info!(
            discovery_secs = self.polling.discovery_interval_secs,
            onchain_secs = self.polling.onchain_interval_secs,
            settle_secs = self.polling.settle_timeout_secs,
            static_tokens = self.tokens.len(),
            "Polling"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.profile, "default");
        assert_eq!(config.pricing.fee_tiers, vec![3000, 500, 10000]);
        assert_eq!(config.polling.discovery_interval(), Duration::from_secs(60));
        assert_eq!(config.polling.onchain_interval(), Duration::from_secs(30));
        assert!(config.liquidity.only_held);
        assert_eq!(config.liquidity.max_pairs, 0);
        assert_eq!(config.tokens.len(), 2);
    }

    #[test]
    fn test_fast_profile() {
        let config = AppConfig::fast();
        assert_eq!(config.profile, "fast");
        assert!(config.polling.onchain_interval_secs < AppConfig::default().polling.onchain_interval_secs);
        assert_eq!(config.pricing.fee_tiers, vec![3000, 500, 10000]);
    }

    #[test]
    fn test_conservative_profile() {
        let config = AppConfig::conservative();
        assert_eq!(config.profile, "conservative");
        assert_eq!(config.chain.batch_size, 100);
        assert_eq!(config.liquidity.max_pairs, 200);
    }

    #[test]
    fn test_token_descriptors() {
        let config = AppConfig::default();
        let tokens = config.static_tokens();
        assert_eq!(tokens[0].symbol, "USDC");
        assert_eq!(tokens[0].decimals, 6);
        assert_eq!(tokens[0].display_name, "USD Coin");

        let native = config.native_token();
        assert!(native.is_native());
        assert_eq!(native.symbol, "ETH");
        assert_eq!(native.decimals, 18);
    }

    #[test]
    fn test_stable_symbol_match() {
        let pricing = PricingConfig::default();
        assert!(pricing.is_stable_symbol("usdc"));
        assert!(pricing.is_stable_symbol("USDC.e"));
        assert!(!pricing.is_stable_symbol("WETH"));
    }

    #[test]
    fn test_serialization() {
        let config = AppConfig::conservative();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"conservative\""));

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profile, "conservative");
        assert_eq!(parsed.pricing.max_usd_price, config.pricing.max_usd_price);
        assert_eq!(parsed.tokens, config.tokens);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            profile = "custom"

            [chain]
            rpc_url = "http://localhost:8545"
            batch_size = 50

            [contracts]
            staking = "0x1111111111111111111111111111111111111111"

            [pricing]
            stable_symbols = ["USDX"]
            max_usd_price = 1000

            [[tokens]]
            address = "0x2222222222222222222222222222222222222222"
            symbol = "ABC"
            decimals = 8
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chain.batch_size, 50);
        assert_eq!(config.chain.call_timeout_ms, 8_000);
        assert_eq!(config.contracts.staking, Some(Address::repeat_byte(0x11)));
        assert_eq!(config.contracts.quoter, AppConfig::default().contracts.quoter);
        assert_eq!(config.contracts.ecosystem_factory, None);
        assert!(config.pricing.is_stable_symbol("usdx"));
        assert!(!config.pricing.is_stable_symbol("USDC"));
        assert_eq!(config.pricing.max_usd_price, Decimal::from(1000u64));
        assert_eq!(config.pricing.fee_tiers, vec![3000, 500, 10000]);
        assert_eq!(config.tokens.len(), 1);
        assert_eq!(config.polling.unavailable_after_failures, 3);
    }

    #[test]
    fn test_env_expansion_on_urls() {
        std::env::set_var("FOLIO_APP_TEST_KEY", "secret");
        let mut config = AppConfig::default();
        config.chain.rpc_url = "https://rpc.example.org/${FOLIO_APP_TEST_KEY}".to_string();
        config.api.positions_url = Some("https://feed/${FOLIO_APP_TEST_KEY}".to_string());
        config.expand_env_vars();
        assert_eq!(config.chain.rpc_url, "https://rpc.example.org/secret");
        assert_eq!(config.api.positions_url.as_deref(), Some("https://feed/secret"));
        std::env::remove_var("FOLIO_APP_TEST_KEY");
    }
}
