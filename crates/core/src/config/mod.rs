//! Configuration for the portfolio service.
//!
//! This module provides:
//! - Application configuration (profiles, polling cadence, pricing, API endpoints)
//! - Chain configuration (RPC endpoint, Multicall3, batch limits, contracts)

mod app;
mod chain;

pub use app::{
    ApiConfig, AppConfig, LiquidityConfig, PollingConfig, PricingConfig, StaticTokenConfig,
};
pub use chain::{ChainSettings, ContractSettings};
