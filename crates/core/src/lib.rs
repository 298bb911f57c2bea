//! Portfolio valuation core.
//!
//! This crate provides:
//! - Token registry merging a static allow-list with discovered tokens
//! - Tiered USD price resolution with a per-cycle quote session
//! - Staking, liquidity, holdings and external position readers
//! - Pure portfolio valuation into a [`PortfolioSnapshot`]
//! - A polling service publishing [`PortfolioView`]s for one wallet
//!
//! All on-chain reads go through an `Arc<dyn ChainReader>`, so every
//! component can be driven by a mock in tests.

pub mod amount;
pub mod config;
mod external;
mod holdings;
mod liquidity;
mod position;
pub mod pricing;
mod registry;
mod scheduler;
mod staking;
mod token;
mod valuation;
mod visibility;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use external::{ExternalPositions, ExternalReader};
pub use holdings::HoldingsReader;
pub use liquidity::LiquidityReader;
pub use position::{
    CollectionItem, Holding, LendingPosition, Legs, LiquidityPair, Position, StakingPool, Venue,
};
pub use pricing::{PriceBook, PriceQuote, PriceResolver, PriceSource, PricingContext};
pub use registry::{introspect, RegistryEntry, TokenMetadata, TokenRegistry, DEFAULT_DECIMALS};
pub use scheduler::{PortfolioService, PortfolioView, SchedulerSettings};
pub use staking::StakingReader;
pub use token::{short_address, TokenDescriptor, NATIVE_ADDRESS};
pub use valuation::{compute_snapshot, PortfolioSnapshot, PortfolioValuation, ValuationInputs};
pub use visibility::VisibilityFilter;
