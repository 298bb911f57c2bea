//! Portfolio API clients for external services.
//!
//! This crate provides:
//! - [`TokenDiscovery`]: which tokens a wallet holds (indexer-backed)
//! - [`PositionFeed`]: lending positions and non-fungible holdings
//! - [`PortfolioApiClient`]: the reqwest implementation of both

mod client;
mod de;
mod discovery;
mod error;
mod positions;

pub use client::PortfolioApiClient;
pub use discovery::{DiscoveredToken, TokenDiscovery};
pub use error::ApiError;
pub use positions::{AssetAmountDto, CollectionItemDto, LendingPositionDto, PositionFeed};
