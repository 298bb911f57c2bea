//! External position feed: lending positions and non-fungible holdings.
//!
//! Both lists are consumed as-is for valuation; nothing here is read on chain.

use crate::de::{deserialize_non_empty, deserialize_u256};
use crate::error::ApiError;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;

/// Token amount inside a lending position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmountDto {
    pub address: Address,
    #[serde(default, alias = "amount", deserialize_with = "deserialize_u256")]
    pub raw_amount: U256,
}

/// A collateralized-debt position on one lending market.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingPositionDto {
    pub protocol: String,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub market: Option<String>,
    #[serde(default)]
    pub collateral: Vec<AssetAmountDto>,
    #[serde(default)]
    pub debt: Vec<AssetAmountDto>,
}

/// One non-fungible item with its collection floor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItemDto {
    pub collection: Address,
    #[serde(deserialize_with = "deserialize_u256")]
    pub token_id: U256,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub name: Option<String>,
    /// Token the floor price is denominated in
    pub floor_token: Address,
    #[serde(default, deserialize_with = "deserialize_u256")]
    pub floor_raw: U256,
}

/// Source of externally indexed positions.
#[async_trait]
pub trait PositionFeed: Send + Sync + Debug {
    async fn lending_positions(&self, wallet: Address) -> Result<Vec<LendingPositionDto>, ApiError>;

    async fn collection_items(&self, wallet: Address) -> Result<Vec<CollectionItemDto>, ApiError>;
}
