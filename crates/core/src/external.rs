//! Lending and collection positions from the external position feed.

use alloy::primitives::{Address, U256};
use folio_api::{AssetAmountDto, CollectionItemDto, LendingPositionDto, PositionFeed};
use folio_chain::ChainReader;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::position::{CollectionItem, LendingPosition};
use crate::registry::TokenRegistry;
use crate::token::TokenDescriptor;

/// Lending positions and collection items fetched for one wallet.
#[derive(Debug, Clone, Default)]
pub struct ExternalPositions {
    pub lending: Vec<LendingPosition>,
    pub collections: Vec<CollectionItem>,
}

/// Fetches feed lists and attaches token descriptors to every asset leg.
#[derive(Debug, Clone)]
pub struct ExternalReader {
    feed: Arc<dyn PositionFeed>,
}

impl ExternalReader {
    pub fn new(feed: Arc<dyn PositionFeed>) -> Self {
        Self { feed }
    }

    /// Both lists, fetched concurrently. A failed list is empty.
    #[instrument(skip(self, registry, chain))]
    pub async fn read(
        &self,
        wallet: Address,
        registry: &TokenRegistry,
        chain: &dyn ChainReader,
    ) -> ExternalPositions {
        let (lending, collections) = tokio::join!(
            self.feed.lending_positions(wallet),
            self.feed.collection_items(wallet)
        );
        let lending = lending.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch lending positions");
            Vec::new()
        });
        let collections = collections.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch collection items");
            Vec::new()
        });

        let addresses: Vec<Address> = lending
            .iter()
            .flat_map(|p| p.collateral.iter().chain(p.debt.iter()))
            .map(|leg| leg.address)
            .chain(collections.iter().map(|c| c.floor_token))
            .collect();
        let tokens = registry.describe(chain, addresses).await;

        let positions = ExternalPositions {
            lending: lending.into_iter().map(|p| to_lending(p, &tokens)).collect(),
            collections: collections
                .into_iter()
                .map(|c| to_collection(c, &tokens))
                .collect(),
        };
        debug!(
            lending = positions.lending.len(),
            collections = positions.collections.len(),
            "External positions read"
        );
        positions
    }
}

fn descriptor(tokens: &HashMap<Address, TokenDescriptor>, address: Address) -> TokenDescriptor {
    tokens
        .get(&address)
        .cloned()
        .unwrap_or_else(|| TokenDescriptor::unknown(address))
}

fn legs(
    amounts: Vec<AssetAmountDto>,
    tokens: &HashMap<Address, TokenDescriptor>,
) -> Vec<(TokenDescriptor, U256)> {
    amounts
        .into_iter()
        .map(|a| (descriptor(tokens, a.address), a.raw_amount))
        .collect()
}

fn to_lending(dto: LendingPositionDto, tokens: &HashMap<Address, TokenDescriptor>) -> LendingPosition {
    LendingPosition {
        protocol: dto.protocol,
        market: dto.market,
        collateral: legs(dto.collateral, tokens),
        debt: legs(dto.debt, tokens),
    }
}

fn to_collection(dto: CollectionItemDto, tokens: &HashMap<Address, TokenDescriptor>) -> CollectionItem {
    CollectionItem {
        collection: dto.collection,
        token_id: dto.token_id,
        name: dto.name,
        floor_token: descriptor(tokens, dto.floor_token),
        floor_raw: dto.floor_raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChain, MockFeed};

    fn usdc() -> TokenDescriptor {
        TokenDescriptor::new(Address::repeat_byte(0x01), "USDC", 6, "USD Coin")
    }

    #[tokio::test]
    async fn test_attaches_descriptors() {
        let unknown = Address::repeat_byte(0x77);
        let feed = MockFeed {
            lending: vec![LendingPositionDto {
                protocol: "lend".to_string(),
                market: Some("main".to_string()),
                collateral: vec![AssetAmountDto {
                    address: usdc().address,
                    raw_amount: U256::from(10u64),
                }],
                debt: vec![AssetAmountDto {
                    address: unknown,
                    raw_amount: U256::from(3u64),
                }],
            }],
            collections: vec![CollectionItemDto {
                collection: Address::repeat_byte(0xc0),
                token_id: U256::from(7u64),
                name: None,
                floor_token: Address::ZERO,
                floor_raw: U256::from(1u64),
            }],
        };
        let chain = MockChain::new();
        let registry =
            TokenRegistry::from_static(&[usdc()], TokenDescriptor::native("ETH", "Ether", 18));

        let positions = ExternalReader::new(Arc::new(feed))
            .read(Address::repeat_byte(0xee), &registry, &chain)
            .await;

        assert_eq!(positions.lending.len(), 1);
        let lending = &positions.lending[0];
        assert_eq!(lending.collateral[0].0, usdc());
        assert_eq!(lending.debt[0].0.decimals, 18);
        assert_eq!(positions.collections[0].floor_token.symbol, "ETH");
        assert_eq!(positions.collections[0].token_id, U256::from(7u64));
    }
}
