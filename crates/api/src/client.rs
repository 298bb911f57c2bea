//! HTTP client for the discovery service and the position feed.

use crate::discovery::{DiscoveredToken, TokenDiscovery};
use crate::error::ApiError;
use crate::positions::{CollectionItemDto, LendingPositionDto, PositionFeed};
use alloy::primitives::Address;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// List endpoints answer either with a bare array or a paginated wrapper.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { results: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) => items,
            ListResponse::Wrapped { results } => results,
        }
    }
}

/// Portfolio API client (token discovery + position feed).
#[derive(Debug, Clone)]
pub struct PortfolioApiClient {
    client: reqwest::Client,
    discovery_url: String,
    /// Position feed base URL; lending/collection lists are empty when unset
    positions_url: Option<String>,
}

impl PortfolioApiClient {
    /// Create a new client with a request timeout.
    pub fn new(
        discovery_url: impl Into<String>,
        positions_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            discovery_url: trim_base(discovery_url.into()),
            positions_url: positions_url.map(trim_base),
        })
    }

    /// Get the discovery base URL.
    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    fn wallet_url(base: &str, wallet: Address, resource: &str) -> String {
        format!(
            "{}/wallets/{}/{}",
            base,
            wallet.to_string().to_lowercase(),
            resource
        )
    }

    async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ApiError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let list: ListResponse<T> =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(list.into_vec())
    }

    fn positions_base(&self) -> Result<&str, ApiError> {
        self.positions_url
            .as_deref()
            .ok_or(ApiError::NotConfigured("positions"))
    }
}

#[async_trait]
impl TokenDiscovery for PortfolioApiClient {
    #[instrument(skip(self), fields(wallet = %wallet))]
    async fn discover_tokens(&self, wallet: Address) -> Result<Vec<DiscoveredToken>, ApiError> {
        let url = Self::wallet_url(&self.discovery_url, wallet, "tokens");
        let tokens: Vec<DiscoveredToken> = self.get_list(&url).await?;
        debug!(count = tokens.len(), "Discovered wallet tokens");
        Ok(tokens)
    }
}

#[async_trait]
impl PositionFeed for PortfolioApiClient {
    #[instrument(skip(self), fields(wallet = %wallet))]
    async fn lending_positions(&self, wallet: Address) -> Result<Vec<LendingPositionDto>, ApiError> {
        let base = match self.positions_base() {
            Ok(base) => base,
            Err(_) => return Ok(Vec::new()),
        };
        let url = Self::wallet_url(base, wallet, "lending");
        let positions: Vec<LendingPositionDto> = self.get_list(&url).await?;
        debug!(count = positions.len(), "Fetched lending positions");
        Ok(positions)
    }

    #[instrument(skip(self), fields(wallet = %wallet))]
    async fn collection_items(&self, wallet: Address) -> Result<Vec<CollectionItemDto>, ApiError> {
        let base = match self.positions_base() {
            Ok(base) => base,
            Err(_) => return Ok(Vec::new()),
        };
        let url = Self::wallet_url(base, wallet, "collections");
        let items: Vec<CollectionItemDto> = self.get_list(&url).await?;
        debug!(count = items.len(), "Fetched collection items");
        Ok(items)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_url_is_lowercase() {
        let wallet: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        let url = PortfolioApiClient::wallet_url("https://api.example.org", wallet, "tokens");
        assert_eq!(
            url,
            "https://api.example.org/wallets/0xabcdef0123456789abcdef0123456789abcdef01/tokens"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = PortfolioApiClient::new(
            "https://api.example.org/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.discovery_url(), "https://api.example.org");
    }

    #[test]
    fn test_list_response_shapes() {
        let bare: ListResponse<u32> = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);

        let wrapped: ListResponse<u32> = serde_json::from_str(r#"{"results": [3]}"#).unwrap();
        assert_eq!(wrapped.into_vec(), vec![3]);
    }

    #[tokio::test]
    async fn test_positions_unconfigured_is_empty() {
        let client =
            PortfolioApiClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let wallet = Address::repeat_byte(0x01);
        assert!(client.lending_positions(wallet).await.unwrap().is_empty());
        assert!(client.collection_items(wallet).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_discover_tokens_live() {
        let url = std::env::var("FOLIO_DISCOVERY_URL").unwrap();
        let client = PortfolioApiClient::new(url, None, Duration::from_secs(10)).unwrap();
        let tokens = client.discover_tokens(Address::ZERO).await;
        assert!(tokens.is_ok());
    }
}
