//! Provider management for HTTP RPC connections.
//! Uses Alloy providers; every contract read is funneled through Multicall3.

use crate::contracts::IMulticall3;
use crate::reader::{CallBatch, ChainReader, ReadCall, ReadFailure, ReadResult};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Latest network health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub block_number: u64,
    pub gas_price_gwei: f64,
    /// Latest block is no older than the configured maximum age
    pub is_healthy: bool,
    pub last_block_timestamp: u64,
}

/// Provider manager for one EVM network.
///
/// Implements [`ChainReader`] by packing calls into Multicall3 `aggregate3`
/// requests with `allowFailure = true`, chunked by `batch_size`.
#[derive(Debug, Clone)]
pub struct ProviderManager {
    /// HTTP RPC URL
    rpc_url: String,
    /// Multicall3 deployment
    multicall: Address,
    /// Maximum calls per aggregate3 request
    batch_size: usize,
    /// Timeout applied to each aggregate3 request
    call_timeout: Duration,
}

impl ProviderManager {
    /// Create a new provider manager and verify the connection.
    pub async fn new(
        rpc_url: &str,
        multicall: Address,
        batch_size: usize,
        call_timeout: Duration,
    ) -> Result<Self> {
        info!(
            rpc = rpc_url,
            multicall = %multicall,
            batch_size = batch_size,
            timeout_ms = call_timeout.as_millis() as u64,
            "Initializing provider manager"
        );

        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let block = provider.get_block_number().await?;
        info!(block = block, "Provider connection verified");

        Ok(Self::unverified(rpc_url, multicall, batch_size, call_timeout))
    }

    /// Create a provider manager without touching the network.
    pub fn unverified(
        rpc_url: &str,
        multicall: Address,
        batch_size: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            multicall,
            batch_size: batch_size.max(1),
            call_timeout,
        }
    }

    /// Get the RPC URL.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the Multicall3 address.
    pub fn multicall_address(&self) -> Address {
        self.multicall
    }

    /// Get current block number.
    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let block = provider.get_block_number().await?;
        Ok(block)
    }

    /// Get chain ID.
    pub async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let chain_id = provider.get_chain_id().await?;
        Ok(chain_id)
    }

    /// Probe block height, block age and gas price.
    ///
    /// Block data comes from Multicall3 so it shares the read path with every
    /// other call; gas price is a plain `eth_gasPrice`.
    pub async fn network_status(&self, max_block_age: Duration) -> Result<NetworkStatus> {
        let mut batch = CallBatch::with_capacity(2);
        let block_slot = batch.push(self.multicall, IMulticall3::getBlockNumberCall {});
        let ts_slot = batch.push(self.multicall, IMulticall3::getCurrentBlockTimestampCall {});

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let (results, gas_price) = tokio::join!(batch.execute(self), provider.get_gas_price());

        let block_number = u64::try_from(results.get(block_slot)?.blockNumber).unwrap_or(u64::MAX);
        let last_block_timestamp =
            u64::try_from(results.get(ts_slot)?.timestamp).unwrap_or(u64::MAX);
        let gas_price_gwei = gas_price? as f64 / 1e9;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let is_healthy = block_is_fresh(last_block_timestamp, now, max_block_age);

        debug!(
            block = block_number,
            gas_gwei = gas_price_gwei,
            healthy = is_healthy,
            "Network status probed"
        );

        Ok(NetworkStatus {
            block_number,
            gas_price_gwei,
            is_healthy,
            last_block_timestamp,
        })
    }

    /// Check if provider is healthy.
    pub async fn health_check(&self) -> Result<bool> {
        let block = self.block_number().await?;
        debug!(block = block, "Provider health check passed");
        Ok(block > 0)
    }

    /// Execute one aggregate3 request.
    async fn aggregate(&self, chunk: &[ReadCall]) -> Vec<ReadResult<Bytes>> {
        let url = match self.rpc_url.parse::<alloy::transports::http::reqwest::Url>() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid RPC URL");
                return vec![Err(ReadFailure::Transport(e.to_string())); chunk.len()];
            }
        };
        let provider = ProviderBuilder::new().on_http(url);
        let multicall = IMulticall3::new(self.multicall, &provider);

        let calls: Vec<IMulticall3::Call3> = chunk
            .iter()
            .map(|c| IMulticall3::Call3 {
                target: c.target,
                allowFailure: true,
                callData: c.calldata.clone(),
            })
            .collect();
        let request = multicall.aggregate3(calls);

        match tokio::time::timeout(self.call_timeout, request.call()).await {
            Ok(Ok(ret)) => unpack_aggregate(ret.returnData, chunk.len()),
            Ok(Err(e)) => {
                warn!(calls = chunk.len(), error = %e, "aggregate3 request failed");
                vec![Err(ReadFailure::Transport(e.to_string())); chunk.len()]
            }
            Err(_) => {
                warn!(
                    calls = chunk.len(),
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "aggregate3 request timed out"
                );
                vec![Err(ReadFailure::Timeout(self.call_timeout)); chunk.len()]
            }
        }
    }
}

#[async_trait]
impl ChainReader for ProviderManager {
    async fn call_batch(&self, calls: &[ReadCall]) -> Vec<ReadResult<Bytes>> {
        let chunks = calls.chunks(self.batch_size);
        debug!(
            calls = calls.len(),
            requests = chunks.len(),
            "Executing multicall batch"
        );

        join_all(chunks.map(|chunk| self.aggregate(chunk)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Map aggregate3 results onto per-call results, padding any shortfall.
fn unpack_aggregate(results: Vec<IMulticall3::Result>, expected: usize) -> Vec<ReadResult<Bytes>> {
    let mut out: Vec<ReadResult<Bytes>> = results
        .into_iter()
        .take(expected)
        .map(|r| {
            if r.success {
                Ok(r.returnData)
            } else {
                Err(ReadFailure::Reverted)
            }
        })
        .collect();

    if out.len() < expected {
        warn!(
            got = out.len(),
            expected = expected,
            "aggregate3 returned fewer results than calls"
        );
        out.resize(
            expected,
            Err(ReadFailure::Decode("missing aggregate3 result".to_string())),
        );
    }
    out
}

fn block_is_fresh(block_timestamp: u64, now: u64, max_age: Duration) -> bool {
    now.saturating_sub(block_timestamp) <= max_age.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::MULTICALL3_ADDRESS;

    #[test]
    fn test_unpack_aggregate_maps_success_flags() {
        let results = vec![
            IMulticall3::Result {
                success: true,
                returnData: Bytes::from(vec![1u8; 32]),
            },
            IMulticall3::Result {
                success: false,
                returnData: Bytes::new(),
            },
        ];
        let unpacked = unpack_aggregate(results, 3);
        assert_eq!(unpacked.len(), 3);
        assert!(unpacked[0].is_ok());
        assert_eq!(unpacked[1], Err(ReadFailure::Reverted));
        assert!(matches!(unpacked[2], Err(ReadFailure::Decode(_))));
    }

    #[test]
    fn test_block_freshness() {
        let max = Duration::from_secs(60);
        assert!(block_is_fresh(1_000, 1_030, max));
        assert!(block_is_fresh(1_000, 1_060, max));
        assert!(!block_is_fresh(1_000, 1_061, max));
        // Clock skew: block from the future counts as fresh
        assert!(block_is_fresh(2_000, 1_000, max));
    }

    #[test]
    fn test_batch_size_floor() {
        let pm = ProviderManager::unverified(
            "http://localhost:8545",
            MULTICALL3_ADDRESS,
            0,
            Duration::from_secs(5),
        );
        assert_eq!(pm.batch_size, 1);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_every_call() {
        let pm = ProviderManager::unverified(
            "not a url",
            MULTICALL3_ADDRESS,
            10,
            Duration::from_secs(1),
        );
        let calls = vec![
            ReadCall {
                target: Address::ZERO,
                calldata: Bytes::new(),
            };
            3
        ];
        let results = pm.call_batch(&calls).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, Err(ReadFailure::Transport(_)))));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_provider_creation() {
        let provider = ProviderManager::new(
            "https://eth.llamarpc.com",
            MULTICALL3_ADDRESS,
            100,
            Duration::from_secs(10),
        )
        .await;

        assert!(provider.is_ok());
    }
}
