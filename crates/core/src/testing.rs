//! Test doubles for the chain reader and the HTTP collaborators.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use folio_api::{
    ApiError, CollectionItemDto, DiscoveredToken, LendingPositionDto, PositionFeed, TokenDiscovery,
};
use folio_chain::{ChainReader, ReadCall, ReadFailure, ReadResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Chain reader answering from a response table keyed by target + calldata.
/// Unknown calls revert. Every call is logged in order.
#[derive(Debug, Default)]
pub(crate) struct MockChain {
    responses: Mutex<HashMap<(Address, Bytes), ReadResult<Bytes>>>,
    log: Mutex<Vec<ReadCall>>,
    delay: Mutex<Option<Duration>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `call` on `target` with pre-encoded return data.
    pub fn respond<C: SolCall>(&self, target: Address, call: C, returns: Vec<u8>) {
        let key = ReadCall::new(target, &call);
        self.responses
            .lock()
            .insert((key.target, key.calldata), Ok(Bytes::from(returns)));
    }

    /// Make `call` on `target` fail with a specific failure.
    pub fn fail<C: SolCall>(&self, target: Address, call: C, failure: ReadFailure) {
        let key = ReadCall::new(target, &call);
        self.responses
            .lock()
            .insert((key.target, key.calldata), Err(failure));
    }

    /// Sleep before answering each batch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// All calls issued so far.
    pub fn calls(&self) -> Vec<ReadCall> {
        self.log.lock().clone()
    }

    /// Number of issued calls invoking function `C`.
    pub fn count<C: SolCall>(&self) -> usize {
        self.log.lock().iter().filter(|c| c.is::<C>()).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call_batch(&self, calls: &[ReadCall]) -> Vec<ReadResult<Bytes>> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.log.lock().extend(calls.iter().cloned());
        let responses = self.responses.lock();
        calls
            .iter()
            .map(|c| {
                responses
                    .get(&(c.target, c.calldata.clone()))
                    .cloned()
                    .unwrap_or(Err(ReadFailure::Reverted))
            })
            .collect()
    }
}

/// Discovery service returning a fixed token list, or failing.
#[derive(Debug, Default)]
pub(crate) struct MockDiscovery {
    tokens: Mutex<Option<Vec<DiscoveredToken>>>,
    requests: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockDiscovery {
    pub fn with_tokens(tokens: Vec<DiscoveredToken>) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn set_tokens(&self, tokens: Option<Vec<DiscoveredToken>>) {
        *self.tokens.lock() = tokens;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Sleep before answering each request.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl TokenDiscovery for MockDiscovery {
    async fn discover_tokens(&self, _wallet: Address) -> Result<Vec<DiscoveredToken>, ApiError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.tokens.lock().clone().ok_or(ApiError::Status {
            url: "mock://tokens".to_string(),
            status: 503,
        })
    }
}

/// Position feed returning fixed lists.
#[derive(Debug, Default)]
pub(crate) struct MockFeed {
    pub lending: Vec<LendingPositionDto>,
    pub collections: Vec<CollectionItemDto>,
}

#[async_trait]
impl PositionFeed for MockFeed {
    async fn lending_positions(&self, _wallet: Address) -> Result<Vec<LendingPositionDto>, ApiError> {
        Ok(self.lending.clone())
    }

    async fn collection_items(&self, _wallet: Address) -> Result<Vec<CollectionItemDto>, ApiError> {
        Ok(self.collections.clone())
    }
}
