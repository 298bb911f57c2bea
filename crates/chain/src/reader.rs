//! Batched read-only call primitive.
//!
//! Every on-chain read in the workspace is expressed as a [`ReadCall`]
//! (target + ABI calldata) executed through a [`ChainReader`]. Results come
//! back one per call as a tagged [`ReadResult`], so a reverted call can never
//! be mistaken for a zero value downstream.
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_chain::{CallBatch, IERC20};
//!
//! let mut batch = CallBatch::new();
//! let decimals = batch.push(token, IERC20::decimalsCall {});
//! let symbol = batch.push(token, IERC20::symbolCall {});
//! let results = batch.execute(reader.as_ref()).await;
//!
//! let decimals = results.get(decimals).map(|r| r._0).unwrap_or(18);
//! ```

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::time::Duration;
use thiserror::Error;

/// Why a single read produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadFailure {
    /// The call reverted (or the multicall reported `success = false`).
    #[error("call reverted")]
    Reverted,
    /// The batch containing this call did not settle in time.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    /// The RPC request for the batch failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Return data did not match the expected ABI.
    #[error("failed to decode return data: {0}")]
    Decode(String),
}

/// Result of one read.
pub type ReadResult<T> = Result<T, ReadFailure>;

/// A single read-only contract call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadCall {
    /// Contract to call
    pub target: Address,
    /// ABI-encoded calldata (selector + arguments)
    pub calldata: Bytes,
}

impl ReadCall {
    /// Encode a typed call against a target.
    pub fn new<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            target,
            calldata: Bytes::from(call.abi_encode()),
        }
    }

    /// The 4-byte function selector, if the calldata carries one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.calldata.get(..4).and_then(|s| s.try_into().ok())
    }

    /// Whether this call invokes the function `C`.
    pub fn is<C: SolCall>(&self) -> bool {
        self.selector() == Some(C::SELECTOR)
    }
}

/// Executes batches of read-only calls against a single EVM network.
///
/// Implementations must return exactly one result per input call, in input
/// order. A failure of the whole batch (transport error, timeout) is reported
/// as that failure on every call of the batch.
#[async_trait]
pub trait ChainReader: Send + Sync + Debug {
    async fn call_batch(&self, calls: &[ReadCall]) -> Vec<ReadResult<Bytes>>;
}

/// Typed handle to one call inside a [`CallBatch`].
pub struct Slot<C> {
    index: usize,
    _call: PhantomData<fn() -> C>,
}

impl<C> Clone for Slot<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Slot<C> {}

impl<C> Debug for Slot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("index", &self.index).finish()
    }
}

/// Builder collecting heterogeneous typed calls into one batch.
#[derive(Debug, Default)]
pub struct CallBatch {
    calls: Vec<ReadCall>,
}

impl CallBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `capacity` calls.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            calls: Vec::with_capacity(capacity),
        }
    }

    /// Queue a call and return the slot its result will be decoded from.
    pub fn push<C: SolCall>(&mut self, target: Address, call: C) -> Slot<C> {
        let index = self.calls.len();
        self.calls.push(ReadCall::new(target, &call));
        Slot {
            index,
            _call: PhantomData,
        }
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no calls are queued.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Execute every queued call through `reader`.
    pub async fn execute(self, reader: &dyn ChainReader) -> BatchResults {
        if self.calls.is_empty() {
            return BatchResults::default();
        }
        let results = reader.call_batch(&self.calls).await;
        BatchResults { results }
    }
}

/// Raw results of an executed [`CallBatch`].
#[derive(Debug, Default)]
pub struct BatchResults {
    results: Vec<ReadResult<Bytes>>,
}

impl BatchResults {
    /// Decode the result stored at `slot`.
    pub fn get<C: SolCall>(&self, slot: Slot<C>) -> ReadResult<C::Return> {
        match self.results.get(slot.index) {
            Some(Ok(data)) => decode_returns::<C>(data),
            Some(Err(failure)) => Err(failure.clone()),
            None => Err(ReadFailure::Transport(
                "reader returned fewer results than calls".to_string(),
            )),
        }
    }

    /// Number of successful calls.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Total number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the batch held no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Decode return data for call `C`.
///
/// Empty return data (a call to an address without code) is a decode failure,
/// never a default value.
pub fn decode_returns<C: SolCall>(data: &[u8]) -> ReadResult<C::Return> {
    if data.is_empty() {
        return Err(ReadFailure::Decode("empty return data".to_string()));
    }
    C::abi_decode_returns(data, true).map_err(|e| ReadFailure::Decode(e.to_string()))
}

/// Execute a single typed call.
pub async fn read_one<C: SolCall>(
    reader: &dyn ChainReader,
    target: Address,
    call: C,
) -> ReadResult<C::Return> {
    let mut batch = CallBatch::with_capacity(1);
    let slot = batch.push(target, call);
    batch.execute(reader).await.get(slot)
}
