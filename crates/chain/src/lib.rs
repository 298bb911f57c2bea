//! Portfolio chain interaction layer.
//!
//! This crate provides:
//! - The [`ChainReader`] seam: batched, read-only contract calls with a tagged
//!   result per call
//! - Typed call batches ([`CallBatch`] / [`Slot`]) decoding straight into
//!   `sol!` return types
//! - A Multicall3-backed [`ProviderManager`] and a network status probe
//! - Contract bindings for ERC20, UniswapV2-style AMMs, QuoterV2 and staking
//!   pools

pub mod contracts;
mod provider;
mod reader;

pub use contracts::{
    FeeTier, IMulticall3, IQuoterV2, IStakingPools, IUniswapV2Factory, IUniswapV2Pair, IERC20,
    MULTICALL3_ADDRESS,
};
pub use provider::{NetworkStatus, ProviderManager};
pub use reader::{
    decode_returns, read_one, BatchResults, CallBatch, ChainReader, ReadCall, ReadFailure,
    ReadResult, Slot,
};
