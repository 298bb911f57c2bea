//! Contract bindings for every read the portfolio engine issues.
//!
//! All interfaces are declared with `sol!` and only ever used through
//! [`crate::CallBatch`], so every call rides a Multicall3 batch.

pub mod amm;
pub mod common;
pub mod staking;

pub use amm::{FeeTier, IQuoterV2, IUniswapV2Factory, IUniswapV2Pair};
pub use common::{IMulticall3, IERC20, MULTICALL3_ADDRESS};
pub use staking::IStakingPools;
