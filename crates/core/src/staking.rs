//! Staking pool reader.

use alloy::primitives::{Address, U256};
use folio_chain::{read_one, CallBatch, ChainReader, IStakingPools, ReadResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::position::StakingPool;

/// Upper bound on pools read from one contract.
const MAX_POOLS: u64 = 1_024;

/// Reads every pool of one staking contract for a wallet.
#[derive(Debug, Clone)]
pub struct StakingReader {
    chain: Arc<dyn ChainReader>,
    contract: Address,
}

impl StakingReader {
    pub fn new(chain: Arc<dyn ChainReader>, contract: Address) -> Self {
        Self { chain, contract }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// All pools with the wallet's stake and pending rewards.
    ///
    /// A pool whose `poolInfo` read fails is dropped; failed balance or
    /// reward reads count as zero. A failed pool count yields no pools.
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn read_pools(&self, wallet: Address) -> Vec<StakingPool> {
        let count = match read_one(self.chain.as_ref(), self.contract, IStakingPools::poolLengthCall {}).await {
            Ok(ret) => u64::try_from(ret._0).unwrap_or(u64::MAX),
            Err(failure) => {
                warn!(%failure, "Failed to read staking pool count");
                return Vec::new();
            }
        };
        if count == 0 {
            return Vec::new();
        }
        let count = if count > MAX_POOLS {
            warn!(count, max = MAX_POOLS, "Staking pool count capped");
            MAX_POOLS
        } else {
            count
        };

        let mut batch = CallBatch::with_capacity(count as usize * 3);
        let slots: Vec<_> = (0..count)
            .map(|pool_id| {
                let pid = U256::from(pool_id);
                (
                    pool_id,
                    batch.push(self.contract, IStakingPools::poolInfoCall { pid }),
                    batch.push(self.contract, IStakingPools::userStakedCall { pid, user: wallet }),
                    batch.push(self.contract, IStakingPools::pendingRewardsCall { pid, user: wallet }),
                )
            })
            .collect();
        let results = batch.execute(self.chain.as_ref()).await;

        let pools: Vec<StakingPool> = slots
            .into_iter()
            .filter_map(|(pool_id, info, staked, pending)| {
                let info = match results.get(info) {
                    Ok(ret) => ret._0,
                    Err(failure) => {
                        debug!(pool_id, %failure, "Dropping pool without info");
                        return None;
                    }
                };
                Some(StakingPool {
                    pool_id,
                    staking_token: info.stakingToken,
                    rewards_token: info.rewardsToken,
                    apr_bps: info.aprBasisPoints,
                    lock_period_secs: info.lockPeriod,
                    total_staked: info.totalStaked,
                    user_staked: or_zero(results.get(staked).map(|r| r._0), pool_id, "userStaked"),
                    user_pending_rewards: or_zero(
                        results.get(pending).map(|r| r._0),
                        pool_id,
                        "pendingRewards",
                    ),
                })
            })
            .collect();

        debug!(
            pool_count = count,
            read = pools.len(),
            active = pools.iter().filter(|p| p.is_active()).count(),
            "Staking pools read"
        );
        pools
    }
}

fn or_zero(result: ReadResult<U256>, pool_id: u64, field: &'static str) -> U256 {
    result.unwrap_or_else(|failure| {
        debug!(pool_id, field, %failure, "Read failed, using zero");
        U256::ZERO
    })
}
