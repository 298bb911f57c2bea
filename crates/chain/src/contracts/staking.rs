//! Staking pool contract interface.

use alloy::sol;

sol! {
    /// Multi-pool staking contract
    #[sol(rpc)]
    interface IStakingPools {
        struct PoolInfo {
            address stakingToken;
            address rewardsToken;
            uint256 aprBasisPoints;
            uint256 lockPeriod;
            uint256 totalStaked;
        }

        function poolLength() external view returns (uint256);
        function poolInfo(uint256 pid) external view returns (PoolInfo memory);
        function userStaked(uint256 pid, address user) external view returns (uint256);
        function pendingRewards(uint256 pid, address user) external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_staking_signatures() {
        assert_eq!(IStakingPools::poolLengthCall::SIGNATURE, "poolLength()");
        assert_eq!(IStakingPools::poolInfoCall::SIGNATURE, "poolInfo(uint256)");
        assert_eq!(
            IStakingPools::userStakedCall::SIGNATURE,
            "userStaked(uint256,address)"
        );
        assert_eq!(
            IStakingPools::pendingRewardsCall::SIGNATURE,
            "pendingRewards(uint256,address)"
        );
    }
}
