//! Common contract interfaces shared across readers.
//!
//! ERC20 token metadata/balances and the Multicall3 aggregator used to batch
//! every read into a single `eth_call`.

use alloy::primitives::{address, Address};
use alloy::sol;

/// Canonical Multicall3 deployment (same address on every EVM chain).
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    /// Standard ERC20 interface (read-only subset)
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
    }
}

sol! {
    /// Multicall3 aggregator
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
        function getEthBalance(address addr) external view returns (uint256 balance);
        function getBlockNumber() external view returns (uint256 blockNumber);
        function getCurrentBlockTimestamp() external view returns (uint256 timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_erc20_selectors() {
        assert_eq!(hex::encode(IERC20::balanceOfCall::SELECTOR), "70a08231");
        assert_eq!(hex::encode(IERC20::totalSupplyCall::SELECTOR), "18160ddd");
        assert_eq!(hex::encode(IERC20::decimalsCall::SELECTOR), "313ce567");
        assert_eq!(hex::encode(IERC20::symbolCall::SELECTOR), "95d89b41");
        assert_eq!(hex::encode(IERC20::nameCall::SELECTOR), "06fdde03");
    }

    #[test]
    fn test_multicall3_selectors() {
        assert_eq!(hex::encode(IMulticall3::aggregate3Call::SELECTOR), "82ad56cb");
        assert_eq!(hex::encode(IMulticall3::getEthBalanceCall::SELECTOR), "4d2301cc");
        assert_eq!(hex::encode(IMulticall3::getBlockNumberCall::SELECTOR), "42cbb15c");
        assert_eq!(
            hex::encode(IMulticall3::getCurrentBlockTimestampCall::SELECTOR),
            "0f28c97d"
        );
    }

    #[test]
    fn test_multicall3_address() {
        assert_eq!(
            MULTICALL3_ADDRESS.to_string().to_lowercase(),
            "0xca11bde05977b3631167028862be2a173976ca11"
        );
    }
}
