//! AMM interfaces: UniswapV2-style factory/pair and the Uniswap V3 QuoterV2.

use alloy::sol;

sol! {
    /// UniswapV2-style pair factory
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function allPairsLength() external view returns (uint256);
        function allPairs(uint256 index) external view returns (address);
        function getPair(address tokenA, address tokenB) external view returns (address);
    }
}

sol! {
    /// UniswapV2-style pair. Reserves are declared as uint256 so they decode
    /// straight into `U256` (the ABI word is identical for uint112).
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (
            uint256 reserve0,
            uint256 reserve1,
            uint32 blockTimestampLast
        );
    }
}

sol! {
    /// Uniswap V3 QuoterV2
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}

/// Common Uniswap V3 fee tiers in hundredths of a basis point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTier {
    /// 0.01%
    Lowest = 100,
    /// 0.05%
    Low = 500,
    /// 0.3%
    Medium = 3000,
    /// 1%
    High = 10000,
}

impl FeeTier {
    /// Default probing order for price quotes: standard pools first.
    pub fn default_order() -> Vec<u32> {
        vec![
            FeeTier::Medium as u32,
            FeeTier::Low as u32,
            FeeTier::High as u32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_factory_selectors() {
        assert_eq!(hex::encode(IUniswapV2Factory::allPairsLengthCall::SELECTOR), "574f2ba3");
        assert_eq!(hex::encode(IUniswapV2Factory::allPairsCall::SELECTOR), "1e3dd18b");
        assert_eq!(hex::encode(IUniswapV2Factory::getPairCall::SELECTOR), "e6a43905");
    }

    #[test]
    fn test_pair_selectors() {
        assert_eq!(hex::encode(IUniswapV2Pair::token0Call::SELECTOR), "0dfe1681");
        assert_eq!(hex::encode(IUniswapV2Pair::token1Call::SELECTOR), "d21220a7");
        assert_eq!(hex::encode(IUniswapV2Pair::getReservesCall::SELECTOR), "0902f1ac");
    }

    #[test]
    fn test_quoter_selector() {
        assert_eq!(
            hex::encode(IQuoterV2::quoteExactInputSingleCall::SELECTOR),
            "c6a5026a"
        );
    }

    #[test]
    fn test_default_fee_order() {
        assert_eq!(FeeTier::default_order(), vec![3000, 500, 10000]);
    }
}
