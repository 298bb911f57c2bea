//! Liquidity pair reader for a UniswapV2-style factory.

use alloy::primitives::{Address, U256};
use folio_chain::{read_one, CallBatch, ChainReader, IUniswapV2Factory, IUniswapV2Pair, IERC20};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::position::LiquidityPair;

/// Enumerates factory pairs and reads the wallet's LP share of each.
#[derive(Debug, Clone)]
pub struct LiquidityReader {
    chain: Arc<dyn ChainReader>,
    factory: Address,
    /// Most recent pairs enumerated (0 = every pair)
    max_pairs: usize,
    /// Return only pairs the wallet holds LP tokens of
    only_held: bool,
}

impl LiquidityReader {
    pub fn new(chain: Arc<dyn ChainReader>, factory: Address, max_pairs: usize, only_held: bool) -> Self {
        Self {
            chain,
            factory,
            max_pairs,
            only_held,
        }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Read pairs in three phases: pair count, pair addresses, pair state.
    ///
    /// Pairs whose `token0`/`token1` cannot be read are dropped. Failed
    /// reserve, supply or balance reads count as zero.
    #[instrument(skip(self), fields(factory = %self.factory))]
    pub async fn read_pairs(&self, wallet: Address) -> Vec<LiquidityPair> {
        let chain = self.chain.as_ref();

        let total = match read_one(chain, self.factory, IUniswapV2Factory::allPairsLengthCall {}).await {
            Ok(ret) => ret._0,
            Err(failure) => {
                warn!(%failure, "Failed to read pair count");
                return Vec::new();
            }
        };
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        let window = match self.max_pairs {
            0 => total,
            cap => total.min(cap as u64),
        };
        if window == 0 {
            return Vec::new();
        }
        if window < total {
            warn!(
                total,
                window,
                skipped = total - window,
                "Pair enumeration capped; positions in older pairs are not valued"
            );
        }

        let pairs = self.pair_addresses(total - window..total).await;
        if pairs.is_empty() {
            return Vec::new();
        }

        let mut batch = CallBatch::with_capacity(pairs.len() * 5);
        let slots: Vec<_> = pairs
            .iter()
            .map(|&pair| {
                (
                    pair,
                    batch.push(pair, IUniswapV2Pair::token0Call {}),
                    batch.push(pair, IUniswapV2Pair::token1Call {}),
                    batch.push(pair, IUniswapV2Pair::getReservesCall {}),
                    batch.push(pair, IERC20::totalSupplyCall {}),
                    batch.push(pair, IERC20::balanceOfCall { account: wallet }),
                )
            })
            .collect();
        let results = batch.execute(chain).await;

        let mut read = 0usize;
        let pairs: Vec<LiquidityPair> = slots
            .into_iter()
            .filter_map(|(pair, token0, token1, reserves, supply, balance)| {
                let (token0, token1) = match (results.get(token0), results.get(token1)) {
                    (Ok(t0), Ok(t1)) => (t0._0, t1._0),
                    _ => {
                        debug!(%pair, "Dropping pair without token addresses");
                        return None;
                    }
                };
                read += 1;
                let (reserve0, reserve1) = match results.get(reserves) {
                    Ok(r) => (r.reserve0, r.reserve1),
                    Err(failure) => {
                        debug!(%pair, %failure, "Reserves unreadable, using zero");
                        (U256::ZERO, U256::ZERO)
                    }
                };
                Some(LiquidityPair {
                    pair_address: pair,
                    token0,
                    token1,
                    reserve0,
                    reserve1,
                    total_lp_supply: results.get(supply).map(|r| r._0).unwrap_or_default(),
                    user_lp_balance: results.get(balance).map(|r| r._0).unwrap_or_default(),
                })
            })
            .filter(|p| !self.only_held || !p.user_lp_balance.is_zero())
            .collect();

        debug!(
            enumerated = window,
            read,
            returned = pairs.len(),
            "Liquidity pairs read"
        );
        pairs
    }

    /// `allPairs(i)` for every index in range; failed lookups are skipped.
    async fn pair_addresses(&self, range: std::ops::Range<u64>) -> Vec<Address> {
        let mut batch = CallBatch::with_capacity((range.end - range.start) as usize);
        let slots: Vec<_> = range
            .map(|index| batch.push(self.factory, IUniswapV2Factory::allPairsCall { index: U256::from(index) }))
            .collect();
        let results = batch.execute(self.chain.as_ref()).await;

        slots
            .into_iter()
            .filter_map(|slot| results.get(slot).ok().map(|r| r._0))
            .filter(|pair| !pair.is_zero())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use alloy::sol_types::SolCall;

    const FACTORY: Address = Address::repeat_byte(0xfa);
    const WALLET: Address = Address::repeat_byte(0xee);

    fn pair_addr(i: u8) -> Address {
        Address::repeat_byte(0xa0 + i)
    }

    fn factory_with(chain: &MockChain, count: u8) {
        chain.respond(
            FACTORY,
            IUniswapV2Factory::allPairsLengthCall {},
            IUniswapV2Factory::allPairsLengthCall::abi_encode_returns(&(U256::from(count),)),
        );
        for i in 0..count {
            chain.respond(
                FACTORY,
                IUniswapV2Factory::allPairsCall { index: U256::from(i) },
                IUniswapV2Factory::allPairsCall::abi_encode_returns(&(pair_addr(i),)),
            );
        }
    }

    fn pair_state(chain: &MockChain, pair: Address, with_token0: bool, supply: u64, balance: u64) {
        if with_token0 {
            chain.respond(
                pair,
                IUniswapV2Pair::token0Call {},
                IUniswapV2Pair::token0Call::abi_encode_returns(&(Address::repeat_byte(0x01),)),
            );
        }
        chain.respond(
            pair,
            IUniswapV2Pair::token1Call {},
            IUniswapV2Pair::token1Call::abi_encode_returns(&(Address::repeat_byte(0x02),)),
        );
        chain.respond(
            pair,
            IUniswapV2Pair::getReservesCall {},
            IUniswapV2Pair::getReservesCall::abi_encode_returns(&(
                U256::from(1_000u64),
                U256::from(4_000u64),
                0u32,
            )),
        );
        chain.respond(
            pair,
            IERC20::totalSupplyCall {},
            IERC20::totalSupplyCall::abi_encode_returns(&(U256::from(supply),)),
        );
        chain.respond(
            pair,
            IERC20::balanceOfCall { account: WALLET },
            IERC20::balanceOfCall::abi_encode_returns(&(U256::from(balance),)),
        );
    }

    #[tokio::test]
    async fn test_reads_held_pairs() {
        let chain = Arc::new(MockChain::new());
        factory_with(&chain, 2);
        pair_state(&chain, pair_addr(0), true, 100, 25);
        pair_state(&chain, pair_addr(1), true, 100, 0);

        let pairs = LiquidityReader::new(chain.clone(), FACTORY, 0, true)
            .read_pairs(WALLET)
            .await;
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.pair_address, pair_addr(0));
        assert_eq!(pair.user_token0_amount(), U256::from(250u64));
        assert_eq!(pair.user_token1_amount(), U256::from(1_000u64));

        let all = LiquidityReader::new(chain, FACTORY, 0, false)
            .read_pairs(WALLET)
            .await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_token0_drops_pair() {
        let chain = Arc::new(MockChain::new());
        factory_with(&chain, 2);
        pair_state(&chain, pair_addr(0), false, 100, 25);
        pair_state(&chain, pair_addr(1), true, 100, 10);

        let pairs = LiquidityReader::new(chain, FACTORY, 0, false)
            .read_pairs(WALLET)
            .await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair_address, pair_addr(1));
    }

    #[tokio::test]
    async fn test_failed_supply_and_reserves_are_zero() {
        let chain = Arc::new(MockChain::new());
        factory_with(&chain, 1);
        let pair = pair_addr(0);
        chain.respond(
            pair,
            IUniswapV2Pair::token0Call {},
            IUniswapV2Pair::token0Call::abi_encode_returns(&(Address::repeat_byte(0x01),)),
        );
        chain.respond(
            pair,
            IUniswapV2Pair::token1Call {},
            IUniswapV2Pair::token1Call::abi_encode_returns(&(Address::repeat_byte(0x02),)),
        );
        chain.respond(
            pair,
            IERC20::balanceOfCall { account: WALLET },
            IERC20::balanceOfCall::abi_encode_returns(&(U256::from(10u64),)),
        );

        let pairs = LiquidityReader::new(chain, FACTORY, 0, true)
            .read_pairs(WALLET)
            .await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].reserve0, U256::ZERO);
        assert_eq!(pairs[0].total_lp_supply, U256::ZERO);
        assert_eq!(pairs[0].user_token0_amount(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_enumeration_capped_to_recent_pairs() {
        let chain = Arc::new(MockChain::new());
        factory_with(&chain, 5);
        for i in 0..5 {
            pair_state(&chain, pair_addr(i), true, 100, 1);
        }

        let pairs = LiquidityReader::new(chain.clone(), FACTORY, 2, true)
            .read_pairs(WALLET)
            .await;
        let addrs: Vec<Address> = pairs.iter().map(|p| p.pair_address).collect();
        assert_eq!(addrs, vec![pair_addr(3), pair_addr(4)]);
        assert_eq!(chain.count::<IUniswapV2Factory::allPairsCall>(), 2);
    }

    #[tokio::test]
    async fn test_uncapped_reads_oldest_held_pair() {
        let chain = Arc::new(MockChain::new());
        factory_with(&chain, 3);
        pair_state(&chain, pair_addr(0), true, 100, 50);
        pair_state(&chain, pair_addr(1), true, 100, 0);
        pair_state(&chain, pair_addr(2), true, 100, 0);

        let pairs = LiquidityReader::new(chain.clone(), FACTORY, 0, true)
            .read_pairs(WALLET)
            .await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair_address, pair_addr(0));
        assert_eq!(pairs[0].user_token0_amount(), U256::from(500u64));
        assert_eq!(chain.count::<IUniswapV2Factory::allPairsCall>(), 3);

        // a cap below the pair count leaves the old pair out
        let capped = LiquidityReader::new(chain, FACTORY, 2, true)
            .read_pairs(WALLET)
            .await;
        assert!(capped.is_empty());
    }

    #[tokio::test]
    async fn test_count_failure_is_empty() {
        let chain = Arc::new(MockChain::new());
        let pairs = LiquidityReader::new(chain.clone(), FACTORY, 0, true)
            .read_pairs(WALLET)
            .await;
        assert!(pairs.is_empty());
        assert_eq!(chain.calls().len(), 1);
    }
}
