//! Spot balance reader for every registry token.

use alloy::primitives::{Address, U256};
use folio_chain::{CallBatch, ChainReader, IMulticall3, ReadResult, IERC20};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::position::Holding;
use crate::registry::TokenRegistry;

/// Reads wallet balances for all registry tokens in one batch. The native
/// balance is read through Multicall3 `getEthBalance`.
#[derive(Debug, Clone)]
pub struct HoldingsReader {
    chain: Arc<dyn ChainReader>,
    multicall: Address,
}

impl HoldingsReader {
    pub fn new(chain: Arc<dyn ChainReader>, multicall: Address) -> Self {
        Self { chain, multicall }
    }

    /// One holding per registry token. A failed read falls back to the
    /// balance the discovery service reported, else zero.
    #[instrument(skip(self, registry), fields(tokens = registry.len()))]
    pub async fn read_holdings(&self, wallet: Address, registry: &TokenRegistry) -> Vec<Holding> {
        let mut batch = CallBatch::with_capacity(registry.len());
        let mut native_slot = None;
        let mut token_slots = Vec::with_capacity(registry.len());

        for token in registry.tokens() {
            if token.is_native() {
                native_slot = Some(batch.push(
                    self.multicall,
                    IMulticall3::getEthBalanceCall { addr: wallet },
                ));
            } else {
                token_slots.push((token, batch.push(token.address, IERC20::balanceOfCall { account: wallet })));
            }
        }
        let results = batch.execute(self.chain.as_ref()).await;

        let mut fallbacks = 0usize;
        let mut settle = |address: Address, read: ReadResult<U256>| -> U256 {
            match read {
                Ok(balance) => balance,
                Err(failure) => {
                    fallbacks += 1;
                    debug!(token = %address, %failure, "Balance read failed, using reported balance");
                    registry.reported_balance(&address).unwrap_or_default()
                }
            }
        };

        let mut holdings = Vec::with_capacity(registry.len());
        if let Some(slot) = native_slot {
            let native = registry.native();
            let balance = settle(native.address, results.get(slot).map(|r| r.balance));
            holdings.push(Holding {
                token: native.clone(),
                raw_balance: balance,
            });
        }
        for (token, slot) in token_slots {
            let balance = settle(token.address, results.get(slot).map(|r| r._0));
            holdings.push(Holding {
                token: token.clone(),
                raw_balance: balance,
            });
        }

        debug!(
            holdings = holdings.len(),
            non_zero = holdings.iter().filter(|h| !h.raw_balance.is_zero()).count(),
            fallbacks,
            "Holdings read"
        );
        holdings
    }
}
