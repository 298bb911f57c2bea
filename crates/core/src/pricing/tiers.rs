//! The individual pricing tiers.

use alloy::primitives::{aliases::U24, Address, U160, U256};
use async_trait::async_trait;
use folio_chain::{CallBatch, IQuoterV2, IUniswapV2Factory, IUniswapV2Pair};
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::future::Future;
use tracing::trace;

use super::{PriceSource, PricingContext, QuoteSession};
use crate::amount;
use crate::token::TokenDescriptor;

/// Output of a single tier before it is stamped into a [`super::PriceQuote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierQuote {
    pub usd_per_unit: Decimal,
    pub fee_tier: Option<u32>,
}

impl TierQuote {
    fn fixed(usd_per_unit: Decimal) -> Self {
        Self {
            usd_per_unit,
            fee_tier: None,
        }
    }
}

/// One way of pricing a token. `None` means this tier has nothing to say.
#[async_trait]
pub trait PriceTier: Send + Sync + Debug {
    fn source(&self) -> PriceSource;

    async fn quote(&self, token: &TokenDescriptor, session: &QuoteSession<'_>)
        -> Option<TierQuote>;
}

/// Try `f` on each item in order and return the first `Some`.
pub async fn first_success<I, F, Fut, T>(items: I, mut f: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for item in items {
        if let Some(found) = f(item).await {
            return Some(found);
        }
    }
    None
}

/// Configured USD stables are worth exactly 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableTier;

#[async_trait]
impl PriceTier for StableTier {
    fn source(&self) -> PriceSource {
        PriceSource::Stable
    }

    async fn quote(
        &self,
        token: &TokenDescriptor,
        session: &QuoteSession<'_>,
    ) -> Option<TierQuote> {
        session
            .context()
            .is_stable(token)
            .then(|| TierQuote::fixed(Decimal::ONE))
    }
}

/// Quote one whole unit of `token_in` into `token_out` across every fee tier
/// in a single batch. First positive output in configured order wins.
async fn quote_exact_input(
    session: &QuoteSession<'_>,
    quoter: Address,
    token_in: &TokenDescriptor,
    token_out: Address,
) -> Option<(U256, u32)> {
    let fee_tiers = &session.context().fee_tiers;
    if fee_tiers.is_empty() {
        return None;
    }

    let amount_in = amount::one_unit(token_in.decimals);
    let mut batch = CallBatch::with_capacity(fee_tiers.len());
    let slots: Vec<_> = fee_tiers
        .iter()
        .map(|&fee| {
            let slot = batch.push(
                quoter,
                IQuoterV2::quoteExactInputSingleCall {
                    params: IQuoterV2::QuoteExactInputSingleParams {
                        tokenIn: token_in.address,
                        tokenOut: token_out,
                        amountIn: amount_in,
                        fee: U24::from(fee),
                        sqrtPriceLimitX96: U160::ZERO,
                    },
                },
            );
            (fee, slot)
        })
        .collect();

    let results = batch.execute(session.chain()).await;
    slots.into_iter().find_map(|(fee, slot)| match results.get(slot) {
        Ok(ret) if !ret.amountOut.is_zero() => Some((ret.amountOut, fee)),
        Ok(_) => None,
        Err(failure) => {
            trace!(token = %token_in.address, fee, %failure, "No quote at fee tier");
            None
        }
    })
}

/// Token -> reference stable through the external quoter.
#[derive(Debug, Clone)]
pub struct DirectPoolTier {
    quoter: Address,
}

impl DirectPoolTier {
    pub fn new(quoter: Address) -> Self {
        Self { quoter }
    }
}

#[async_trait]
impl PriceTier for DirectPoolTier {
    fn source(&self) -> PriceSource {
        PriceSource::DirectPool
    }

    async fn quote(
        &self,
        token: &TokenDescriptor,
        session: &QuoteSession<'_>,
    ) -> Option<TierQuote> {
        let reference = &session.context().reference;
        if token.address == reference.address {
            return None;
        }
        let (out, fee) = quote_exact_input(session, self.quoter, token, reference.address).await?;
        Some(TierQuote {
            usd_per_unit: amount::to_decimal(out, reference.decimals)?,
            fee_tier: Some(fee),
        })
    }
}

/// Token -> base asset through the quoter, times the base asset's own price.
#[derive(Debug, Clone)]
pub struct RoutedViaBaseTier {
    quoter: Address,
}

impl RoutedViaBaseTier {
    pub fn new(quoter: Address) -> Self {
        Self { quoter }
    }
}

#[async_trait]
impl PriceTier for RoutedViaBaseTier {
    fn source(&self) -> PriceSource {
        PriceSource::RoutedViaBase
    }

    async fn quote(
        &self,
        token: &TokenDescriptor,
        session: &QuoteSession<'_>,
    ) -> Option<TierQuote> {
        let context = session.context();
        let base = context.base.as_ref()?;
        if context.is_base(token) {
            return None;
        }

        let (out, fee) = quote_exact_input(session, self.quoter, token, base.address).await?;
        let base_units = amount::to_decimal(out, base.decimals)?;
        let base_quote = session.resolve(base).await?;

        Some(TierQuote {
            usd_per_unit: base_units.checked_mul(base_quote.usd_per_unit)?,
            fee_tier: Some(fee),
        })
    }
}

/// Spot price from an in-ecosystem UniswapV2-style pair against the
/// reference stable. Tokens paired only with other assets stay unpriced.
#[derive(Debug, Clone)]
pub struct AmmReserveTier {
    factory: Address,
}

impl AmmReserveTier {
    pub fn new(factory: Address) -> Self {
        Self { factory }
    }
}

/// Stable reserve over token reserve, both decimal-adjusted.
fn reserve_price(
    context: &PricingContext,
    token: &TokenDescriptor,
    token_reserve: U256,
    stable_reserve: U256,
) -> Option<Decimal> {
    let token_units = amount::to_decimal(token_reserve, token.decimals)?;
    let stable_units = amount::to_decimal(stable_reserve, context.reference.decimals)?;
    if token_units.is_zero() {
        return None;
    }
    stable_units.checked_div(token_units)
}

#[async_trait]
impl PriceTier for AmmReserveTier {
    fn source(&self) -> PriceSource {
        PriceSource::AmmReserve
    }

    async fn quote(
        &self,
        token: &TokenDescriptor,
        session: &QuoteSession<'_>,
    ) -> Option<TierQuote> {
        let context = session.context();
        let stable = context.reference.address;
        if token.address == stable || token.is_native() {
            return None;
        }

        let pair = folio_chain::read_one(
            session.chain(),
            self.factory,
            IUniswapV2Factory::getPairCall {
                tokenA: token.address,
                tokenB: stable,
            },
        )
        .await
        .ok()?
        ._0;
        if pair.is_zero() {
            return None;
        }

        let mut batch = CallBatch::with_capacity(2);
        let token0 = batch.push(pair, IUniswapV2Pair::token0Call {});
        let reserves = batch.push(pair, IUniswapV2Pair::getReservesCall {});
        let results = batch.execute(session.chain()).await;

        let token0 = results.get(token0).ok()?._0;
        let reserves = results.get(reserves).ok()?;
        let (token_reserve, stable_reserve) = if token0 == token.address {
            (reserves.reserve0, reserves.reserve1)
        } else {
            (reserves.reserve1, reserves.reserve0)
        };

        reserve_price(context, token, token_reserve, stable_reserve).map(TierQuote::fixed)
    }
}
