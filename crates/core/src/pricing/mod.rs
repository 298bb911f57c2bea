//! Tiered USD price resolution.
//!
//! A token's price is the first success of an ordered list of
//! [`PriceTier`]s. Each cycle opens a [`QuoteSession`] holding one
//! `OnceCell` per token, so concurrent requests for the same token share a
//! single resolution and every token is quoted at most once per cycle.
//!
//! # Tiers (default order)
//!
//! 1. [`StableTier`]: configured USD stables are exactly 1.0
//! 2. [`DirectPoolTier`]: quoter, token -> reference stable
//! 3. [`RoutedViaBaseTier`]: quoter, token -> wrapped native, times its price
//! 4. [`AmmReserveTier`]: in-ecosystem pair reserves against the stable
//!
//! Every failed or reverted read means "this tier produced nothing"; the
//! resolver never returns an error.

mod book;
mod tiers;

pub use book::{PriceBook, PriceQuote, PriceSource};
pub use tiers::{
    first_success, AmmReserveTier, DirectPoolTier, PriceTier, RoutedViaBaseTier, StableTier,
    TierQuote,
};

use alloy::primitives::Address;
use chrono::Utc;
use dashmap::DashMap;
use folio_chain::ChainReader;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::PricingConfig;
use crate::token::TokenDescriptor;

/// Largest value a uint24 fee can hold.
const MAX_FEE_TIER: u32 = 0x00FF_FFFF;

/// Immutable inputs shared by every tier.
#[derive(Debug, Clone)]
pub struct PricingContext {
    /// Stablecoin every quote is denominated in
    pub reference: TokenDescriptor,
    /// Wrapped native asset (quotes for the native sentinel go through it)
    pub base: Option<TokenDescriptor>,
    pub fee_tiers: Vec<u32>,
    pub stable_symbols: Vec<String>,
    pub max_usd_price: Decimal,
}

impl PricingContext {
    pub fn new(
        config: &PricingConfig,
        reference: TokenDescriptor,
        base: Option<TokenDescriptor>,
    ) -> Self {
        Self {
            reference,
            base,
            fee_tiers: config
                .fee_tiers
                .iter()
                .copied()
                .filter(|fee| *fee <= MAX_FEE_TIER)
                .collect(),
            stable_symbols: config.stable_symbols.clone(),
            max_usd_price: config.max_usd_price,
        }
    }

    /// Configured USD stable (by symbol) or the reference stablecoin itself.
    pub fn is_stable(&self, token: &TokenDescriptor) -> bool {
        if token.address == self.reference.address {
            return true;
        }
        !token.is_native()
            && self
                .stable_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(token.symbol.trim()))
    }

    /// Whether `token` is the base asset (wrapped native or the native sentinel).
    pub fn is_base(&self, token: &TokenDescriptor) -> bool {
        token.is_native()
            || self
                .base
                .as_ref()
                .is_some_and(|base| base.address == token.address)
    }

    /// The descriptor quotes are keyed and requested under: the native
    /// sentinel maps to the wrapped native asset when one is configured.
    pub fn canonical(&self, token: &TokenDescriptor) -> TokenDescriptor {
        match (&self.base, token.is_native()) {
            (Some(base), true) => base.clone(),
            _ => token.clone(),
        }
    }

    /// Sanity bound on a tier's quote. Quoter tiers must be strictly
    /// positive; a reserve-derived price of zero is a real price.
    fn accepts(&self, source: PriceSource, usd: Decimal) -> bool {
        let floor_ok = match source {
            PriceSource::DirectPool | PriceSource::RoutedViaBase => usd > Decimal::ZERO,
            _ => usd >= Decimal::ZERO,
        };
        floor_ok && usd <= self.max_usd_price
    }
}

/// Long-lived resolver: tier list + chain handle. Caches nothing itself.
#[derive(Debug)]
pub struct PriceResolver {
    chain: Arc<dyn ChainReader>,
    context: PricingContext,
    tiers: Vec<Arc<dyn PriceTier>>,
    max_concurrent: usize,
}

impl PriceResolver {
    /// Resolver with the default tier order. Quoter-backed tiers are skipped
    /// without a quoter, the reserve tier without a factory.
    pub fn new(
        chain: Arc<dyn ChainReader>,
        context: PricingContext,
        quoter: Option<Address>,
        factory: Option<Address>,
        max_concurrent: usize,
    ) -> Self {
        let mut tiers: Vec<Arc<dyn PriceTier>> = vec![Arc::new(StableTier)];
        if let Some(quoter) = quoter {
            tiers.push(Arc::new(DirectPoolTier::new(quoter)));
            tiers.push(Arc::new(RoutedViaBaseTier::new(quoter)));
        }
        if let Some(factory) = factory {
            tiers.push(Arc::new(AmmReserveTier::new(factory)));
        }
        Self::with_tiers(chain, context, tiers, max_concurrent)
    }

    pub fn with_tiers(
        chain: Arc<dyn ChainReader>,
        context: PricingContext,
        tiers: Vec<Arc<dyn PriceTier>>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            chain,
            context,
            tiers,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn context(&self) -> &PricingContext {
        &self.context
    }

    /// Open a per-cycle quote session.
    pub fn session(&self) -> QuoteSession<'_> {
        QuoteSession {
            resolver: self,
            cells: DashMap::new(),
        }
    }

    /// Resolve one token in a fresh session.
    pub async fn resolve(&self, token: &TokenDescriptor) -> Option<PriceQuote> {
        self.session().resolve(token).await
    }

    /// Resolve distinct tokens concurrently (bounded) within one session.
    pub async fn resolve_all(&self, tokens: &[TokenDescriptor]) -> PriceBook {
        let session = self.session();
        let mut distinct: Vec<TokenDescriptor> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !distinct.iter().any(|t| t.address == token.address) {
                distinct.push(token.clone());
            }
        }

        let session_ref = &session;
        let results: Vec<(Address, Option<PriceQuote>)> = stream::iter(distinct)
            .map(move |token: TokenDescriptor| async move {
                let quote = session_ref.resolve(&token).await;
                (token.address, quote)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let requested = results.len();
        let (book, unpriced) = self.collect_book(results);
        info!(
            tokens = requested,
            priced = requested - unpriced,
            unpriced,
            "Price resolution complete"
        );
        book
    }

    /// Fold per-token results into a book. Returns the book and the number
    /// of requested tokens left without a quote.
    fn collect_book(&self, results: Vec<(Address, Option<PriceQuote>)>) -> (PriceBook, usize) {
        let mut book = PriceBook::new();
        if let Some(base) = &self.context.base {
            book.alias(crate::token::NATIVE_ADDRESS, base.address);
        }
        let mut unpriced = 0usize;
        for (address, quote) in results {
            match quote {
                Some(quote) => {
                    book.alias(address, quote.token_address);
                    book.insert(quote);
                }
                None => unpriced += 1,
            }
        }
        (book, unpriced)
    }
}

/// Per-cycle quote cache. Dropped at cycle end.
#[derive(Debug)]
pub struct QuoteSession<'a> {
    resolver: &'a PriceResolver,
    cells: DashMap<Address, Arc<OnceCell<Option<PriceQuote>>>>,
}

impl<'a> QuoteSession<'a> {
    pub fn context(&self) -> &PricingContext {
        &self.resolver.context
    }

    pub fn chain(&self) -> &dyn ChainReader {
        self.resolver.chain.as_ref()
    }

    /// Resolve a token, at most once per session. The native sentinel and the
    /// wrapped native asset share one slot.
    pub async fn resolve(&self, token: &TokenDescriptor) -> Option<PriceQuote> {
        let canonical = self.context().canonical(token);
        let cell = self
            .cells
            .entry(canonical.address)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| self.run_tiers(&canonical))
            .await
            .clone()
    }

    async fn run_tiers(&self, token: &TokenDescriptor) -> Option<PriceQuote> {
        let context = self.context();
        let found = first_success(self.resolver.tiers.clone(), |tier| async move {
            let quote = tier.quote(token, self).await?;
            let source = tier.source();
            if context.accepts(source, quote.usd_per_unit) {
                Some((source, quote))
            } else {
                debug!(
                    token = %token.address,
                    tier = ?source,
                    usd = %quote.usd_per_unit,
                    "Quote rejected by sanity bound"
                );
                None
            }
        })
        .await;

        match found {
            Some((source, quote)) => {
                debug!(
                    token = %token.address,
                    symbol = %token.symbol,
                    source = ?source,
                    usd = %quote.usd_per_unit,
                    "Price resolved"
                );
                Some(PriceQuote {
                    token_address: token.address,
                    usd_per_unit: quote.usd_per_unit,
                    source,
                    fee_tier: quote.fee_tier,
                    resolved_at: Utc::now(),
                })
            }
            None => {
                debug!(token = %token.address, symbol = %token.symbol, "No price from any tier");
                None
            }
        }
    }
}
