//! Price quotes and the per-cycle price book.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::amount;
use crate::token::TokenDescriptor;

/// Which tier produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSource {
    /// Configured USD stable, fixed at 1.0
    Stable,
    /// External quoter, token -> reference stable
    DirectPool,
    /// External quoter, token -> base asset, times the base price
    RoutedViaBase,
    /// In-ecosystem pair reserves against the reference stable
    AmmReserve,
}

/// USD price of one whole token unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub token_address: Address,
    pub usd_per_unit: Decimal,
    pub source: PriceSource,
    /// Quoter fee tier behind DirectPool / RoutedViaBase quotes
    pub fee_tier: Option<u32>,
    pub resolved_at: DateTime<Utc>,
}

/// Quotes resolved in one cycle. A missing entry means "no price", never zero.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    quotes: HashMap<Address, PriceQuote>,
    /// Addresses priced through another address (native -> wrapped native)
    aliases: HashMap<Address, Address>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quote: PriceQuote) {
        self.quotes.insert(quote.token_address, quote);
    }

    /// Price `from` with whatever quote `to` has.
    pub fn alias(&mut self, from: Address, to: Address) {
        if from != to {
            self.aliases.insert(from, to);
        }
    }

    pub fn get(&self, token: &Address) -> Option<&PriceQuote> {
        let key = self.aliases.get(token).unwrap_or(token);
        self.quotes.get(key)
    }

    /// USD value of a raw amount. `None` when the token has no price or the
    /// product does not fit a `Decimal`.
    pub fn usd_value(&self, token: &TokenDescriptor, raw: U256) -> Option<Decimal> {
        let quote = self.get(&token.address)?;
        let units = amount::to_decimal(raw, token.decimals)?;
        units.checked_mul(quote.usd_per_unit)
    }

    /// Number of distinct priced tokens.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
