//! Portfolio valuation: positions × prices -> snapshot.
//!
//! [`compute_snapshot`] is pure. Every input, including the timestamp, is
//! passed in, so identical inputs always serialize identically.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use smallvec::smallvec;
use std::collections::HashMap;

use crate::position::{
    CollectionItem, Holding, LendingPosition, Legs, LiquidityPair, Position, StakingPool, Venue,
};
use crate::pricing::PriceBook;
use crate::token::{short_address, TokenDescriptor};
use crate::visibility::VisibilityFilter;

/// Aggregate USD values for one wallet at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub wallet: Address,
    pub holdings_usd: Decimal,
    pub staking_usd: Decimal,
    pub liquidity_usd: Decimal,
    /// Collateral minus debt; may be negative
    pub lending_net_usd: Decimal,
    pub collections_usd: Decimal,
    /// Sum of the five subtotals
    pub total_usd: Decimal,
    /// Non-zero spot holdings
    pub asset_count: usize,
    /// Staking, liquidity, lending and collection positions
    pub position_count: usize,
    /// Non-zero legs without a price
    pub unpriced_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// Snapshot plus the per-section positions behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioValuation {
    pub snapshot: PortfolioSnapshot,
    pub holdings: Vec<Position>,
    pub staking: Vec<Position>,
    pub liquidity: Vec<Position>,
    pub lending: Vec<Position>,
    pub collections: Vec<Position>,
}

impl PortfolioValuation {
    /// Holdings subtotal without hidden tokens. Display only; the snapshot
    /// total is unaffected.
    pub fn visible_holdings_usd(&self, filter: &VisibilityFilter) -> Decimal {
        self.holdings
            .iter()
            .filter(|p| {
                p.underlying
                    .first()
                    .map_or(true, |(token, _)| !filter.is_hidden(&token.address))
            })
            .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.net_usd))
    }
}

/// Everything one valuation needs.
#[derive(Debug, Clone)]
pub struct ValuationInputs {
    pub wallet: Address,
    pub holdings: Vec<Holding>,
    pub staking: Vec<StakingPool>,
    pub liquidity: Vec<LiquidityPair>,
    pub lending: Vec<LendingPosition>,
    pub collections: Vec<CollectionItem>,
    /// Descriptors for staking and pair tokens
    pub tokens: HashMap<Address, TokenDescriptor>,
    pub prices: PriceBook,
    pub as_of: DateTime<Utc>,
}

impl ValuationInputs {
    fn token(&self, address: Address) -> TokenDescriptor {
        self.tokens
            .get(&address)
            .cloned()
            .unwrap_or_else(|| TokenDescriptor::unknown(address))
    }
}

/// Values legs against the price book and counts unpriced ones.
struct Pricer<'a> {
    prices: &'a PriceBook,
    unpriced: usize,
}

impl Pricer<'_> {
    /// USD value of one leg, and whether it lacked a price. Zero amounts
    /// never count as unpriced.
    fn leg(&mut self, token: &TokenDescriptor, raw: U256) -> (Decimal, bool) {
        if raw.is_zero() {
            return (Decimal::ZERO, false);
        }
        match self.prices.usd_value(token, raw) {
            Some(usd) => (usd, false),
            None => {
                self.unpriced += 1;
                (Decimal::ZERO, true)
            }
        }
    }

    fn legs<'l>(&mut self, legs: impl IntoIterator<Item = &'l (TokenDescriptor, U256)>) -> (Decimal, bool) {
        legs.into_iter().fold((Decimal::ZERO, false), |(sum, unpriced), (token, raw)| {
            let (usd, missing) = self.leg(token, *raw);
            (sum.saturating_add(usd), unpriced || missing)
        })
    }

    fn position(&mut self, venue: Venue, label: String, underlying: Legs) -> Position {
        let (net_usd, unpriced) = self.legs(underlying.iter());
        Position {
            venue,
            label,
            underlying,
            net_usd,
            unpriced,
        }
    }
}

fn subtotal(positions: &[Position]) -> Decimal {
    positions
        .iter()
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.net_usd))
}

/// Value every position and aggregate the snapshot.
pub fn compute_snapshot(inputs: &ValuationInputs) -> PortfolioValuation {
    let mut pricer = Pricer {
        prices: &inputs.prices,
        unpriced: 0,
    };

    let holdings: Vec<Position> = inputs
        .holdings
        .iter()
        .filter(|h| !h.raw_balance.is_zero())
        .map(|h| {
            pricer.position(
                Venue::Holding,
                h.token.symbol.clone(),
                smallvec![(h.token.clone(), h.raw_balance)],
            )
        })
        .collect();

    let staking: Vec<Position> = inputs
        .staking
        .iter()
        .filter(|p| !p.user_staked.is_zero() || !p.user_pending_rewards.is_zero())
        .map(|p| {
            let staked = inputs.token(p.staking_token);
            let rewards = inputs.token(p.rewards_token);
            let label = format!("Pool #{} {}", p.pool_id, staked.symbol);
            pricer.position(
                Venue::Staking,
                label,
                smallvec![(staked, p.user_staked), (rewards, p.user_pending_rewards)],
            )
        })
        .collect();

    let liquidity: Vec<Position> = inputs
        .liquidity
        .iter()
        .filter(|p| !p.user_lp_balance.is_zero())
        .map(|p| {
            let token0 = inputs.token(p.token0);
            let token1 = inputs.token(p.token1);
            let label = format!("{}/{}", token0.symbol, token1.symbol);
            pricer.position(
                Venue::Liquidity,
                label,
                smallvec![(token0, p.user_token0_amount()), (token1, p.user_token1_amount())],
            )
        })
        .collect();

    let lending: Vec<Position> = inputs
        .lending
        .iter()
        .map(|p| {
            let (collateral_usd, collateral_unpriced) = pricer.legs(p.collateral.iter());
            let (debt_usd, debt_unpriced) = pricer.legs(p.debt.iter());
            let label = match &p.market {
                Some(market) => format!("{} {}", p.protocol, market),
                None => p.protocol.clone(),
            };
            Position {
                venue: Venue::Lending,
                label,
                underlying: p.collateral.iter().chain(p.debt.iter()).cloned().collect(),
                net_usd: collateral_usd.saturating_sub(debt_usd),
                unpriced: collateral_unpriced || debt_unpriced,
            }
        })
        .collect();

    let collections: Vec<Position> = inputs
        .collections
        .iter()
        .map(|item| {
            let label = item
                .name
                .clone()
                .unwrap_or_else(|| format!("{} #{}", short_address(item.collection), item.token_id));
            pricer.position(
                Venue::Collection,
                label,
                smallvec![(item.floor_token.clone(), item.floor_raw)],
            )
        })
        .collect();

    let holdings_usd = subtotal(&holdings);
    let staking_usd = subtotal(&staking);
    let liquidity_usd = subtotal(&liquidity);
    let lending_net_usd = subtotal(&lending);
    let collections_usd = subtotal(&collections);
    let total_usd = [staking_usd, liquidity_usd, lending_net_usd, collections_usd]
        .into_iter()
        .fold(holdings_usd, Decimal::saturating_add);

    let snapshot = PortfolioSnapshot {
        wallet: inputs.wallet,
        holdings_usd,
        staking_usd,
        liquidity_usd,
        lending_net_usd,
        collections_usd,
        total_usd,
        asset_count: holdings.len(),
        position_count: staking.len() + liquidity.len() + lending.len() + collections.len(),
        unpriced_count: pricer.unpriced,
        computed_at: inputs.as_of,
    };

    PortfolioValuation {
        snapshot,
        holdings,
        staking,
        liquidity,
        lending,
        collections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount;
    use crate::pricing::{PriceQuote, PriceSource};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const WALLET: Address = Address::repeat_byte(0xee);

    fn usdc() -> TokenDescriptor {
        TokenDescriptor::new(Address::repeat_byte(0x01), "USDC", 6, "USD Coin")
    }
    fn gem() -> TokenDescriptor {
        TokenDescriptor::new(Address::repeat_byte(0x44), "GEM", 18, "Gem")
    }
    fn stk() -> TokenDescriptor {
        TokenDescriptor::new(Address::repeat_byte(0x45), "STK", 18, "Stake")
    }

    fn units(n: u64, decimals: u8) -> U256 {
        U256::from(n) * amount::one_unit(decimals)
    }

    fn book(prices: &[(Address, Decimal)]) -> PriceBook {
        let mut book = PriceBook::new();
        for &(token, usd) in prices {
            book.insert(PriceQuote {
                token_address: token,
                usd_per_unit: usd,
                source: PriceSource::DirectPool,
                fee_tier: None,
                resolved_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            });
        }
        book
    }

    fn inputs(prices: PriceBook) -> ValuationInputs {
        ValuationInputs {
            wallet: WALLET,
            holdings: Vec::new(),
            staking: Vec::new(),
            liquidity: Vec::new(),
            lending: Vec::new(),
            collections: Vec::new(),
            tokens: [(usdc().address, usdc()), (gem().address, gem()), (stk().address, stk())]
                .into_iter()
                .collect(),
            prices,
            as_of: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn lending(collateral: U256, debt: U256) -> LendingPosition {
        LendingPosition {
            protocol: "lend".to_string(),
            market: None,
            collateral: vec![(usdc(), collateral)],
            debt: vec![(usdc(), debt)],
        }
    }

    fn full_inputs() -> ValuationInputs {
        let mut inputs = inputs(book(&[(usdc().address, Decimal::ONE), (gem().address, dec!(0.5))]));
        inputs.holdings = vec![
            Holding {
                token: gem(),
                raw_balance: units(2, 18),
            },
            Holding {
                token: usdc(),
                raw_balance: U256::ZERO,
            },
        ];
        inputs.staking = vec![StakingPool {
            pool_id: 0,
            staking_token: gem().address,
            rewards_token: usdc().address,
            apr_bps: U256::from(500u64),
            lock_period_secs: U256::ZERO,
            total_staked: units(1_000, 18),
            user_staked: units(10, 18),
            user_pending_rewards: units(1, 6),
        }];
        inputs.liquidity = vec![LiquidityPair {
            pair_address: Address::repeat_byte(0x55),
            token0: gem().address,
            token1: usdc().address,
            reserve0: units(1_000, 18),
            reserve1: units(500, 6),
            total_lp_supply: U256::from(100u64),
            user_lp_balance: U256::from(10u64),
        }];
        inputs.lending = vec![lending(units(100, 6), units(40, 6))];
        inputs.collections = vec![CollectionItem {
            collection: Address::repeat_byte(0xc0),
            token_id: U256::from(1u64),
            name: Some("Item".to_string()),
            floor_token: usdc(),
            floor_raw: units(25, 6),
        }];
        inputs
    }

    #[test]
    fn test_reserve_priced_holding() {
        let mut inputs = inputs(book(&[(gem().address, dec!(0.5))]));
        inputs.holdings = vec![Holding {
            token: gem(),
            raw_balance: units(2, 18),
        }];
        let valuation = compute_snapshot(&inputs);
        assert_eq!(valuation.snapshot.holdings_usd, dec!(1));
        assert_eq!(valuation.snapshot.total_usd, dec!(1));
        assert_eq!(valuation.snapshot.unpriced_count, 0);
    }

    #[test]
    fn test_unpriced_staking_listed_and_flagged() {
        let mut inputs = inputs(PriceBook::new());
        inputs.staking = vec![StakingPool {
            pool_id: 3,
            staking_token: stk().address,
            rewards_token: stk().address,
            apr_bps: U256::from(1250u64),
            lock_period_secs: U256::ZERO,
            total_staked: units(1_000, 18),
            user_staked: units(100, 18),
            user_pending_rewards: U256::ZERO,
        }];

        let valuation = compute_snapshot(&inputs);
        assert_eq!(valuation.staking.len(), 1);
        let position = &valuation.staking[0];
        assert_eq!(position.net_usd, Decimal::ZERO);
        assert!(position.unpriced);
        assert_eq!(position.label, "Pool #3 STK");
        assert_eq!(inputs.staking[0].apr_percent(), dec!(12.5));
        assert_eq!(valuation.snapshot.staking_usd, Decimal::ZERO);
        assert_eq!(valuation.snapshot.unpriced_count, 1);
        assert_eq!(valuation.snapshot.position_count, 1);
    }

    #[test]
    fn test_lending_net_may_be_negative() {
        let prices = book(&[(usdc().address, Decimal::ONE)]);

        let mut positive = inputs(prices.clone());
        positive.lending = vec![lending(units(3367, 6), units(2450, 6))];
        let valuation = compute_snapshot(&positive);
        assert_eq!(valuation.snapshot.lending_net_usd, dec!(917.00));
        assert_eq!(valuation.lending[0].net_usd, dec!(917));

        let mut negative = inputs(prices);
        negative.lending = vec![lending(units(3367, 6), units(3500, 6))];
        let valuation = compute_snapshot(&negative);
        assert_eq!(valuation.snapshot.lending_net_usd, dec!(-133.00));
        assert_eq!(valuation.snapshot.total_usd, dec!(-133));
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let valuation = compute_snapshot(&full_inputs());
        let s = &valuation.snapshot;

        assert_eq!(s.holdings_usd, dec!(1));
        // 10 GEM staked at 0.5 + 1 USDC pending
        assert_eq!(s.staking_usd, dec!(6));
        // 10% of (1000 GEM, 500 USDC)
        assert_eq!(s.liquidity_usd, dec!(100));
        assert_eq!(s.lending_net_usd, dec!(60));
        assert_eq!(s.collections_usd, dec!(25));
        assert_eq!(
            s.total_usd,
            s.holdings_usd + s.staking_usd + s.liquidity_usd + s.lending_net_usd + s.collections_usd
        );
        assert_eq!(s.total_usd, dec!(192));
        assert_eq!(s.asset_count, 1);
        assert_eq!(s.position_count, 4);
        assert_eq!(s.unpriced_count, 0);
    }

    #[test]
    fn test_all_prices_absent_totals_zero() {
        let mut inputs = full_inputs();
        inputs.prices = PriceBook::new();

        let valuation = compute_snapshot(&inputs);
        let s = &valuation.snapshot;
        assert_eq!(s.total_usd, Decimal::ZERO);
        assert_eq!(
            s.total_usd,
            s.holdings_usd + s.staking_usd + s.liquidity_usd + s.lending_net_usd + s.collections_usd
        );
        // holding 1, staking 2, liquidity 2, lending 2, collection 1
        assert_eq!(s.unpriced_count, 8);
        assert!(valuation.holdings.iter().all(|p| p.unpriced));
    }

    #[test]
    fn test_idempotent_serialization() {
        let inputs = full_inputs();
        let first = serde_json::to_string(&compute_snapshot(&inputs)).unwrap();
        let second = serde_json::to_string(&compute_snapshot(&inputs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_visible_holdings_excludes_hidden() {
        let mut inputs = full_inputs();
        inputs.holdings.push(Holding {
            token: usdc(),
            raw_balance: units(4, 6),
        });
        let valuation = compute_snapshot(&inputs);
        assert_eq!(valuation.snapshot.holdings_usd, dec!(5));

        let mut filter = VisibilityFilter::in_memory();
        assert_eq!(valuation.visible_holdings_usd(&filter), dec!(5));
        filter.hide(gem().address);
        assert_eq!(valuation.visible_holdings_usd(&filter), dec!(4));
        assert_eq!(valuation.snapshot.total_usd, dec!(196));
    }
}
