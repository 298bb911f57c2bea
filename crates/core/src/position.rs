//! Position data structures for every venue a wallet can hold value in.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::amount;
use crate::token::TokenDescriptor;

/// Token legs of one position. Most positions have one or two.
pub type Legs = SmallVec<[(TokenDescriptor, U256); 2]>;

/// Where a position lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    /// Spot token balance
    Holding,
    /// Staking pool deposit + accrued rewards
    Staking,
    /// AMM liquidity pair share
    Liquidity,
    /// Collateralized-debt position (collateral minus debt)
    Lending,
    /// Non-fungible item valued at its collection floor
    Collection,
}

/// Spot balance of one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub token: TokenDescriptor,
    pub raw_balance: U256,
}

/// One staking pool as read from the staking contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPool {
    pub pool_id: u64,
    pub staking_token: Address,
    pub rewards_token: Address,
    pub apr_bps: U256,
    pub lock_period_secs: U256,
    pub total_staked: U256,
    pub user_staked: U256,
    pub user_pending_rewards: U256,
}

impl StakingPool {
    /// Whether the wallet has a deposit in this pool.
    pub fn is_active(&self) -> bool {
        !self.user_staked.is_zero()
    }

    /// APR as a percentage (1250 bps -> 12.5).
    pub fn apr_percent(&self) -> Decimal {
        amount::bps_to_percent(self.apr_bps)
    }

    /// Lock period, saturating at `u64::MAX` seconds.
    pub fn lock_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::try_from(self.lock_period_secs).unwrap_or(u64::MAX))
    }
}

/// One AMM pair as read from the factory and pair contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPair {
    pub pair_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_lp_supply: U256,
    pub user_lp_balance: U256,
}

impl LiquidityPair {
    /// Wallet's share of reserve0 (floor; zero when supply is zero).
    pub fn user_token0_amount(&self) -> U256 {
        amount::pro_rata(self.reserve0, self.user_lp_balance, self.total_lp_supply)
    }

    /// Wallet's share of reserve1 (floor; zero when supply is zero).
    pub fn user_token1_amount(&self) -> U256 {
        amount::pro_rata(self.reserve1, self.user_lp_balance, self.total_lp_supply)
    }

    /// Wallet's pool share in basis points.
    pub fn share_bps(&self) -> u64 {
        amount::share_bps(self.user_lp_balance, self.total_lp_supply)
    }
}

/// A lending position from the external feed, with resolved token metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingPosition {
    pub protocol: String,
    pub market: Option<String>,
    pub collateral: Vec<(TokenDescriptor, U256)>,
    pub debt: Vec<(TokenDescriptor, U256)>,
}

/// A non-fungible item valued at its collection floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionItem {
    pub collection: Address,
    pub token_id: U256,
    pub name: Option<String>,
    pub floor_token: TokenDescriptor,
    pub floor_raw: U256,
}

/// A valued position, as shown in drill-down lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub venue: Venue,
    pub label: String,
    pub underlying: Legs,
    /// Net USD value; negative only for lending positions
    pub net_usd: Decimal,
    /// At least one non-zero leg had no price
    pub unpriced: bool,
}
