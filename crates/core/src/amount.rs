//! U256 amount arithmetic and conversion into exact decimals.
//!
//! Raw on-chain amounts stay `U256` until the last step; only the
//! decimal-adjusted value that gets multiplied by a price becomes a
//! [`Decimal`]. No `f64` is involved anywhere in valuation.

use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Largest scale a `Decimal` can carry.
const MAX_DECIMAL_SCALE: u8 = 28;

/// Pre-computed powers of 10 for fast decimal conversion
const POW10: [u128; 39] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
    100_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000_000,
];

/// Fast power of 10 lookup (up to 10^38)
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if exp < 39 {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// One whole token in smallest units.
#[inline]
pub fn one_unit(decimals: u8) -> U256 {
    pow10(decimals)
}

/// Decimal-adjusted value of a raw amount: `raw / 10^decimals`.
///
/// Fractional digits beyond 28 are truncated. Returns `None` when the whole
/// part does not fit a `Decimal` (~7.9e28).
pub fn to_decimal(raw: U256, decimals: u8) -> Option<Decimal> {
    if raw.is_zero() {
        return Some(Decimal::ZERO);
    }

    let unit = pow10(decimals);
    let whole = raw / unit;
    let mut frac = raw % unit;

    let whole = u128::try_from(whole).ok()?;
    let whole = Decimal::try_from_i128_with_scale(i128::try_from(whole).ok()?, 0).ok()?;

    let mut scale = decimals;
    if scale > MAX_DECIMAL_SCALE {
        frac /= pow10(scale - MAX_DECIMAL_SCALE);
        scale = MAX_DECIMAL_SCALE;
    }
    // frac < 10^scale <= 10^28, always representable
    let frac = u128::try_from(frac).ok()?;
    let frac = Decimal::try_from_i128_with_scale(i128::try_from(frac).ok()?, u32::from(scale)).ok()?;

    whole.checked_add(frac)
}

/// `amount * numerator / denominator`, floored; zero when the denominator is zero.
///
/// Used for LP pro-rata shares: `reserve * user_balance / total_supply`.
pub fn pro_rata(amount: U256, numerator: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    match amount.checked_mul(numerator) {
        Some(product) => product / denominator,
        // Product beyond 2^256: divide first, accepting the coarser floor
        None => (amount / denominator).saturating_mul(numerator),
    }
}

/// Share of `part` in `whole` expressed in basis points, floored and capped at 100%.
pub fn share_bps(part: U256, whole: U256) -> u64 {
    if whole.is_zero() {
        return 0;
    }
    let bps = pro_rata(U256::from(BPS_DENOMINATOR), part, whole);
    u64::try_from(bps).unwrap_or(BPS_DENOMINATOR).min(BPS_DENOMINATOR)
}

/// Basis points as a percentage (1250 -> 12.5).
pub fn bps_to_percent(bps: U256) -> Decimal {
    match u64::try_from(bps) {
        Ok(bps) => Decimal::new(bps as i64, 2),
        Err(_) => Decimal::MAX,
    }
}
