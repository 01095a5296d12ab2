//! Fixed-point and integer helpers
//!
//! All price and weight arithmetic in the router runs on [`FixedU128`], an
//! unsigned fixed-point number with [`PRECISION`] (10^12) as its unit. The
//! operators saturate instead of panicking so that price computations always
//! terminate with a clamped value. Monetary amounts use the checked helpers
//! and surface overflow as an error at the call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point unit (10^12)
pub const PRECISION: u128 = 1_000_000_000_000;

/// Basis point denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Compute `floor(a * b / c)` with a full 256-bit intermediate product.
///
/// Returns `None` when `c == 0` or the result does not fit in `u128`.
pub fn checked_mul_div(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / c);
    }

    let (hi, lo) = widening_mul(a, b);
    div_wide(hi, lo, c)
}

/// `floor(sum(value * weight) / sum(weight))` over `(value, weight)` terms.
///
/// The numerator is accumulated at 256 bits, so the result is exact for any
/// inputs. Returns `None` when the total weight is zero or exceeds `u128`.
pub fn weighted_mean(terms: &[(u128, u128)]) -> Option<u128> {
    let mut total: u128 = 0;
    let (mut hi, mut lo) = (0u128, 0u128);
    for &(value, weight) in terms {
        total = total.checked_add(weight)?;
        let (term_hi, term_lo) = widening_mul(value, weight);
        let (sum_lo, carry) = lo.overflowing_add(term_lo);
        lo = sum_lo;
        hi = hi.checked_add(term_hi)?.checked_add(carry as u128)?;
    }
    if total == 0 {
        return None;
    }
    div_wide(hi, lo, total)
}

/// Divide the 256-bit value `hi:lo` by `c`, `None` if the quotient overflows
fn div_wide(hi: u128, lo: u128, c: u128) -> Option<u128> {
    if c == 0 || hi >= c {
        return None;
    }

    // Shift-subtract long division; rem < c holds between steps
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    Some(quotient)
}

/// Full product of two u128 values as `(high, low)` halves
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;

    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let low = (ll & MASK) | (mid << 64);
    let high = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / c)` clamped to `u128::MAX`; zero divisor clamps as well.
pub fn saturating_mul_div(a: u128, b: u128, c: u128) -> u128 {
    checked_mul_div(a, b, c).unwrap_or(u128::MAX)
}

/// Amount times basis points, rounded down. Errors are surfaced by callers.
pub fn checked_bps(amount: u128, bps: u16) -> Option<u128> {
    checked_mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

/// Unsigned fixed-point number with 12 decimals of precision
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixedU128(u128);

impl FixedU128 {
    pub const fn from_inner(inner: u128) -> Self {
        Self(inner)
    }

    pub const fn into_inner(self) -> u128 {
        self.0
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn one() -> Self {
        Self(PRECISION)
    }

    pub const fn max_value() -> Self {
        Self(u128::MAX)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn from_integer(n: u128) -> Self {
        Self(n.saturating_mul(PRECISION))
    }

    /// `numerator / denominator`, or `None` on zero denominator or overflow
    pub fn checked_from_rational(numerator: u128, denominator: u128) -> Option<Self> {
        checked_mul_div(numerator, PRECISION, denominator).map(Self)
    }

    /// `numerator / denominator` clamped; a zero denominator yields zero.
    pub fn saturating_from_rational(numerator: u128, denominator: u128) -> Self {
        if denominator == 0 {
            return Self::zero();
        }
        Self(saturating_mul_div(numerator, PRECISION, denominator))
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn saturating_mul(self, other: Self) -> Self {
        Self(saturating_mul_div(self.0, other.0, PRECISION))
    }

    /// Division by zero clamps to the maximum value.
    pub fn saturating_div(self, other: Self) -> Self {
        if other.0 == 0 {
            return Self::max_value();
        }
        Self(saturating_mul_div(self.0, PRECISION, other.0))
    }

    /// Multiply an integer amount by this value, rounding down.
    pub fn saturating_mul_int(self, n: u128) -> u128 {
        saturating_mul_div(n, self.0, PRECISION)
    }

    /// Scale by `bps / 10000`.
    pub fn saturating_mul_bps(self, bps: u32) -> Self {
        Self(saturating_mul_div(self.0, bps as u128, BPS_DENOMINATOR))
    }
}

impl fmt::Debug for FixedU128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedU128({})", self)
    }
}

impl fmt::Display for FixedU128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:012}", self.0 / PRECISION, self.0 % PRECISION)
    }
}

/// Integer square root using Newton's method
///
/// Returns floor(sqrt(n)) for all u128 inputs. Newton's method converges
/// quadratically from an overestimate; the loop stops as soon as the next
/// iterate stops decreasing.
pub fn integer_sqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    if n == 1 {
        return 1;
    }

    // sqrt(n) < 2^((log2(n) + 1) / 2)
    let shift = (127 - n.leading_zeros()) / 2 + 1;
    let mut x = 1u128 << shift;

    // x_{n+1} = (x_n + n/x_n) / 2
    loop {
        let next_x = (x + n / x) / 2;
        if next_x >= x {
            return x;
        }
        x = next_x;
    }
}
