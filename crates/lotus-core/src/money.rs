//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! In floating point:   0.1 + 0.2 = 0.30000000000000004
//! In this crate:       10 cents + 20 cents = 30 cents, exactly
//! ```
//! Balance debits and referral commissions accumulate over thousands of
//! settlements; floating-point drift there is unacceptable. Every monetary
//! comparison and every commission calculation happens in integer cents.
//! Decimal currency appears only at read boundaries (request bodies,
//! display), converted through [`Money::from_decimal`] / [`Money::to_decimal`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values are representable so that invariant
///   checks (commission ≥ 0, balance ≥ 0) can actually detect violations
///   instead of silently wrapping.
/// - **Single-field tuple struct**: zero-cost abstraction over i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

/// Tolerance for declared payment splits: one cent.
///
/// A split payment (balance + cash) must match the appointment's actual
/// price within this bound. Preserved from the reference behavior as a
/// documented constant; do not re-derive.
pub const PAYMENT_EPSILON: Money = Money::from_cents(1);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal currency amount to integer cents, rounding
    /// half-away-from-zero at the cent boundary.
    ///
    /// This is the only float → money entry point; it exists for request
    /// boundaries where clients send decimal amounts (e.g. `49.98`).
    ///
    /// ## Example
    /// ```rust
    /// use lotus_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(10.99).cents(), 1099);
    /// assert_eq!(Money::from_decimal(19.999999).cents(), 2000);
    /// assert_eq!(Money::from_decimal(-5.50).cents(), -550);
    /// ```
    #[inline]
    pub fn from_decimal(amount: f64) -> Self {
        // f64::round rounds half-away-from-zero, matching apply_rate.
        Money((amount * 100.0).round() as i64)
    }

    /// Converts back to decimal currency. Display/serialization use only;
    /// never feed the result back into arithmetic.
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a percentage rate (e.g. a referral commission rate) and
    /// rounds half-away-from-zero at the cent boundary.
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow: `(cents * bps ± 5000) / 10000`.
    /// The ±5000 term provides the rounding (5000/10000 = half a cent).
    ///
    /// ## Example
    /// ```rust
    /// use lotus_core::money::{Money, Rate};
    ///
    /// let price = Money::from_cents(5000); // 50.00
    /// let rate = Rate::from_bps(1000);     // 10%
    /// assert_eq!(price.apply_rate(rate).cents(), 500); // exactly 5.00
    ///
    /// // 10.05 at 10% = 1.005 → rounds away from zero to 1.01
    /// assert_eq!(Money::from_cents(1005).apply_rate(rate).cents(), 101);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128;
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        Money(rounded as i64)
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A percentage rate in basis points (1 bps = 0.01%; 1000 bps = 10%).
///
/// Basis points keep rate arithmetic in integers end to end; the referral
/// commission rate is configured this way rather than as an f64 fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction (for display only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. UI formatting/localization happens client-side.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_decimal_rounds_to_nearest_cent() {
        assert_eq!(Money::from_decimal(10.99).cents(), 1099);
        assert_eq!(Money::from_decimal(19.999999).cents(), 2000);
        assert_eq!(Money::from_decimal(0.005).cents(), 1);
        assert_eq!(Money::from_decimal(-0.005).cents(), -1);
        assert_eq!(Money::from_decimal(50.0).cents(), 5000);
    }

    #[test]
    fn test_to_decimal() {
        assert!((Money::from_cents(1099).to_decimal() - 10.99).abs() < 1e-9);
        assert!((Money::from_cents(-550).to_decimal() + 5.50).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);

        let mut c = a;
        c += b;
        assert_eq!(c.cents(), 1500);
        c -= b;
        assert_eq!(c.cents(), 1000);
    }

    #[test]
    fn test_apply_rate_exact() {
        // 50.00 at 10% = exactly 5.00
        let commission = Money::from_cents(5000).apply_rate(Rate::from_bps(1000));
        assert_eq!(commission.cents(), 500);
    }

    #[test]
    fn test_apply_rate_rounds_half_away_from_zero() {
        let ten_pct = Rate::from_bps(1000);

        // 10.05 * 10% = 1.005 → 1.01
        assert_eq!(Money::from_cents(1005).apply_rate(ten_pct).cents(), 101);
        // 10.04 * 10% = 1.004 → 1.00
        assert_eq!(Money::from_cents(1004).apply_rate(ten_pct).cents(), 100);
        // negative amounts round away from zero symmetrically
        assert_eq!(Money::from_cents(-1005).apply_rate(ten_pct).cents(), -101);
    }

    #[test]
    fn test_commission_never_exceeds_source_at_sane_rates() {
        let rate = Rate::from_bps(1000);
        for cents in [1, 7, 99, 1234, 999_999] {
            let amount = Money::from_cents(cents);
            let commission = amount.apply_rate(rate);
            assert!(commission.cents() >= 0);
            assert!(commission <= amount);
        }
    }

    #[test]
    fn test_payment_epsilon_is_one_cent() {
        assert_eq!(PAYMENT_EPSILON.cents(), 1);
    }
}
