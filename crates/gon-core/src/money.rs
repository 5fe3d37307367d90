//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A sale of 3 × $100 with 19% IVA must be exactly:                       │
//! │    subtotal 300, tax 57, total 357                                      │
//! │                                                                         │
//! │  OUR SOLUTION: integer minor units everywhere                           │
//! │    Sums and products are exact. The only rounding in the whole          │
//! │    pipeline is the single tax rounding in `calculate_tax`.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gon_core::money::Money;
//!
//! let price = Money::from_minor(100);
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.minor_units(), 300);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of the tenant currency.
///
/// For CLP (the currency the back office runs in) the smallest unit is the
/// peso itself, so `Money::from_minor(357)` is `$357`.
///
/// ## Where Money Flows
/// ```text
/// Product.list_price ──► SaleLineItem.unit_price ──► line_subtotal
///                                                        │
///                                    Σ ──► Sale.subtotal ┘
///                                              │
///                              calculate_tax ──► Sale.tax
///                                              │
///                                  Sale.total = subtotal + tax
///                                              │
///                       Payment.amount / SaleReturn.refund_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use gon_core::money::Money;
    ///
    /// let price = Money::from_minor(1990);
    /// assert_eq!(price.minor_units(), 1990);
    /// ```
    #[inline]
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax, rounding half away from zero to the minor unit.
    ///
    /// ## Implementation
    /// Integer math in `i128`: `(amount * bps + 5000) / 10000`.
    /// The +5000 is the half-unit that turns truncation into rounding.
    ///
    /// ## Example
    /// ```rust
    /// use gon_core::money::Money;
    /// use gon_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_minor(300);
    /// let tax = subtotal.calculate_tax(TaxRate::from_bps(1900));
    /// // 300 × 19% = 57 exactly
    /// assert_eq!(tax.minor_units(), 57);
    ///
    /// // 150 × 19% = 28.5 → 29
    /// let tax = Money::from_minor(150).calculate_tax(TaxRate::from_bps(1900));
    /// assert_eq!(tax.minor_units(), 29);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let half = 5000_i128;
        let tax = if product >= 0 {
            (product + half) / 10000
        } else {
            (product - half) / 10000
        };
        Money::from_minor(tax as i64)
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ```text
    /// unit_price 100 × quantity 3 ──► line_subtotal 300
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering. The web client formats for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}", sign, self.0.unsigned_abs())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
