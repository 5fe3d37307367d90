//! # Pricing & Totals
//!
//! Pure functions turning sale lines into subtotal, tax and total.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines: [(unit_price, quantity)]                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  subtotal = Σ unit_price × quantity        (exact, integer)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tax = round_half_up(subtotal × rate)      (the ONLY rounding step)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total = subtotal + tax                    (exact, integer)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Same input, same output: no clock, no storage, no floats.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ProductRef, TaxRate};

/// Computed totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Resolves the unit price charged for a line.
///
/// The override wins when present and positive; otherwise the product's
/// current list price is charged.
pub fn price_line(product: &ProductRef, unit_price_override: Option<Money>) -> Money {
    match unit_price_override {
        Some(price) if price.is_positive() => price,
        _ => product.list_price,
    }
}

/// Computes subtotal, tax and total for `(unit_price, quantity)` pairs.
///
/// ## Example
/// ```rust
/// use gon_core::money::Money;
/// use gon_core::pricing::compute_totals;
/// use gon_core::types::IVA_RATE;
///
/// let totals = compute_totals(&[(Money::from_minor(100), 3)], IVA_RATE);
/// assert_eq!(totals.subtotal.minor_units(), 300);
/// assert_eq!(totals.tax.minor_units(), 57);
/// assert_eq!(totals.total.minor_units(), 357);
/// ```
pub fn compute_totals(lines: &[(Money, i64)], rate: TaxRate) -> Totals {
    let subtotal: Money = lines
        .iter()
        .map(|(unit_price, qty)| unit_price.multiply_quantity(*qty))
        .sum();
    let tax = subtotal.calculate_tax(rate);

    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
