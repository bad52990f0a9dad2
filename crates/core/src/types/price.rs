//! Money arithmetic on `rust_decimal::Decimal`.
//!
//! The store sells in a single currency, so amounts are plain decimals in
//! dollars. These helpers keep rounding consistent between order totals,
//! cart subtotals and adjusted prices.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round an amount to whole cents. Midpoints round away from zero.
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum a sequence of prices and round the result to cents.
#[must_use]
pub fn sum_prices<I>(prices: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_to_cents(prices.into_iter().sum())
}

/// Format an amount for display, e.g. `$19.90`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", round_to_cents(amount))
}
