//! IGV arithmetic for boleta line items.
//!
//! Prices are entered tax-inclusive; the billing API expects the
//! tax-exclusive unit value. All amounts are rounded to cents with
//! midpoint-away-from-zero rounding.

use crate::models::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rate applied when an item does not state one.
pub const DEFAULT_IGV_PERCENTAGE: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// Round a monetary amount to two decimals.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax-exclusive base value of a tax-inclusive price.
///
/// A zero rate returns the price untouched, without rounding.
pub fn base_value(price_with_tax: Decimal, tax_percentage: Decimal) -> Decimal {
    if tax_percentage.is_zero() {
        return price_with_tax;
    }
    let rate = tax_percentage / Decimal::ONE_HUNDRED;
    round_money(price_with_tax / (Decimal::ONE + rate))
}

/// Tax owed on a base value.
pub fn tax_amount(base: Decimal, tax_percentage: Decimal) -> Decimal {
    round_money(base * tax_percentage / Decimal::ONE_HUNDRED)
}

/// Sale total as the buyer sees it: quantity times tax-inclusive price.
pub fn sale_total(items: &[LineItem]) -> Decimal {
    round_money(
        items
            .iter()
            .map(|item| item.quantity * item.unit_price)
            .sum(),
    )
}
