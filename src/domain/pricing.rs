use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};

/// Orders over this item total ship for free.
const FREE_SHIPPING_THRESHOLD: i32 = 100;
const FLAT_SHIPPING_RATE: i32 = 10;
const TAX_RATE: &str = "0.08";

/// Totals computed for a cart before it is submitted to the payment
/// gateway. Values keep full precision; use [`to_money`] when rendering
/// or submitting them.
#[derive(Debug, Clone, PartialEq)]
pub struct CartTotals {
    pub item_total: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub discount: BigDecimal,
    pub total: BigDecimal,
}

/// Price a cart from its `(unit_price, quantity)` lines.
pub fn price_cart(lines: &[(BigDecimal, i32)]) -> CartTotals {
    let item_total = lines
        .iter()
        .fold(BigDecimal::from(0), |acc, (price, qty)| {
            acc + price * BigDecimal::from(*qty)
        });

    let shipping = if item_total > BigDecimal::from(FREE_SHIPPING_THRESHOLD) {
        BigDecimal::from(0)
    } else {
        BigDecimal::from(FLAT_SHIPPING_RATE)
    };

    let tax_rate = BigDecimal::from_str(TAX_RATE).expect("tax rate is a valid decimal");
    let tax = &item_total * tax_rate;

    // Discounts are not applied anywhere yet; the field exists so order
    // totals carry the full breakdown from day one.
    let discount = BigDecimal::from(0);

    let total = &item_total + &shipping + &tax - &discount;

    CartTotals {
        item_total,
        shipping,
        tax,
        discount,
        total,
    }
}

/// Round a monetary amount to 2 decimal places, half-up.
pub fn to_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}
