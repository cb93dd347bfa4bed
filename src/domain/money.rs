use anyhow::{bail, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Minor-unit exponent per ISO 4217. Providers that bill in cents need the
/// amount scaled by 10^decimals before transmission.
pub fn currency_decimals(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" => 0,
        "BHD" | "KWD" | "OMR" | "TND" => 3,
        _ => 2,
    }
}

pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<i64> {
    let scaled = amount * Decimal::from(10i64.pow(decimals));
    let Some(minor) = scaled.round().to_i64() else {
        bail!("amount {} does not fit in minor units", amount);
    };
    if minor < 0 {
        bail!("amount {} is negative", amount);
    }
    Ok(minor)
}

pub fn from_minor_units(minor: i64, decimals: u32) -> Decimal {
    Decimal::new(minor, decimals)
}

pub fn format_amount(amount: Decimal, currency: &str) -> String {
    let decimals = currency_decimals(currency);
    format!("{} {}", currency.to_ascii_uppercase(), amount.round_dp(decimals))
}
