use donations_gateway::domain::money::{
    currency_decimals, format_amount, from_minor_units, to_minor_units,
};
use rust_decimal_macros::dec;

#[test]
fn minor_unit_exponents() {
    assert_eq!(currency_decimals("USD"), 2);
    assert_eq!(currency_decimals("zwl"), 2);
    assert_eq!(currency_decimals("JPY"), 0);
    assert_eq!(currency_decimals("KWD"), 3);
}

#[test]
fn dollars_to_cents_and_back() {
    let minor = to_minor_units(dec!(12.34), 2).unwrap();
    assert_eq!(minor, 1234);
    assert_eq!(from_minor_units(minor, 2), dec!(12.34));
}

#[test]
fn zero_decimal_currency_is_not_scaled() {
    assert_eq!(to_minor_units(dec!(500), 0).unwrap(), 500);
}

#[test]
fn sub_cent_amounts_round() {
    assert_eq!(to_minor_units(dec!(0.005), 2).unwrap(), 1);
    assert_eq!(to_minor_units(dec!(0.004), 2).unwrap(), 0);
}

#[test]
fn negative_amount_is_rejected() {
    assert!(to_minor_units(dec!(-5), 2).is_err());
}

#[test]
fn formatting_uses_currency_exponent() {
    assert_eq!(format_amount(dec!(12.345), "usd"), "USD 12.35");
    assert_eq!(format_amount(dec!(500), "JPY"), "JPY 500");
}
