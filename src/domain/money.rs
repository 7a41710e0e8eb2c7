//! Conversion between gateway minor units and decimal amounts
//!
//! The gateway reports every amount as an integer count of the currency's
//! smallest unit. Conversion happens once, where wire data enters the domain.

use rust_decimal::Decimal;

/// Number of decimal places in the minor unit of `currency` (ISO 4217)
pub fn minor_unit_exponent(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" => 3,
        _ => 2,
    }
}

/// Convert a minor-unit integer into a decimal amount
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_exponent(currency))
}

/// Convert a decimal amount back into minor units, if it is representable exactly
pub fn to_minor_units(amount: Decimal, currency: &str) -> Option<i64> {
    let scaled = amount * Decimal::from(10i64.pow(minor_unit_exponent(currency)));
    if scaled.fract().is_zero() {
        i64::try_from(scaled.trunc()).ok()
    } else {
        None
    }
}
