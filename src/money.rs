//! Parsing monetary amounts from JSON request bodies.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::Error;

/// Convert a JSON number into an exact decimal.
///
/// serde_json keeps numbers as the text they were written with, so the
/// decimal is parsed from the digits the client sent and never passes
/// through an `f64`. Strings, booleans and other non-number values are
/// rejected, as are numbers that a [Decimal] cannot represent.
///
/// # Errors
/// Returns [Error::NotANumber] naming `field` if `value` is not a representable number.
pub fn decimal_from_json(value: &Value, field: &'static str) -> Result<Decimal, Error> {
    let Value::Number(number) = value else {
        return Err(Error::NotANumber(field));
    };

    let text = number.to_string();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text)
    } else {
        Decimal::from_str(&text)
    };

    parsed.map_err(|_| Error::NotANumber(field))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::Error;

    use super::decimal_from_json;

    #[test]
    fn converts_integers_and_fractions() {
        assert_eq!(decimal_from_json(&json!(50), "Amount"), Ok(dec!(50)));
        assert_eq!(decimal_from_json(&json!(25.5), "Amount"), Ok(dec!(25.5)));
        assert_eq!(decimal_from_json(&json!(-0.1), "Amount"), Ok(dec!(-0.1)));
    }

    #[test]
    fn keeps_every_digit_of_long_amounts() {
        let value: serde_json::Value = serde_json::from_str("1234567890123456.78").unwrap();

        assert_eq!(
            decimal_from_json(&value, "Amount"),
            Ok(dec!(1234567890123456.78))
        );
    }

    #[test]
    fn converts_scientific_notation() {
        assert_eq!(decimal_from_json(&json!(1e3), "Amount"), Ok(dec!(1000)));

        let value: serde_json::Value = serde_json::from_str("2.5e2").unwrap();
        assert_eq!(decimal_from_json(&value, "Amount"), Ok(dec!(250)));
    }

    #[test]
    fn rejects_strings() {
        assert_eq!(
            decimal_from_json(&json!("25.50"), "Amount"),
            Err(Error::NotANumber("Amount"))
        );
    }

    #[test]
    fn rejects_null_and_booleans() {
        assert_eq!(
            decimal_from_json(&json!(null), "Balance"),
            Err(Error::NotANumber("Balance"))
        );
        assert_eq!(
            decimal_from_json(&json!(true), "Balance"),
            Err(Error::NotANumber("Balance"))
        );
    }
}
