//! Value Objects for order intake

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human-readable order identifier: `<PREFIX><YY><MM><DD><SEQ>`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Minimum width of the daily sequence part.
    pub const SEQUENCE_WIDTH: usize = 4;

    pub fn compose(prefix: &str, day: NaiveDate, sequence: u32) -> Self {
        Self(format!(
            "{prefix}{:02}{:02}{:02}{sequence:0width$}",
            day.year() % 100,
            day.month(),
            day.day(),
            width = Self::SEQUENCE_WIDTH
        ))
    }

    /// Splits a number back into its date and sequence parts for the given prefix.
    pub fn parse(prefix: &str, value: &str) -> Result<(NaiveDate, u32), OrderNumberError> {
        let rest = value.strip_prefix(prefix).ok_or(OrderNumberError::Prefix)?;
        if rest.len() < 6 + Self::SEQUENCE_WIDTH || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::Shape);
        }
        let (date, seq) = rest.split_at(6);
        let num = |s: &str| s.parse::<u32>().map_err(|_| OrderNumberError::Shape);
        let day = NaiveDate::from_ymd_opt(2000 + num(&date[0..2])? as i32, num(&date[2..4])?, num(&date[4..6])?)
            .ok_or(OrderNumberError::Date)?;
        Ok((day, num(seq)?))
    }

    /// Wraps a number that was already assigned and persisted.
    pub fn from_stored(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderNumberError {
    #[error("order number prefix mismatch")]
    Prefix,
    #[error("order number must be six date digits followed by a sequence")]
    Shape,
    #[error("order number carries an invalid date")]
    Date,
}

/// Accepted payment methods. Anything else is coerced to the configured default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] CreditCard, Paypal, BankTransfer, Cod, Upi }

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [Self::CreditCard, Self::Paypal, Self::BankTransfer, Self::Cod, Self::Upi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
            Self::Cod => "cod",
            Self::Upi => "upi",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit Card",
            Self::Paypal => "PayPal",
            Self::BankTransfer => "Bank Transfer",
            Self::Cod => "Cash on Delivery",
            Self::Upi => "UPI",
        }
    }

    /// Resolves a client-supplied value, falling back to `default` for unknown or missing input.
    pub fn coerce(value: Option<&str>, default: PaymentMethod) -> (PaymentMethod, bool) {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => (default, false),
            Some(v) => v.parse().map(|m| (m, false)).unwrap_or((default, true)),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_compose() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(OrderNumber::compose("TRB", day, 12).as_str(), "TRB2503070012");
        assert_eq!(OrderNumber::compose("TRB", day, 12345).as_str(), "TRB25030712345");
    }

    #[test]
    fn test_order_number_parse() {
        let (day, seq) = OrderNumber::parse("TRB", "TRB2512310042").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(seq, 42);
        assert_eq!(OrderNumber::parse("HV", "TRB2512310042"), Err(OrderNumberError::Prefix));
        assert_eq!(OrderNumber::parse("TRB", "TRB25123100"), Err(OrderNumberError::Shape));
        assert_eq!(OrderNumber::parse("TRB", "TRB2513310001"), Err(OrderNumberError::Date));
    }

    #[test]
    fn test_payment_method_coercion() {
        assert_eq!(PaymentMethod::coerce(Some("upi"), PaymentMethod::CreditCard), (PaymentMethod::Upi, false));
        assert_eq!(PaymentMethod::coerce(Some("bitcoin"), PaymentMethod::Cod), (PaymentMethod::Cod, true));
        assert_eq!(PaymentMethod::coerce(None, PaymentMethod::Paypal), (PaymentMethod::Paypal, false));
        assert_eq!(PaymentMethod::coerce(Some("  "), PaymentMethod::Paypal), (PaymentMethod::Paypal, false));
    }
}
