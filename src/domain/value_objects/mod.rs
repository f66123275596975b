//! Value Objects for the storefront order domain

mod status;
mod tracking;

pub use status::{lookup, OrderStatus, StatusCode, StatusConfig, UnknownStatus};
pub use tracking::{Carrier, TrackingError, TrackingNumber};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in VND. The backend sends plain JSON numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn add(&self, other: &Money) -> Money { Money(self.0 + other.0) }
}

impl From<i64> for Money {
    fn from(v: i64) -> Self { Self(Decimal::from(v)) }
}

impl fmt::Display for Money {
    /// `1500000` renders as `1.500.000₫`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0.round_dp(0).abs().trunc().to_string();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 { grouped.push('.'); }
            grouped.push(ch);
        }
        let sign = if self.0.is_sign_negative() && !self.0.round_dp(0).is_zero() { "-" } else { "" };
        write!(f, "{sign}{grouped}₫")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from(1_500_000).to_string(), "1.500.000₫");
        assert_eq!(Money::from(999).to_string(), "999₫");
        assert_eq!(Money::zero().to_string(), "0₫");
        assert_eq!(Money::from(-25_000).to_string(), "-25.000₫");
    }

    #[test]
    fn test_money_from_json_number() {
        let m: Money = serde_json::from_str("250000.0").unwrap();
        assert_eq!(m.add(&Money::from(30_000)).amount(), Decimal::new(280_000, 0));
    }
}
