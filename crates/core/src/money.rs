//! Fixed-point monetary amounts (two fractional digits).

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative amount with at most two decimal places, capped at
/// [`Money::MAX`].
///
/// Prices are snapshotted into order lines as `Money`, and order totals are
/// computed with checked decimal arithmetic, never floats. On the wire an
/// amount is a JSON number (`12.5`); strings (`"12.50"`) are accepted too.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits kept.
    pub const SCALE: u32 = 2;

    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest storable amount, 99 999 999.99 (a `NUMERIC(10,2)` column).
    pub const MAX: Money = Money(Decimal::from_parts(1_410_065_407, 2, 0, false, 2));

    /// Validate and wrap a decimal amount.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        let mut normalized = amount.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(DomainError::validation(format!(
                "amount cannot have more than {} decimal places",
                Self::SCALE
            )));
        }
        normalized.rescale(Self::SCALE);
        if normalized > Self::MAX.0 {
            return Err(DomainError::validation(format!("amount cannot exceed {}", Self::MAX)));
        }
        Ok(Self(normalized))
    }

    /// Parse a textual amount such as `"2.50"`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Self::new(amount)
    }

    /// Build an amount from integer cents.
    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        Self::new(Decimal::new(cents, Self::SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self × quantity`, e.g. a line total. Derived amounts are not capped
    /// at [`Money::MAX`]; they are computed, never stored.
    pub fn times(self, quantity: i64) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    pub fn checked_add(self, other: Self) -> DomainResult<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Sum amounts with overflow checking.
    pub fn sum<I>(amounts: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Lossy conversion for JSON output.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::MAX)
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("a non-negative amount with at most two decimal places")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Money::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        // Shortest round-trip text of the float, so 2.5 stays 2.5 rather than
        // its binary expansion.
        Money::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }
}
