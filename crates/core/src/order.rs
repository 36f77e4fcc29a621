//! Building blocks shared by purchase and sale orders.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::ProductId;
use crate::money::Money;
use crate::value_object::ValueObject;

/// Which numbering sequence an order belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Purchase,
    Sale,
}

impl OrderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderKind::Purchase => "purchase",
            OrderKind::Sale => "sale",
        }
    }
}

impl core::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatted order number, e.g. `"0000042"`.
///
/// Numbers minted by the sequencer are zero-padded to [`OrderNumber::WIDTH`]
/// digits. Rows loaded from storage are kept verbatim even if they are not
/// numeric, so legacy data can still be read; such values are simply ignored
/// when computing the next number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Minimum number of digits in a formatted order number.
    pub const WIDTH: usize = 7;

    /// Format a sequence value.
    pub fn from_sequence(value: u64) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::validation("order sequence starts at 1"));
        }
        Ok(Self(format!("{:0width$}", value, width = Self::WIDTH)))
    }

    /// Wrap a value read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The first number of an empty sequence.
    pub fn first() -> Self {
        Self(format!("{:0width$}", 1, width = Self::WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer value, when the stored text is purely ASCII digits.
    pub fn numeric_value(&self) -> Option<u64> {
        parse_numeric(&self.0)
    }

    /// Number following the largest numeric value among `existing`.
    ///
    /// Non-numeric entries are skipped; an empty (or all non-numeric) set
    /// yields the first number.
    pub fn next_after<'a, I>(existing: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a OrderNumber>,
    {
        let max = existing.into_iter().filter_map(|n| n.numeric_value()).max();
        Self::following(max)
    }

    /// Number following a known maximum (`None` when no numeric order exists).
    pub fn following(max: Option<u64>) -> DomainResult<Self> {
        match max {
            None => Ok(Self::first()),
            Some(n) => {
                let next = n
                    .checked_add(1)
                    .ok_or_else(|| DomainError::invariant("order number sequence exhausted"))?;
                Self::from_sequence(next)
            }
        }
    }
}

impl ValueObject for OrderNumber {}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an order number's digits, rejecting signs, spaces and empty input.
pub fn parse_numeric(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// One requested line of a purchase or sale.
///
/// The unit price is the price agreed for this order; it is copied into the
/// stored line and never re-read from the product afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.product_id.get() <= 0 {
            return Err(DomainError::invalid_id(format!(
                "product id must be positive, got {}",
                self.product_id
            )));
        }
        Ok(())
    }

    pub fn total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Validate an order's requested lines; errors name the 1-based line number.
pub fn validate_lines(lines: &[LineItem]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("order must contain at least one line"));
    }
    for (idx, line) in lines.iter().enumerate() {
        line.validate().map_err(|e| match e {
            DomainError::Validation(msg) => {
                DomainError::validation(format!("line {}: {msg}", idx + 1))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Σ quantity × unit price.
pub fn lines_total(lines: &[LineItem]) -> DomainResult<Money> {
    lines
        .iter()
        .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.total()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn num(s: &str) -> OrderNumber {
        OrderNumber::from_stored(s)
    }

    #[test]
    fn first_number_is_one_zero_padded() {
        let none: Vec<OrderNumber> = Vec::new();
        assert_eq!(OrderNumber::next_after(&none).unwrap().as_str(), "0000001");
    }

    #[test]
    fn next_after_takes_numeric_max_plus_one() {
        let existing = vec![num("0000003"), num("0000041"), num("0000007")];
        assert_eq!(OrderNumber::next_after(&existing).unwrap().as_str(), "0000042");
    }

    #[test]
    fn non_numeric_values_are_skipped() {
        let existing = vec![num("A-17"), num("0000005"), num(""), num(" 12")];
        assert_eq!(OrderNumber::next_after(&existing).unwrap().as_str(), "0000006");

        let only_legacy = vec![num("LEGACY")];
        assert_eq!(OrderNumber::next_after(&only_legacy).unwrap().as_str(), "0000001");
    }

    #[test]
    fn numeric_max_beats_lexicographic_max() {
        // "9999999" sorts after "10000000" as text; the sequence must not.
        let existing = vec![num("9999999"), num("10000000")];
        assert_eq!(OrderNumber::next_after(&existing).unwrap().as_str(), "10000001");
    }

    #[test]
    fn exhausted_sequence_is_an_invariant_error() {
        assert!(matches!(
            OrderNumber::following(Some(u64::MAX)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn validate_lines_reports_line_number() {
        let lines = vec![
            LineItem::new(ProductId::new(1), 2, Money::from_cents(1000).unwrap()),
            LineItem::new(ProductId::new(2), 0, Money::from_cents(500).unwrap()),
        ];
        assert!(matches!(
            validate_lines(&lines),
            Err(DomainError::Validation(msg)) if msg == "line 2: quantity must be positive"
        ));
        assert!(validate_lines(&[]).is_err());
    }

    #[test]
    fn lines_total_sums_quantity_times_price() {
        let lines = vec![
            LineItem::new(ProductId::new(1), 5, Money::parse("2.50").unwrap()),
            LineItem::new(ProductId::new(2), 3, Money::parse("0.99").unwrap()),
        ];
        assert_eq!(lines_total(&lines).unwrap(), Money::parse("15.47").unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 500,
            ..ProptestConfig::default()
        })]

        /// Minting repeatedly from the growing set yields strictly increasing,
        /// unique, at-least-7-digit numbers.
        #[test]
        fn sequence_is_strictly_increasing(start in 0u64..5_000_000, rounds in 1usize..50) {
            let mut existing = Vec::new();
            if start > 0 {
                existing.push(OrderNumber::from_sequence(start).unwrap());
            }
            let mut last = start;
            for _ in 0..rounds {
                let next = OrderNumber::next_after(&existing).unwrap();
                let value = next.numeric_value().unwrap();
                prop_assert_eq!(value, last + 1);
                prop_assert!(next.as_str().len() >= OrderNumber::WIDTH);
                prop_assert!(!existing.contains(&next));
                last = value;
                existing.push(next);
            }
        }
    }
}
