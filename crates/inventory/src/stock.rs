use core::str::FromStr;

use serde::{Deserialize, Serialize};

use almacen_core::{DomainError, DomainResult, ProductId};

/// Whether stock is allowed to drop below zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Overselling is recorded as negative stock.
    #[default]
    AllowNegative,
    /// A delta that would leave stock below zero is refused.
    RejectNegative,
}

impl StockPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StockPolicy::AllowNegative => "allow_negative",
            StockPolicy::RejectNegative => "reject_negative",
        }
    }
}

impl FromStr for StockPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_negative" => Ok(StockPolicy::AllowNegative),
            "reject_negative" => Ok(StockPolicy::RejectNegative),
            other => Err(DomainError::validation(format!(
                "unknown stock policy '{other}' (expected allow_negative or reject_negative)"
            ))),
        }
    }
}

impl core::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed stock adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockDelta(i64);

impl StockDelta {
    /// Goods received from a supplier.
    pub fn receipt(quantity: i64) -> Self {
        Self(quantity)
    }

    /// Goods handed to a client.
    pub fn issue(quantity: i64) -> Self {
        Self(quantity.saturating_neg())
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// Outcome of an accepted adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub before: i64,
    pub delta: StockDelta,
    pub after: i64,
}

impl StockMovement {
    /// True when this movement took stock from non-negative to negative.
    pub fn went_negative(&self) -> bool {
        self.after < 0 && self.before >= 0
    }
}

/// Compute the stock level after applying `delta` to `current`.
pub fn plan_adjustment(
    product_id: ProductId,
    current: i64,
    delta: StockDelta,
    policy: StockPolicy,
) -> DomainResult<StockMovement> {
    if delta.get() == 0 {
        return Err(DomainError::validation("delta cannot be zero"));
    }

    let after = current
        .checked_add(delta.get())
        .ok_or_else(|| DomainError::invariant(format!("stock overflow for product {product_id}")))?;

    if after < 0 && policy == StockPolicy::RejectNegative {
        return Err(DomainError::invariant(format!(
            "stock cannot go negative: product {product_id} has {current}, requested {}",
            -delta.get()
        )));
    }

    Ok(StockMovement {
        product_id,
        before: current,
        delta,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const P: ProductId = ProductId::new(1);

    #[test]
    fn receipt_increases_and_issue_decreases() {
        let m = plan_adjustment(P, 10, StockDelta::receipt(5), StockPolicy::default()).unwrap();
        assert_eq!(m.after, 15);
        let m = plan_adjustment(P, 10, StockDelta::issue(3), StockPolicy::default()).unwrap();
        assert_eq!(m.after, 7);
    }

    #[test]
    fn zero_delta_is_rejected() {
        assert!(matches!(
            plan_adjustment(P, 10, StockDelta::receipt(0), StockPolicy::AllowNegative),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn oversell_depends_on_policy() {
        let allowed = plan_adjustment(P, 2, StockDelta::issue(5), StockPolicy::AllowNegative).unwrap();
        assert_eq!(allowed.after, -3);
        assert!(allowed.went_negative());

        let refused = plan_adjustment(P, 2, StockDelta::issue(5), StockPolicy::RejectNegative);
        assert!(matches!(refused, Err(DomainError::InvariantViolation(msg)) if msg.contains("negative")));
    }

    #[test]
    fn overflow_is_an_invariant_error() {
        assert!(matches!(
            plan_adjustment(P, i64::MAX, StockDelta::receipt(1), StockPolicy::AllowNegative),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("reject_negative".parse::<StockPolicy>().unwrap(), StockPolicy::RejectNegative);
        assert_eq!(" Allow_Negative ".parse::<StockPolicy>().unwrap(), StockPolicy::AllowNegative);
        assert!("strict".parse::<StockPolicy>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 1000,
            ..ProptestConfig::default()
        })]

        /// Under the rejecting policy stock never ends below zero, and an
        /// accepted movement always equals before + delta.
        #[test]
        fn reject_negative_keeps_floor(
            start in 0i64..10_000,
            ops in proptest::collection::vec((any::<bool>(), 1i64..500), 1..40)
        ) {
            let mut stock = start;
            for (is_receipt, q) in ops {
                let delta = if is_receipt { StockDelta::receipt(q) } else { StockDelta::issue(q) };
                match plan_adjustment(P, stock, delta, StockPolicy::RejectNegative) {
                    Ok(m) => {
                        prop_assert_eq!(m.after, stock + delta.get());
                        prop_assert!(m.after >= 0);
                        stock = m.after;
                    }
                    Err(_) => prop_assert!(stock + delta.get() < 0),
                }
            }
        }

        /// Under the permissive policy the final stock is start + Σ deltas.
        #[test]
        fn allow_negative_is_plain_sum(
            start in -1_000i64..1_000,
            ops in proptest::collection::vec((any::<bool>(), 1i64..500), 1..40)
        ) {
            let mut stock = start;
            let mut expected = start;
            for (is_receipt, q) in ops {
                let delta = if is_receipt { StockDelta::receipt(q) } else { StockDelta::issue(q) };
                expected += delta.get();
                stock = plan_adjustment(P, stock, delta, StockPolicy::AllowNegative).unwrap().after;
            }
            prop_assert_eq!(stock, expected);
        }
    }
}
