//! Order numbering.
//!
//! The authoritative number is `max(numeric order numbers of the kind) + 1`,
//! computed inside the caller's unit of work after taking the per-kind
//! sequence lock. Legacy non-numeric values are skipped.

use serde::Serialize;

use almacen_core::{DomainError, OrderKind, OrderNumber};

use crate::error::ServiceResult;
use crate::store::OrderRepository;

/// Non-binding "next number" answer for clients that want to display it
/// before submitting an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderNumberPreview {
    pub kind: OrderKind,
    /// What the sequencer would allocate right now.
    pub next: OrderNumber,
    /// `max(header id) + 1`, kept for clients that used to derive numbers
    /// from ids.
    pub id_estimate: OrderNumber,
    /// Always `true`: a concurrent order may take `next` first.
    pub provisional: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderSequencer;

impl OrderSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Allocate the next number for `kind`.
    ///
    /// Holds the sequence lock until `repo`'s unit of work ends, so the
    /// header carrying this number must be inserted in that same unit of work.
    pub async fn next_order_number<R>(&self, repo: &mut R, kind: OrderKind) -> ServiceResult<OrderNumber>
    where
        R: OrderRepository + ?Sized,
    {
        repo.lock_order_sequence(kind).await?;
        let max = repo.max_numeric_order_number(kind).await?;
        let next = OrderNumber::following(max)?;
        tracing::debug!(%kind, order_number = %next, "allocated order number");
        Ok(next)
    }

    /// Preview the next number without reserving it.
    pub async fn preview_next<R>(&self, repo: &mut R, kind: OrderKind) -> ServiceResult<OrderNumberPreview>
    where
        R: OrderRepository + ?Sized,
    {
        let next = OrderNumber::following(repo.max_numeric_order_number(kind).await?)?;
        let id_estimate = match repo.max_order_id(kind).await? {
            None => OrderNumber::first(),
            Some(id) => {
                let next_id = u64::try_from(id)
                    .ok()
                    .and_then(|id| id.checked_add(1))
                    .ok_or_else(|| DomainError::invariant(format!("{kind} id {id} out of range")))?;
                OrderNumber::from_sequence(next_id)?
            }
        };
        Ok(OrderNumberPreview {
            kind,
            next,
            id_estimate,
            provisional: true,
        })
    }
}
