//! Stock ledger: the only writer of product stock levels.

use almacen_core::{EntityKind, ProductId};
use almacen_inventory::{StockDelta, StockMovement, StockPolicy, plan_adjustment};

use crate::error::{ServiceError, ServiceResult};
use crate::store::CatalogRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger {
    policy: StockPolicy,
}

impl StockLedger {
    pub fn new(policy: StockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    /// Stage `delta` against the product's stock in `repo`'s unit of work.
    /// Nothing is visible to others until that unit of work commits.
    ///
    /// The store adds the delta to whatever is stored, and the policy is
    /// checked against the level actually written. On error the staged write
    /// is still in the unit of work; the caller must roll it back.
    pub async fn apply_delta<R>(
        &self,
        repo: &mut R,
        product_id: ProductId,
        delta: StockDelta,
    ) -> ServiceResult<StockMovement>
    where
        R: CatalogRepository + ?Sized,
    {
        if delta.get() == 0 {
            return Err(ServiceError::validation("delta cannot be zero"));
        }
        let after = repo
            .adjust_product_stock(product_id, delta.get())
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Product, product_id))?;
        let before = after
            .checked_sub(delta.get())
            .ok_or_else(|| ServiceError::Invariant(format!("stock overflow for product {product_id}")))?;

        let movement = plan_adjustment(product_id, before, delta, self.policy)?;

        if movement.went_negative() {
            tracing::warn!(
                product_id = %product_id,
                before = movement.before,
                after = movement.after,
                "stock went negative"
            );
        }
        tracing::debug!(
            product_id = %product_id,
            delta = delta.get(),
            after = movement.after,
            "stock delta staged"
        );
        Ok(movement)
    }
}
