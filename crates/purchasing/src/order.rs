use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almacen_core::{
    DomainError, DomainResult, Entity, LineId, LineItem, Money, OrderNumber, ProductId,
    PurchaseId, SupplierId, lines_total, validate_lines,
};

/// Purchase order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub supplier_id: SupplierId,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> PurchaseId {
        self.id
    }
}

/// One stored purchase line. `unit_price` is the price agreed at purchase
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub id: LineId,
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PurchaseLine {
    pub fn total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Header values for a purchase about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub supplier_id: SupplierId,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
}

/// Request to record a purchase from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier_id: SupplierId,
    pub lines: Vec<LineItem>,
}

impl NewPurchase {
    /// Shape checks that need no storage access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.supplier_id.get() <= 0 {
            return Err(DomainError::invalid_id(format!(
                "supplier id must be positive, got {}",
                self.supplier_id
            )));
        }
        validate_lines(&self.lines)
    }

    pub fn total(&self) -> DomainResult<Money> {
        lines_total(&self.lines)
    }
}
