use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almacen_core::{
    ClientId, DomainError, DomainResult, Entity, LineId, LineItem, Money, OrderNumber, ProductId,
    SaleId, UserId, lines_total, validate_lines,
};

/// Sale order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub client_id: ClientId,
    pub seller_id: Option<UserId>,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> SaleId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: LineId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl SaleLine {
    pub fn total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Header values for a sale about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    pub client_id: ClientId,
    pub seller_id: Option<UserId>,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
}

/// Request to record a sale to a client.
///
/// `seller_id` is optional; callers usually fill it with the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub client_id: ClientId,
    pub seller_id: Option<UserId>,
    pub lines: Vec<LineItem>,
}

impl NewSale {
    pub fn validate(&self) -> DomainResult<()> {
        if self.client_id.get() <= 0 {
            return Err(DomainError::invalid_id(format!(
                "client id must be positive, got {}",
                self.client_id
            )));
        }
        if let Some(seller) = self.seller_id {
            if seller.get() <= 0 {
                return Err(DomainError::invalid_id(format!(
                    "seller id must be positive, got {seller}"
                )));
            }
        }
        validate_lines(&self.lines)
    }

    pub fn total(&self) -> DomainResult<Money> {
        lines_total(&self.lines)
    }
}
