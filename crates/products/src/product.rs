use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use almacen_core::{
    DomainError, DomainResult, Entity, Money, ProductId, UnitTypeId, optional_text, require_text,
};

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 2000;
const IMAGE_MAX: usize = 255;

/// Editable attributes of a product.
///
/// Stock is deliberately absent: it only changes through stock adjustments
/// recorded by purchases and sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub description: Option<String>,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub unit_type_id: Option<UnitTypeId>,
    pub active: bool,
    pub image: Option<String>,
}

/// A catalog product as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    details: ProductDetails,
    stock: i64,
    registered_at: DateTime<Utc>,
}

impl Product {
    /// Rebuild a product from stored values.
    pub fn hydrate(
        id: ProductId,
        details: ProductDetails,
        stock: i64,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            details,
            stock,
            registered_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn is_active(&self) -> bool {
        self.details.active
    }

    /// Copy of this product with its editable attributes replaced; stock and
    /// registration time are preserved.
    pub fn with_details(&self, details: ProductDetails) -> Self {
        Self {
            details,
            ..self.clone()
        }
    }

    /// Copy of this product carrying a stock level computed by the ledger.
    pub fn with_stock(&self, stock: i64) -> Self {
        Self {
            stock,
            ..self.clone()
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

/// Unvalidated product attributes as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub purchase_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub unit_type_id: Option<UnitTypeId>,
    pub active: Option<bool>,
    pub image: Option<String>,
}

impl ProductInput {
    /// Validate into [`ProductDetails`]. Missing prices default to zero and a
    /// missing active flag to `true`.
    pub fn validate(self) -> DomainResult<ProductDetails> {
        let name = require_text("name", &self.name, NAME_MAX)?;
        let description = optional_text("description", self.description.as_deref(), DESCRIPTION_MAX)?;
        let image = optional_text("image", self.image.as_deref(), IMAGE_MAX)?;
        if let Some(unit) = self.unit_type_id {
            if unit.get() <= 0 {
                return Err(DomainError::invalid_id(format!(
                    "unit type id must be positive, got {unit}"
                )));
            }
        }
        Ok(ProductDetails {
            name,
            description,
            purchase_price: self.purchase_price.unwrap_or(Money::ZERO),
            sale_price: self.sale_price.unwrap_or(Money::ZERO),
            unit_type_id: self.unit_type_id,
            active: self.active.unwrap_or(true),
            image,
        })
    }
}

/// A validated product ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub details: ProductDetails,
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn new(input: ProductInput, initial_stock: Option<i64>) -> DomainResult<Self> {
        let initial_stock = initial_stock.unwrap_or(0);
        if initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        Ok(Self {
            details: input.validate()?,
            initial_stock,
        })
    }
}
