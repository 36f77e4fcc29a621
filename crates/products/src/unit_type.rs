use serde::{Deserialize, Serialize};

use almacen_core::{DomainResult, Entity, UnitTypeId, require_text};

/// Unit of measure a product is sold in ("kg", "unidad", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
}

impl Entity for UnitType {
    type Id = UnitTypeId;

    fn id(&self) -> UnitTypeId {
        self.id
    }
}

/// Validated name for a unit type about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnitType {
    pub name: String,
}

impl NewUnitType {
    pub fn new(name: &str) -> DomainResult<Self> {
        Ok(Self {
            name: require_text("name", name, 100)?,
        })
    }
}
