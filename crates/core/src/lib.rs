//! `almacen-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, money, order numbering and the shared error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod order;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, EntityKind, optional_text, require_email, require_text};
pub use id::{ClientId, LineId, ProductId, PurchaseId, SaleId, SupplierId, UnitTypeId, UserId};
pub use money::Money;
pub use order::{LineItem, OrderKind, OrderNumber, lines_total, validate_lines};
pub use value_object::ValueObject;
