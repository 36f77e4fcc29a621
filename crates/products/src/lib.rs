//! Products domain module.
//!
//! Catalog records (products and their unit types) and the validated commands
//! that create or change them. Pure domain logic: no IO, no HTTP, no storage.

pub mod product;
pub mod unit_type;

pub use product::{NewProduct, Product, ProductDetails, ProductInput};
pub use unit_type::{NewUnitType, UnitType};
