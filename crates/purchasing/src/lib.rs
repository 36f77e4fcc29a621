//! Purchasing domain module (purchase orders).
//!
//! Purchase headers and lines plus the validated request that creates them.
//! Pure domain logic; the transactional flow lives in `almacen-infra`.

pub mod order;

pub use order::{NewPurchase, Purchase, PurchaseDraft, PurchaseLine};
