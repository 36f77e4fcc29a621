//! Sales domain module (sale orders).
//!
//! Sale headers and lines plus the validated request that creates them.
//! Pure domain logic; the transactional flow lives in `almacen-infra`.

pub mod order;

pub use order::{NewSale, Sale, SaleDraft, SaleLine};
