//! Inventory domain module (stock ledger rules).
//!
//! Stock levels change only through signed deltas produced by purchase and
//! sale lines. This crate decides whether a delta may be applied; storing the
//! result is the caller's job.

pub mod stock;

pub use stock::{StockDelta, StockMovement, StockPolicy, plan_adjustment};
