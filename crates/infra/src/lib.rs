//! Infrastructure layer: stores, order orchestration, services and config.

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod sequencer;
pub mod store;

pub use accounts::{AccessToken, AccountService};
pub use catalog::{CatalogService, SupplierWithProducts};
pub use config::{AppConfig, ConfigError, StoreConfig};
pub use error::{ServiceError, ServiceResult};
pub use ledger::StockLedger;
pub use orders::{
    OrderLineView, OrderReceipt, OrderService, PartySummary, PurchaseDetail, SaleDetail, SellerSummary,
};
pub use sequencer::{OrderNumberPreview, OrderSequencer};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
