//! Entity store: repositories grouped behind an explicit unit of work.
//!
//! Every read or write goes through a [`UnitOfWork`] obtained from an injected
//! [`Store`]. Staged writes become visible to other units of work only on
//! [`UnitOfWork::commit`]; dropping a unit of work without committing discards
//! them.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use almacen_auth::{NewUser, User, UserProfile};
use almacen_core::{
    ClientId, EntityKind, LineItem, OrderKind, ProductId, PurchaseId, SaleId, SupplierId,
    UnitTypeId, UserId,
};
use almacen_parties::{Client, ClientDetails, Supplier, SupplierDetails, SupplierProductLink};
use almacen_products::{NewProduct, NewUnitType, Product, ProductDetails, UnitType};
use almacen_purchasing::{Purchase, PurchaseDraft, PurchaseLine};
use almacen_sales::{Sale, SaleDraft, SaleLine};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row the operation depends on does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A value does not fit its column or integer range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The backend failed (connection, SQL, decoding).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn not_found(entity: EntityKind, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Products, unit types and the supplier↔product relation.
#[async_trait]
pub trait CatalogRepository: Send {
    async fn list_products(&mut self) -> StoreResult<Vec<Product>>;
    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;
    async fn insert_product(&mut self, product: &NewProduct) -> StoreResult<Product>;
    /// Replace editable attributes; stock is left untouched.
    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> StoreResult<Option<Product>>;
    /// Add `delta` to the stored stock level and return the new level, or
    /// `None` when the product does not exist. The adjustment is relative and
    /// holds the product row until the unit of work ends. Only the stock
    /// ledger calls this.
    async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Option<i64>>;
    async fn list_products_by_supplier(&mut self, supplier: SupplierId) -> StoreResult<Vec<Product>>;

    async fn list_unit_types(&mut self) -> StoreResult<Vec<UnitType>>;
    async fn find_unit_type(&mut self, id: UnitTypeId) -> StoreResult<Option<UnitType>>;
    async fn insert_unit_type(&mut self, unit: &NewUnitType) -> StoreResult<UnitType>;
    /// Returns `false` when nothing was deleted. Products referencing the unit
    /// lose the reference.
    async fn delete_unit_type(&mut self, id: UnitTypeId) -> StoreResult<bool>;
}

/// Suppliers and clients.
#[async_trait]
pub trait PartyRepository: Send {
    async fn list_suppliers(&mut self) -> StoreResult<Vec<Supplier>>;
    async fn find_supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>>;
    async fn insert_supplier(&mut self, details: &SupplierDetails) -> StoreResult<Supplier>;
    async fn update_supplier(
        &mut self,
        id: SupplierId,
        details: &SupplierDetails,
    ) -> StoreResult<Option<Supplier>>;
    /// Idempotent.
    async fn link_supplier_product(&mut self, link: SupplierProductLink) -> StoreResult<()>;
    /// Make `suppliers` the complete supplier set of a product.
    async fn replace_product_suppliers(
        &mut self,
        product: ProductId,
        suppliers: &[SupplierId],
    ) -> StoreResult<()>;

    async fn list_clients(&mut self) -> StoreResult<Vec<Client>>;
    async fn find_client(&mut self, id: ClientId) -> StoreResult<Option<Client>>;
    async fn insert_client(&mut self, details: &ClientDetails) -> StoreResult<Client>;
    async fn update_client(
        &mut self,
        id: ClientId,
        details: &ClientDetails,
    ) -> StoreResult<Option<Client>>;
}

/// Purchase and sale headers with their lines.
#[async_trait]
pub trait OrderRepository: Send {
    /// Serialize order numbering for `kind` until this unit of work ends.
    async fn lock_order_sequence(&mut self, kind: OrderKind) -> StoreResult<()>;
    /// Largest purely numeric order number of `kind`, if any.
    async fn max_numeric_order_number(&mut self, kind: OrderKind) -> StoreResult<Option<u64>>;
    /// Largest header id of `kind`, if any.
    async fn max_order_id(&mut self, kind: OrderKind) -> StoreResult<Option<i64>>;

    async fn insert_purchase(&mut self, draft: &PurchaseDraft) -> StoreResult<Purchase>;
    async fn insert_purchase_line(
        &mut self,
        purchase: PurchaseId,
        line: &LineItem,
    ) -> StoreResult<PurchaseLine>;
    async fn list_purchases(&mut self) -> StoreResult<Vec<Purchase>>;
    async fn find_purchase(&mut self, id: PurchaseId) -> StoreResult<Option<Purchase>>;
    async fn purchase_lines(&mut self, id: PurchaseId) -> StoreResult<Vec<PurchaseLine>>;

    async fn insert_sale(&mut self, draft: &SaleDraft) -> StoreResult<Sale>;
    async fn insert_sale_line(&mut self, sale: SaleId, line: &LineItem) -> StoreResult<SaleLine>;
    async fn list_sales(&mut self) -> StoreResult<Vec<Sale>>;
    async fn find_sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>>;
    async fn sale_lines(&mut self, id: SaleId) -> StoreResult<Vec<SaleLine>>;
}

/// User accounts.
#[async_trait]
pub trait UserRepository: Send {
    async fn list_users(&mut self) -> StoreResult<Vec<User>>;
    async fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User>;
    /// Replace the profile and, when given, the password hash.
    async fn update_user(
        &mut self,
        id: UserId,
        profile: &UserProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<Option<User>>;
    async fn set_user_active(&mut self, id: UserId, active: bool) -> StoreResult<Option<User>>;
    /// Sales recorded by the user keep their rows but lose the seller reference.
    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool>;
}

/// One atomic batch of reads and writes.
#[async_trait]
pub trait UnitOfWork:
    CatalogRepository + PartyRepository + OrderRepository + UserRepository + Send
{
    /// Make every staged write durable and visible.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every staged write.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Factory for units of work; shared across requests.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for diagnostics ("memory", "postgres").
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        (**self).begin().await
    }

    async fn ping(&self) -> StoreResult<()> {
        (**self).ping().await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// Finish a writing unit of work: commit on success, roll back on error.
pub async fn commit_or_rollback<T, E>(uow: Box<dyn UnitOfWork>, result: Result<T, E>) -> Result<T, E>
where
    E: From<StoreError>,
{
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Finish a read-only unit of work.
pub async fn release<T, E>(uow: Box<dyn UnitOfWork>, result: Result<T, E>) -> Result<T, E> {
    if let Err(rollback_err) = uow.rollback().await {
        tracing::warn!(error = %rollback_err, "failed to release read-only unit of work");
    }
    result
}
