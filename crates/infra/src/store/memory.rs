//! In-memory store for development and tests.
//!
//! A unit of work holds the store's async mutex for its whole lifetime and
//! mutates a private copy of the tables. Commit swaps the copy in; dropping
//! the unit of work throws it away. Writers are therefore fully serialized,
//! which also makes read-max-then-insert order numbering race free.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use almacen_auth::{NewUser, User, UserProfile};
use almacen_core::{
    ClientId, EntityKind, LineId, LineItem, OrderKind, OrderNumber, ProductId, PurchaseId, SaleId,
    SupplierId, UnitTypeId, UserId,
};
use almacen_parties::{Client, ClientDetails, Supplier, SupplierDetails, SupplierProductLink};
use almacen_products::{NewProduct, NewUnitType, Product, ProductDetails, UnitType};
use almacen_purchasing::{Purchase, PurchaseDraft, PurchaseLine};
use almacen_sales::{Sale, SaleDraft, SaleLine};

use super::{
    CatalogRepository, OrderRepository, PartyRepository, Store, StoreError, StoreResult,
    UnitOfWork, UserRepository,
};

/// Last id handed out per table.
#[derive(Debug, Clone, Default)]
struct Sequences {
    product: i64,
    unit_type: i64,
    supplier: i64,
    client: i64,
    user: i64,
    purchase: i64,
    purchase_line: i64,
    sale: i64,
    sale_line: i64,
}

fn bump(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct Tables {
    seq: Sequences,
    products: BTreeMap<ProductId, Product>,
    unit_types: BTreeMap<UnitTypeId, UnitType>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    supplier_products: BTreeSet<(SupplierId, ProductId)>,
    clients: BTreeMap<ClientId, Client>,
    users: BTreeMap<UserId, User>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    purchase_lines: BTreeMap<LineId, PurchaseLine>,
    sales: BTreeMap<SaleId, Sale>,
    sale_lines: BTreeMap<LineId, SaleLine>,
}

impl Tables {
    fn order_numbers(&self, kind: OrderKind) -> Vec<&OrderNumber> {
        match kind {
            OrderKind::Purchase => self.purchases.values().map(|p| &p.order_number).collect(),
            OrderKind::Sale => self.sales.values().map(|s| &s.order_number).collect(),
        }
    }
}

/// Shared in-memory store. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, staged }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Exclusive unit of work over [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryUnitOfWork {
    async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
        Ok(self.staged.products.values().cloned().collect())
    }

    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &NewProduct) -> StoreResult<Product> {
        if let Some(unit) = product.details.unit_type_id {
            if !self.staged.unit_types.contains_key(&unit) {
                return Err(StoreError::not_found(EntityKind::UnitType, unit));
            }
        }
        let id = ProductId::new(bump(&mut self.staged.seq.product));
        let stored = Product::hydrate(id, product.details.clone(), product.initial_stock, Utc::now());
        self.staged.products.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> StoreResult<Option<Product>> {
        if let Some(unit) = details.unit_type_id {
            if !self.staged.unit_types.contains_key(&unit) {
                return Err(StoreError::not_found(EntityKind::UnitType, unit));
            }
        }
        let Some(current) = self.staged.products.get_mut(&id) else {
            return Ok(None);
        };
        *current = current.with_details(details.clone());
        Ok(Some(current.clone()))
    }

    async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Option<i64>> {
        let Some(current) = self.staged.products.get_mut(&id) else {
            return Ok(None);
        };
        let stock = current
            .stock()
            .checked_add(delta)
            .ok_or_else(|| StoreError::OutOfRange(format!("stock overflow for product {id}")))?;
        *current = current.with_stock(stock);
        Ok(Some(stock))
    }

    async fn list_products_by_supplier(&mut self, supplier: SupplierId) -> StoreResult<Vec<Product>> {
        let tables = &self.staged;
        Ok(tables
            .supplier_products
            .iter()
            .filter(|(s, _)| *s == supplier)
            .filter_map(|(_, p)| tables.products.get(p).cloned())
            .collect())
    }

    async fn list_unit_types(&mut self) -> StoreResult<Vec<UnitType>> {
        Ok(self.staged.unit_types.values().cloned().collect())
    }

    async fn find_unit_type(&mut self, id: UnitTypeId) -> StoreResult<Option<UnitType>> {
        Ok(self.staged.unit_types.get(&id).cloned())
    }

    async fn insert_unit_type(&mut self, unit: &NewUnitType) -> StoreResult<UnitType> {
        let id = UnitTypeId::new(bump(&mut self.staged.seq.unit_type));
        let stored = UnitType {
            id,
            name: unit.name.clone(),
        };
        self.staged.unit_types.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_unit_type(&mut self, id: UnitTypeId) -> StoreResult<bool> {
        if self.staged.unit_types.remove(&id).is_none() {
            return Ok(false);
        }
        for product in self.staged.products.values_mut() {
            if product.details().unit_type_id == Some(id) {
                let mut details = product.details().clone();
                details.unit_type_id = None;
                *product = product.with_details(details);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl PartyRepository for InMemoryUnitOfWork {
    async fn list_suppliers(&mut self) -> StoreResult<Vec<Supplier>> {
        Ok(self.staged.suppliers.values().cloned().collect())
    }

    async fn find_supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        Ok(self.staged.suppliers.get(&id).cloned())
    }

    async fn insert_supplier(&mut self, details: &SupplierDetails) -> StoreResult<Supplier> {
        let id = SupplierId::new(bump(&mut self.staged.seq.supplier));
        let stored = Supplier {
            id,
            details: details.clone(),
        };
        self.staged.suppliers.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_supplier(
        &mut self,
        id: SupplierId,
        details: &SupplierDetails,
    ) -> StoreResult<Option<Supplier>> {
        Ok(self.staged.suppliers.get_mut(&id).map(|s| {
            s.details = details.clone();
            s.clone()
        }))
    }

    async fn link_supplier_product(&mut self, link: SupplierProductLink) -> StoreResult<()> {
        if !self.staged.suppliers.contains_key(&link.supplier_id) {
            return Err(StoreError::not_found(EntityKind::Supplier, link.supplier_id));
        }
        if !self.staged.products.contains_key(&link.product_id) {
            return Err(StoreError::not_found(EntityKind::Product, link.product_id));
        }
        self.staged
            .supplier_products
            .insert((link.supplier_id, link.product_id));
        Ok(())
    }

    async fn replace_product_suppliers(
        &mut self,
        product: ProductId,
        suppliers: &[SupplierId],
    ) -> StoreResult<()> {
        self.staged.supplier_products.retain(|(_, p)| *p != product);
        for supplier in suppliers {
            self.link_supplier_product(SupplierProductLink {
                supplier_id: *supplier,
                product_id: product,
            })
            .await?;
        }
        Ok(())
    }

    async fn list_clients(&mut self) -> StoreResult<Vec<Client>> {
        Ok(self.staged.clients.values().cloned().collect())
    }

    async fn find_client(&mut self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(self.staged.clients.get(&id).cloned())
    }

    async fn insert_client(&mut self, details: &ClientDetails) -> StoreResult<Client> {
        let id = ClientId::new(bump(&mut self.staged.seq.client));
        let stored = Client {
            id,
            details: details.clone(),
        };
        self.staged.clients.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_client(
        &mut self,
        id: ClientId,
        details: &ClientDetails,
    ) -> StoreResult<Option<Client>> {
        Ok(self.staged.clients.get_mut(&id).map(|c| {
            c.details = details.clone();
            c.clone()
        }))
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnitOfWork {
    async fn lock_order_sequence(&mut self, _kind: OrderKind) -> StoreResult<()> {
        // The unit of work already holds the store-wide lock.
        Ok(())
    }

    async fn max_numeric_order_number(&mut self, kind: OrderKind) -> StoreResult<Option<u64>> {
        Ok(self
            .staged
            .order_numbers(kind)
            .into_iter()
            .filter_map(OrderNumber::numeric_value)
            .max())
    }

    async fn max_order_id(&mut self, kind: OrderKind) -> StoreResult<Option<i64>> {
        Ok(match kind {
            OrderKind::Purchase => self.staged.purchases.keys().next_back().map(|id| id.get()),
            OrderKind::Sale => self.staged.sales.keys().next_back().map(|id| id.get()),
        })
    }

    async fn insert_purchase(&mut self, draft: &PurchaseDraft) -> StoreResult<Purchase> {
        if !self.staged.suppliers.contains_key(&draft.supplier_id) {
            return Err(StoreError::not_found(EntityKind::Supplier, draft.supplier_id));
        }
        if self
            .staged
            .order_numbers(OrderKind::Purchase)
            .contains(&&draft.order_number)
        {
            return Err(StoreError::Conflict(format!(
                "purchase order number {} already exists",
                draft.order_number
            )));
        }
        let id = PurchaseId::new(bump(&mut self.staged.seq.purchase));
        let stored = Purchase {
            id,
            supplier_id: draft.supplier_id,
            order_number: draft.order_number.clone(),
            created_at: draft.created_at,
        };
        self.staged.purchases.insert(id, stored.clone());
        Ok(stored)
    }

    async fn insert_purchase_line(
        &mut self,
        purchase: PurchaseId,
        line: &LineItem,
    ) -> StoreResult<PurchaseLine> {
        if !self.staged.purchases.contains_key(&purchase) {
            return Err(StoreError::not_found(EntityKind::Purchase, purchase));
        }
        if !self.staged.products.contains_key(&line.product_id) {
            return Err(StoreError::not_found(EntityKind::Product, line.product_id));
        }
        let id = LineId::new(bump(&mut self.staged.seq.purchase_line));
        let stored = PurchaseLine {
            id,
            purchase_id: purchase,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        self.staged.purchase_lines.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_purchases(&mut self) -> StoreResult<Vec<Purchase>> {
        Ok(self.staged.purchases.values().cloned().collect())
    }

    async fn find_purchase(&mut self, id: PurchaseId) -> StoreResult<Option<Purchase>> {
        Ok(self.staged.purchases.get(&id).cloned())
    }

    async fn purchase_lines(&mut self, id: PurchaseId) -> StoreResult<Vec<PurchaseLine>> {
        Ok(self
            .staged
            .purchase_lines
            .values()
            .filter(|l| l.purchase_id == id)
            .cloned()
            .collect())
    }

    async fn insert_sale(&mut self, draft: &SaleDraft) -> StoreResult<Sale> {
        if !self.staged.clients.contains_key(&draft.client_id) {
            return Err(StoreError::not_found(EntityKind::Client, draft.client_id));
        }
        if let Some(seller) = draft.seller_id {
            if !self.staged.users.contains_key(&seller) {
                return Err(StoreError::not_found(EntityKind::User, seller));
            }
        }
        if self
            .staged
            .order_numbers(OrderKind::Sale)
            .contains(&&draft.order_number)
        {
            return Err(StoreError::Conflict(format!(
                "sale order number {} already exists",
                draft.order_number
            )));
        }
        let id = SaleId::new(bump(&mut self.staged.seq.sale));
        let stored = Sale {
            id,
            client_id: draft.client_id,
            seller_id: draft.seller_id,
            order_number: draft.order_number.clone(),
            created_at: draft.created_at,
        };
        self.staged.sales.insert(id, stored.clone());
        Ok(stored)
    }

    async fn insert_sale_line(&mut self, sale: SaleId, line: &LineItem) -> StoreResult<SaleLine> {
        if !self.staged.sales.contains_key(&sale) {
            return Err(StoreError::not_found(EntityKind::Sale, sale));
        }
        if !self.staged.products.contains_key(&line.product_id) {
            return Err(StoreError::not_found(EntityKind::Product, line.product_id));
        }
        let id = LineId::new(bump(&mut self.staged.seq.sale_line));
        let stored = SaleLine {
            id,
            sale_id: sale,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        self.staged.sale_lines.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_sales(&mut self) -> StoreResult<Vec<Sale>> {
        Ok(self.staged.sales.values().cloned().collect())
    }

    async fn find_sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>> {
        Ok(self.staged.sales.get(&id).cloned())
    }

    async fn sale_lines(&mut self, id: SaleId) -> StoreResult<Vec<SaleLine>> {
        Ok(self
            .staged
            .sale_lines
            .values()
            .filter(|l| l.sale_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryUnitOfWork {
    async fn list_users(&mut self) -> StoreResult<Vec<User>> {
        Ok(self.staged.users.values().cloned().collect())
    }

    async fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| u.email() == email)
            .cloned())
    }

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        if self
            .staged
            .users
            .values()
            .any(|u| u.email() == user.profile.email)
        {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.profile.email
            )));
        }
        let id = UserId::new(bump(&mut self.staged.seq.user));
        let stored = User {
            id,
            profile: user.profile.clone(),
            password_hash: user.password_hash.clone(),
        };
        self.staged.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_user(
        &mut self,
        id: UserId,
        profile: &UserProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        if self
            .staged
            .users
            .values()
            .any(|u| u.id != id && u.email() == profile.email)
        {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                profile.email
            )));
        }
        Ok(self.staged.users.get_mut(&id).map(|u| {
            u.profile = profile.clone();
            if let Some(hash) = password_hash {
                u.password_hash = hash.to_string();
            }
            u.clone()
        }))
    }

    async fn set_user_active(&mut self, id: UserId, active: bool) -> StoreResult<Option<User>> {
        Ok(self.staged.users.get_mut(&id).map(|u| {
            u.profile.active = active;
            u.clone()
        }))
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        if self.staged.users.remove(&id).is_none() {
            return Ok(false);
        }
        for sale in self.staged.sales.values_mut() {
            if sale.seller_id == Some(id) {
                sale.seller_id = None;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almacen_core::Money;
    use almacen_products::ProductInput;

    fn new_product(name: &str, stock: i64) -> NewProduct {
        NewProduct::new(
            ProductInput {
                name: name.to_string(),
                sale_price: Some(Money::from_cents(500).unwrap()),
                ..ProductInput::default()
            },
            Some(stock),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_product(&new_product("Arroz", 10)).await.unwrap();
        drop(uow);

        let mut uow = store.begin().await.unwrap();
        assert!(uow.list_products().await.unwrap().is_empty());
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        let product = uow.insert_product(&new_product("Arroz", 10)).await.unwrap();
        assert_eq!(uow.adjust_product_stock(product.id_typed(), -6).await.unwrap(), Some(4));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let found = uow.find_product(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(found.stock(), 4);
        assert_eq!(found.name(), "Arroz");
    }

    #[tokio::test]
    async fn stock_adjustment_is_relative_and_checked() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let id = uow.insert_product(&new_product("Fideos", 3)).await.unwrap().id_typed();

        assert_eq!(uow.adjust_product_stock(id, 5).await.unwrap(), Some(8));
        assert_eq!(uow.adjust_product_stock(id, -10).await.unwrap(), Some(-2));
        assert_eq!(uow.adjust_product_stock(ProductId::new(999), 1).await.unwrap(), None);
        assert!(matches!(
            uow.adjust_product_stock(id, i64::MAX).await.unwrap_err(),
            StoreError::OutOfRange(_)
        ));
    }

    #[tokio::test]
    async fn units_of_work_are_serialized() {
        let store = InMemoryStore::new();
        let first = store.begin().await.unwrap();

        let second = tokio::time::timeout(std::time::Duration::from_millis(50), store.begin()).await;
        assert!(second.is_err(), "second unit of work must wait for the first");

        drop(first);
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn max_numeric_order_number_skips_legacy_values() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let supplier = uow
            .insert_supplier(&SupplierDetails::from_input(almacen_parties::PartyInput {
                name: "Proveedor".into(),
                ..Default::default()
            })
            .unwrap())
            .await
            .unwrap();
        for raw in ["0000004", "LEGACY-9", "0000002"] {
            uow.insert_purchase(&PurchaseDraft {
                supplier_id: supplier.id,
                order_number: OrderNumber::from_stored(raw),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        assert_eq!(uow.max_numeric_order_number(OrderKind::Purchase).await.unwrap(), Some(4));
        assert_eq!(uow.max_order_id(OrderKind::Purchase).await.unwrap(), Some(3));
        assert_eq!(uow.max_numeric_order_number(OrderKind::Sale).await.unwrap(), None);

        let dup = uow
            .insert_purchase(&PurchaseDraft {
                supplier_id: supplier.id,
                order_number: OrderNumber::from_stored("0000004"),
                created_at: Utc::now(),
            })
            .await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }
}
