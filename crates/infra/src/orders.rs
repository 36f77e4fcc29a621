//! Purchase and sale creation, plus order reads.
//!
//! ## Creation flow
//!
//! ```text
//! PENDING
//!   ↓  request shape checked (lines, quantities, prices); nothing staged yet
//! VALIDATING
//!   ↓  counterparty (and seller) resolved, then every line's product
//! STAGED
//!   ↓  order number allocated, header + lines inserted, stock deltas applied
//! COMMITTED            or            FAILED (unit of work rolled back)
//! ```
//!
//! Every step after PENDING runs inside one unit of work; any error discards
//! all of it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use almacen_core::{
    ClientId, EntityKind, LineId, LineItem, Money, OrderKind, OrderNumber, ProductId, PurchaseId,
    SaleId, SupplierId, UserId,
};
use almacen_inventory::StockDelta;
use almacen_purchasing::{NewPurchase, Purchase, PurchaseDraft};
use almacen_sales::{NewSale, Sale, SaleDraft};

use crate::error::{ServiceError, ServiceResult};
use crate::ledger::StockLedger;
use crate::sequencer::{OrderNumberPreview, OrderSequencer};
use crate::store::{
    CatalogRepository, OrderRepository, PartyRepository, Store, UnitOfWork, UserRepository, release,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderPhase {
    Pending,
    Validating,
    Staged,
    Committed,
    Failed,
}

impl OrderPhase {
    fn as_str(self) -> &'static str {
        match self {
            OrderPhase::Pending => "pending",
            OrderPhase::Validating => "validating",
            OrderPhase::Staged => "staged",
            OrderPhase::Committed => "committed",
            OrderPhase::Failed => "failed",
        }
    }
}

fn enter(kind: OrderKind, phase: OrderPhase) {
    tracing::debug!(%kind, phase = phase.as_str(), "order phase");
}

/// What a successful order creation hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt<Id> {
    pub id: Id,
    pub order_number: OrderNumber,
    /// Σ quantity × unit price over all lines.
    pub total: Money,
    pub line_count: usize,
}

/// Short counterparty description embedded in order reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartySummary {
    pub id: i64,
    pub name: String,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerSummary {
    pub id: UserId,
    pub name: String,
}

/// A stored line joined with its product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineView {
    pub id: LineId,
    pub product_id: ProductId,
    /// `None` when the product row no longer exists.
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseDetail {
    pub id: PurchaseId,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
    pub supplier: Option<PartySummary>,
    pub lines: Vec<OrderLineView>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleDetail {
    pub id: SaleId,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
    pub client: Option<PartySummary>,
    pub seller: Option<SellerSummary>,
    pub lines: Vec<OrderLineView>,
    pub total: Money,
}

/// Transaction orchestrator for purchases and sales.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    sequencer: OrderSequencer,
    ledger: StockLedger,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, ledger: StockLedger) -> Self {
        Self {
            store,
            sequencer: OrderSequencer::new(),
            ledger,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────

    /// Record a purchase: stock of every line's product goes up by its
    /// quantity.
    pub async fn create_purchase(&self, request: NewPurchase) -> ServiceResult<OrderReceipt<PurchaseId>> {
        let kind = OrderKind::Purchase;
        enter(kind, OrderPhase::Pending);
        request.validate()?;
        let total = request.total()?;

        let mut uow = self.store.begin().await?;
        let staged = self.stage_purchase(&mut *uow, &request).await;
        let (id, order_number) = self.finish(kind, uow, staged, request.lines.len()).await?;
        Ok(OrderReceipt {
            id,
            order_number,
            total,
            line_count: request.lines.len(),
        })
    }

    /// Record a sale: stock of every line's product goes down by its
    /// quantity.
    pub async fn create_sale(&self, request: NewSale) -> ServiceResult<OrderReceipt<SaleId>> {
        let kind = OrderKind::Sale;
        enter(kind, OrderPhase::Pending);
        request.validate()?;
        let total = request.total()?;

        let mut uow = self.store.begin().await?;
        let staged = self.stage_sale(&mut *uow, &request).await;
        let (id, order_number) = self.finish(kind, uow, staged, request.lines.len()).await?;
        Ok(OrderReceipt {
            id,
            order_number,
            total,
            line_count: request.lines.len(),
        })
    }

    async fn stage_purchase(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &NewPurchase,
    ) -> ServiceResult<(PurchaseId, OrderNumber)> {
        let kind = OrderKind::Purchase;
        enter(kind, OrderPhase::Validating);
        require_supplier(uow, request.supplier_id).await?;
        require_products(uow, &request.lines).await?;

        let order_number = self.sequencer.next_order_number(uow, kind).await?;
        let header = uow
            .insert_purchase(&PurchaseDraft {
                supplier_id: request.supplier_id,
                order_number,
                created_at: Utc::now(),
            })
            .await?;

        for line in &request.lines {
            uow.insert_purchase_line(header.id, line).await?;
            self.ledger
                .apply_delta(uow, line.product_id, StockDelta::receipt(line.quantity))
                .await?;
        }
        enter(kind, OrderPhase::Staged);
        Ok((header.id, header.order_number))
    }

    async fn stage_sale(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &NewSale,
    ) -> ServiceResult<(SaleId, OrderNumber)> {
        let kind = OrderKind::Sale;
        enter(kind, OrderPhase::Validating);
        require_client(uow, request.client_id).await?;
        if let Some(seller) = request.seller_id {
            if uow.find_user(seller).await?.is_none() {
                return Err(ServiceError::not_found(EntityKind::User, seller));
            }
        }
        require_products(uow, &request.lines).await?;

        let order_number = self.sequencer.next_order_number(uow, kind).await?;
        let header = uow
            .insert_sale(&SaleDraft {
                client_id: request.client_id,
                seller_id: request.seller_id,
                order_number,
                created_at: Utc::now(),
            })
            .await?;

        for line in &request.lines {
            uow.insert_sale_line(header.id, line).await?;
            self.ledger
                .apply_delta(uow, line.product_id, StockDelta::issue(line.quantity))
                .await?;
        }
        enter(kind, OrderPhase::Staged);
        Ok((header.id, header.order_number))
    }

    /// Commit a staged order or roll it back, logging the outcome.
    async fn finish<Id>(
        &self,
        kind: OrderKind,
        uow: Box<dyn UnitOfWork>,
        staged: ServiceResult<(Id, OrderNumber)>,
        line_count: usize,
    ) -> ServiceResult<(Id, OrderNumber)>
    where
        Id: Copy + Into<i64>,
    {
        match staged {
            Ok((id, order_number)) => {
                if let Err(err) = uow.commit().await {
                    enter(kind, OrderPhase::Failed);
                    tracing::warn!(%kind, %order_number, error = %err, "order commit failed");
                    return Err(err.into());
                }
                enter(kind, OrderPhase::Committed);
                let raw_id: i64 = id.into();
                tracing::info!(%kind, %order_number, id = raw_id, line_count, "order committed");
                Ok((id, order_number))
            }
            Err(err) => {
                enter(kind, OrderPhase::Failed);
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::error!(%kind, error = %rollback_err, "rollback failed");
                }
                tracing::warn!(%kind, error = %err, "order rolled back");
                Err(err)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Newest first.
    pub async fn list_purchases(&self) -> ServiceResult<Vec<PurchaseDetail>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let headers = uow.list_purchases().await?;
            let mut names = ProductNames::default();
            let mut out = Vec::with_capacity(headers.len());
            for header in headers {
                out.push(purchase_detail(&mut *uow, &mut names, header).await?);
            }
            Ok::<_, ServiceError>(out)
        }
        .await;
        release(uow, result).await
    }

    pub async fn get_purchase(&self, id: PurchaseId) -> ServiceResult<PurchaseDetail> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let header = uow
                .find_purchase(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Purchase, id))?;
            purchase_detail(&mut *uow, &mut ProductNames::default(), header).await
        }
        .await;
        release(uow, result).await
    }

    /// Newest first.
    pub async fn list_sales(&self) -> ServiceResult<Vec<SaleDetail>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let headers = uow.list_sales().await?;
            let mut names = ProductNames::default();
            let mut out = Vec::with_capacity(headers.len());
            for header in headers {
                out.push(sale_detail(&mut *uow, &mut names, header).await?);
            }
            Ok::<_, ServiceError>(out)
        }
        .await;
        release(uow, result).await
    }

    pub async fn get_sale(&self, id: SaleId) -> ServiceResult<SaleDetail> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let header = uow
                .find_sale(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Sale, id))?;
            sale_detail(&mut *uow, &mut ProductNames::default(), header).await
        }
        .await;
        release(uow, result).await
    }

    /// Provisional next order number; nothing is reserved.
    pub async fn preview_next_number(&self, kind: OrderKind) -> ServiceResult<OrderNumberPreview> {
        let mut uow = self.store.begin().await?;
        let result = self.sequencer.preview_next(&mut *uow, kind).await;
        release(uow, result).await
    }
}

async fn require_supplier(uow: &mut dyn UnitOfWork, id: SupplierId) -> ServiceResult<()> {
    match uow.find_supplier(id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found(EntityKind::Supplier, id)),
    }
}

async fn require_client(uow: &mut dyn UnitOfWork, id: ClientId) -> ServiceResult<()> {
    match uow.find_client(id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found(EntityKind::Client, id)),
    }
}

/// Fails on the first line whose product does not exist.
async fn require_products(uow: &mut dyn UnitOfWork, lines: &[LineItem]) -> ServiceResult<()> {
    for line in lines {
        if uow.find_product(line.product_id).await?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Product, line.product_id));
        }
    }
    Ok(())
}

/// Product name lookups memoized for one read.
#[derive(Default)]
struct ProductNames(HashMap<ProductId, Option<String>>);

impl ProductNames {
    async fn get(&mut self, uow: &mut dyn UnitOfWork, id: ProductId) -> ServiceResult<Option<String>> {
        if let Some(name) = self.0.get(&id) {
            return Ok(name.clone());
        }
        let name = uow.find_product(id).await?.map(|p| p.name().to_string());
        self.0.insert(id, name.clone());
        Ok(name)
    }
}

async fn line_view(
    uow: &mut dyn UnitOfWork,
    names: &mut ProductNames,
    id: LineId,
    product_id: ProductId,
    quantity: i64,
    unit_price: Money,
) -> ServiceResult<OrderLineView> {
    Ok(OrderLineView {
        id,
        product_id,
        product_name: names.get(uow, product_id).await?,
        quantity,
        unit_price,
        total: unit_price.times(quantity)?,
    })
}

fn sum_lines(lines: &[OrderLineView]) -> ServiceResult<Money> {
    Ok(Money::sum(lines.iter().map(|l| l.total))?)
}

async fn purchase_detail(
    uow: &mut dyn UnitOfWork,
    names: &mut ProductNames,
    header: Purchase,
) -> ServiceResult<PurchaseDetail> {
    let supplier = uow.find_supplier(header.supplier_id).await?.map(|s| PartySummary {
        id: s.id.get(),
        name: s.details.name,
        document: s.details.document,
        email: s.details.contact.email,
        phone: s.details.contact.phone,
    });

    let mut lines = Vec::new();
    for line in uow.purchase_lines(header.id).await? {
        lines.push(line_view(uow, names, line.id, line.product_id, line.quantity, line.unit_price).await?);
    }
    let total = sum_lines(&lines)?;

    Ok(PurchaseDetail {
        id: header.id,
        order_number: header.order_number,
        created_at: header.created_at,
        supplier,
        lines,
        total,
    })
}

async fn sale_detail(
    uow: &mut dyn UnitOfWork,
    names: &mut ProductNames,
    header: Sale,
) -> ServiceResult<SaleDetail> {
    let client = uow.find_client(header.client_id).await?.map(|c| PartySummary {
        id: c.id.get(),
        name: c.details.name,
        document: c.details.document,
        email: c.details.contact.email,
        phone: c.details.contact.phone,
    });
    let seller = match header.seller_id {
        Some(id) => uow.find_user(id).await?.map(|u| SellerSummary {
            id: u.id,
            name: format!("{} {}", u.profile.first_name, u.profile.last_names),
        }),
        None => None,
    };

    let mut lines = Vec::new();
    for line in uow.sale_lines(header.id).await? {
        lines.push(line_view(uow, names, line.id, line.product_id, line.quantity, line.unit_price).await?);
    }
    let total = sum_lines(&lines)?;

    Ok(SaleDetail {
        id: header.id,
        order_number: header.order_number,
        created_at: header.created_at,
        client,
        seller,
        lines,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use almacen_auth::{NewUser, Role, UserProfile};
    use almacen_inventory::StockPolicy;
    use almacen_parties::{ClientDetails, ClientInput, PartyInput, SupplierDetails};
    use almacen_products::{NewProduct, ProductInput};

    use crate::store::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        service: OrderService,
        supplier: SupplierId,
        client: ClientId,
        seller: UserId,
        rice: ProductId,
        oil: ProductId,
    }

    async fn fixture(policy: StockPolicy, rice_stock: i64) -> Fixture {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let supplier = uow
            .insert_supplier(
                &SupplierDetails::from_input(PartyInput {
                    name: "Distribuidora Norte".into(),
                    ..PartyInput::default()
                })
                .unwrap(),
            )
            .await
            .unwrap();
        let client = uow
            .insert_client(
                &ClientDetails::from_input(ClientInput {
                    party: PartyInput {
                        name: "Bodega Rosita".into(),
                        document: Some("45678912".into()),
                        ..PartyInput::default()
                    },
                    document_type: None,
                })
                .unwrap(),
            )
            .await
            .unwrap();
        let seller = uow
            .insert_user(&NewUser {
                profile: UserProfile {
                    first_name: "Luis".into(),
                    last_names: "Quispe Mamani".into(),
                    email: "luis@tienda.pe".into(),
                    role: Role::new("vendedor"),
                    active: true,
                },
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let product = |name: &str, stock: i64| {
            NewProduct::new(
                ProductInput {
                    name: name.into(),
                    sale_price: Some(Money::parse("4.20").unwrap()),
                    ..ProductInput::default()
                },
                Some(stock),
            )
            .unwrap()
        };
        let rice = uow.insert_product(&product("Arroz Costeño 1kg", rice_stock)).await.unwrap();
        let oil = uow.insert_product(&product("Aceite Primor 1L", 20)).await.unwrap();
        uow.commit().await.unwrap();

        let service = OrderService::new(Arc::new(store.clone()), StockLedger::new(policy));
        Fixture {
            store,
            service,
            supplier: supplier.id,
            client: client.id,
            seller: seller.id,
            rice: rice.id_typed(),
            oil: oil.id_typed(),
        }
    }

    fn line(product: ProductId, quantity: i64, price: &str) -> LineItem {
        LineItem::new(product, quantity, Money::parse(price).unwrap())
    }

    async fn stock(store: &InMemoryStore, id: ProductId) -> i64 {
        let mut uow = store.begin().await.unwrap();
        uow.find_product(id).await.unwrap().unwrap().stock()
    }

    async fn sale_count(store: &InMemoryStore) -> usize {
        let mut uow = store.begin().await.unwrap();
        uow.list_sales().await.unwrap().len()
    }

    #[tokio::test]
    async fn first_purchase_gets_first_number_and_raises_stock() {
        let f = fixture(StockPolicy::AllowNegative, 0).await;
        let receipt = f
            .service
            .create_purchase(NewPurchase {
                supplier_id: f.supplier,
                lines: vec![line(f.rice, 5, "2.50")],
            })
            .await
            .unwrap();

        assert_eq!(receipt.order_number.as_str(), "0000001");
        assert_eq!(receipt.total, Money::parse("12.50").unwrap());
        assert_eq!(receipt.line_count, 1);
        assert_eq!(stock(&f.store, f.rice).await, 5);
    }

    #[tokio::test]
    async fn consecutive_sales_get_consecutive_numbers() {
        let f = fixture(StockPolicy::AllowNegative, 50).await;
        let request = || NewSale {
            client_id: f.client,
            seller_id: Some(f.seller),
            lines: vec![line(f.rice, 2, "4.20"), line(f.oil, 1, "9.90")],
        };

        let first = f.service.create_sale(request()).await.unwrap();
        let second = f.service.create_sale(request()).await.unwrap();

        assert_eq!(first.order_number.as_str(), "0000001");
        assert_eq!(second.order_number.as_str(), "0000002");
        assert_eq!(first.total, Money::parse("18.30").unwrap());
        assert_eq!(stock(&f.store, f.rice).await, 46);
        assert_eq!(stock(&f.store, f.oil).await, 18);
    }

    #[tokio::test]
    async fn repeated_product_lines_accumulate() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        f.service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: None,
                lines: vec![line(f.rice, 3, "4.20"), line(f.rice, 4, "4.00")],
            })
            .await
            .unwrap();
        assert_eq!(stock(&f.store, f.rice).await, 3);
    }

    #[tokio::test]
    async fn missing_product_rolls_back_everything() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        let err = f
            .service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: None,
                lines: vec![line(f.rice, 2, "10.00"), line(ProductId::new(9999), 1, "5.00")],
            })
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::not_found(EntityKind::Product, 9999i64));
        assert_eq!(stock(&f.store, f.rice).await, 10);
        assert_eq!(sale_count(&f.store).await, 0);
    }

    #[tokio::test]
    async fn missing_counterparties_are_not_found() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        let err = f
            .service
            .create_purchase(NewPurchase {
                supplier_id: SupplierId::new(77),
                lines: vec![line(f.rice, 1, "1.00")],
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found(EntityKind::Supplier, 77i64));

        let err = f
            .service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: Some(UserId::new(404)),
                lines: vec![line(f.rice, 1, "1.00")],
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::not_found(EntityKind::User, 404i64));
        assert_eq!(stock(&f.store, f.rice).await, 10);
    }

    #[tokio::test]
    async fn malformed_request_is_rejected_before_staging() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        let err = f
            .service
            .create_purchase(NewPurchase {
                supplier_id: f.supplier,
                lines: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = f
            .service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: None,
                lines: vec![line(f.rice, 0, "1.00")],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(sale_count(&f.store).await, 0);
    }

    #[tokio::test]
    async fn oversell_under_reject_policy_changes_nothing() {
        let f = fixture(StockPolicy::RejectNegative, 2).await;
        let err = f
            .service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: None,
                lines: vec![line(f.oil, 1, "9.90"), line(f.rice, 5, "4.20")],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Invariant(_)));
        assert_eq!(stock(&f.store, f.rice).await, 2);
        assert_eq!(stock(&f.store, f.oil).await, 20);
        assert_eq!(sale_count(&f.store).await, 0);
    }

    #[tokio::test]
    async fn oversell_under_allow_policy_goes_negative() {
        let f = fixture(StockPolicy::AllowNegative, 2).await;
        f.service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: None,
                lines: vec![line(f.rice, 5, "4.20")],
            })
            .await
            .unwrap();
        assert_eq!(stock(&f.store, f.rice).await, -3);
    }

    #[tokio::test]
    async fn committed_order_reads_back_identically() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        let receipt = f
            .service
            .create_sale(NewSale {
                client_id: f.client,
                seller_id: Some(f.seller),
                lines: vec![line(f.rice, 2, "4.20"), line(f.oil, 3, "9.90")],
            })
            .await
            .unwrap();

        let first = f.service.get_sale(receipt.id).await.unwrap();
        let second = f.service.get_sale(receipt.id).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(first.order_number, receipt.order_number);
        assert_eq!(first.total, receipt.total);
        assert_eq!(first.client.as_ref().unwrap().name, "Bodega Rosita");
        assert_eq!(first.seller.as_ref().unwrap().name, "Luis Quispe Mamani");
        assert_eq!(first.lines.len(), 2);
        assert_eq!(first.lines[0].product_name.as_deref(), Some("Arroz Costeño 1kg"));
        assert_eq!(first.lines[1].total, Money::parse("29.70").unwrap());

        assert_eq!(f.service.list_sales().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        assert_eq!(
            f.service.get_purchase(PurchaseId::new(5)).await.unwrap_err(),
            ServiceError::not_found(EntityKind::Purchase, 5i64)
        );
    }

    #[tokio::test]
    async fn preview_is_provisional_and_matches_next_allocation() {
        let f = fixture(StockPolicy::AllowNegative, 10).await;
        let preview = f.service.preview_next_number(OrderKind::Purchase).await.unwrap();
        assert_eq!(preview.next.as_str(), "0000001");
        assert!(preview.provisional);

        let receipt = f
            .service
            .create_purchase(NewPurchase {
                supplier_id: f.supplier,
                lines: vec![line(f.oil, 1, "7.00")],
            })
            .await
            .unwrap();
        assert_eq!(receipt.order_number, preview.next);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_purchases_get_unique_numbers() {
        let f = fixture(StockPolicy::AllowNegative, 0).await;
        let service = Arc::new(f.service.clone());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let service = service.clone();
            let (supplier, rice) = (f.supplier, f.rice);
            handles.push(tokio::spawn(async move {
                service
                    .create_purchase(NewPurchase {
                        supplier_id: supplier,
                        lines: vec![line(rice, 1, "1.00")],
                    })
                    .await
                    .unwrap()
                    .order_number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().numeric_value().unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=16).collect::<Vec<u64>>());
        assert_eq!(stock(&f.store, f.rice).await, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interleaved_purchases_and_sales_keep_every_stock_change() {
        let f = fixture(StockPolicy::AllowNegative, 100).await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let service = f.service.clone();
            let (supplier, client, rice) = (f.supplier, f.client, f.rice);
            handles.push(tokio::spawn(async move {
                let lines = vec![line(rice, 1, "4.20"); 5];
                if i % 2 == 0 {
                    service
                        .create_purchase(NewPurchase { supplier_id: supplier, lines })
                        .await
                        .map(|_| ())
                } else {
                    service
                        .create_sale(NewSale { client_id: client, seller_id: None, lines })
                        .await
                        .map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(stock(&f.store, f.rice).await, 100);
    }
}
