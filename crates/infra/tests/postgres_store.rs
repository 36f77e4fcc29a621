//! Order flow against a real Postgres. Runs only when `DATABASE_URL` is set;
//! every test seeds its own rows so a shared database is fine.

use std::sync::Arc;

use almacen_core::{ClientId, LineItem, Money, ProductId, SupplierId};
use almacen_infra::{CatalogService, OrderService, PostgresStore, ServiceError, StockLedger};
use almacen_inventory::StockPolicy;
use almacen_parties::{ClientInput, PartyInput};
use almacen_products::ProductInput;
use almacen_purchasing::NewPurchase;
use almacen_sales::NewSale;

static SCHEMA: tokio::sync::Mutex<bool> = tokio::sync::Mutex::const_new(false);

async fn connect() -> Option<PostgresStore> {
    let Some(url) = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()) else {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    };
    let store = PostgresStore::connect(&url, 16).await.unwrap();
    let mut migrated = SCHEMA.lock().await;
    if !*migrated {
        store.migrate().await.unwrap();
        *migrated = true;
    }
    Some(store)
}

struct Seeded {
    catalog: CatalogService,
    supplier: SupplierId,
    client: ClientId,
    product: ProductId,
}

async fn seed(store: &PostgresStore, stock: i64) -> Seeded {
    let catalog = CatalogService::new(Arc::new(store.clone()));
    let supplier = catalog
        .create_supplier(PartyInput {
            name: "Distribuidora Norte".into(),
            ..PartyInput::default()
        })
        .await
        .unwrap();
    let client = catalog
        .create_client(ClientInput {
            party: PartyInput {
                name: "Bodega Rosita".into(),
                ..PartyInput::default()
            },
            document_type: None,
        })
        .await
        .unwrap();
    let product = catalog
        .create_product(
            ProductInput {
                name: "Leche Gloria 400g".into(),
                ..ProductInput::default()
            },
            Some(stock),
            None,
        )
        .await
        .unwrap();
    Seeded {
        catalog,
        supplier: supplier.id,
        client: client.id,
        product: product.id_typed(),
    }
}

fn lines(product: ProductId, count: usize) -> Vec<LineItem> {
    (0..count)
        .map(|_| LineItem::new(product, 1, Money::from_cents(350).unwrap()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_purchases_and_sales_keep_every_stock_change() {
    let Some(store) = connect().await else { return };
    let seeded = seed(&store, 1000).await;
    let orders = OrderService::new(Arc::new(store.clone()), StockLedger::default());

    let mut handles = Vec::new();
    for i in 0..100 {
        let orders = orders.clone();
        let (supplier, client, product) = (seeded.supplier, seeded.client, seeded.product);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                orders
                    .create_purchase(NewPurchase {
                        supplier_id: supplier,
                        lines: lines(product, 5),
                    })
                    .await
                    .map(|_| ())
            } else {
                orders
                    .create_sale(NewSale {
                        client_id: client,
                        seller_id: None,
                        lines: lines(product, 5),
                    })
                    .await
                    .map(|_| ())
            }
        }));
    }

    let mut committed = 0;
    for handle in handles {
        handle.await.unwrap().unwrap();
        committed += 1;
    }
    assert_eq!(committed, 100);

    let product = seeded.catalog.get_product(seeded.product).await.unwrap();
    assert_eq!(product.stock(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn reject_negative_holds_under_concurrent_sales() {
    let Some(store) = connect().await else { return };
    let seeded = seed(&store, 3).await;
    let orders = OrderService::new(
        Arc::new(store.clone()),
        StockLedger::new(StockPolicy::RejectNegative),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let orders = orders.clone();
        let (client, product) = (seeded.client, seeded.product);
        handles.push(tokio::spawn(async move {
            orders
                .create_sale(NewSale {
                    client_id: client,
                    seller_id: None,
                    lines: lines(product, 1),
                })
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, ServiceError::Invariant(_)), "{err:?}"),
        }
    }
    assert_eq!(accepted, 3);

    let product = seeded.catalog.get_product(seeded.product).await.unwrap();
    assert_eq!(product.stock(), 0);
}

#[tokio::test]
async fn oversized_stock_delta_is_an_invariant_error() {
    let Some(store) = connect().await else { return };
    let seeded = seed(&store, i64::MAX - 1).await;
    let orders = OrderService::new(Arc::new(store.clone()), StockLedger::default());

    let err = orders
        .create_purchase(NewPurchase {
            supplier_id: seeded.supplier,
            lines: vec![LineItem::new(seeded.product, 5, Money::from_cents(100).unwrap())],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invariant(_)), "{err:?}");

    let product = seeded.catalog.get_product(seeded.product).await.unwrap();
    assert_eq!(product.stock(), i64::MAX - 1);
}
