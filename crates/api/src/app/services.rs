//! Service wiring: one store shared by the catalog, order and account
//! services.

use std::sync::Arc;

use almacen_auth::Hs256JwtValidator;
use almacen_infra::{
    AccountService, AppConfig, CatalogService, InMemoryStore, OrderService, PostgresStore, StockLedger, Store,
    StoreConfig, StoreError,
};

use crate::app::images::ImageStore;

#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub images: ImageStore,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> Self {
        let tokens = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
        Self {
            accounts: AccountService::new(store.clone(), tokens, config.token_ttl),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone(), StockLedger::new(config.stock_policy)),
            images: ImageStore::new(config.images_dir.clone()),
            store,
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), config)
    }
}

/// Build services for the store selected by `config`, creating the schema
/// when the store is Postgres.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.store {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory store");
            Ok(AppServices::in_memory(config))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections).await?;
            store.migrate().await?;
            tracing::info!(max_connections, "using postgres store");
            Ok(AppServices::new(Arc::new(store), config))
        }
    }
}
