//! Catalog maintenance: products, unit types, suppliers and clients.

use std::sync::Arc;

use serde::Serialize;

use almacen_core::{ClientId, EntityKind, ProductId, SupplierId, UnitTypeId};
use almacen_parties::{
    Client, ClientDetails, ClientInput, PartyInput, Supplier, SupplierDetails, SupplierProductLink,
};
use almacen_products::{NewProduct, NewUnitType, Product, ProductInput, UnitType};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{
    CatalogRepository, PartyRepository, Store, UnitOfWork, commit_or_rollback, release,
};

/// A supplier together with the products linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierWithProducts {
    pub supplier: Supplier,
    pub products: Vec<Product>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Products
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_products().await.map_err(ServiceError::from);
        release(uow, result).await
    }

    pub async fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        let mut uow = self.store.begin().await?;
        let result = find_product(&mut *uow, id).await;
        release(uow, result).await
    }

    /// Create a product, optionally with an initial stock level and a
    /// supplier to link it to.
    pub async fn create_product(
        &self,
        input: ProductInput,
        initial_stock: Option<i64>,
        supplier: Option<SupplierId>,
    ) -> ServiceResult<Product> {
        let product = NewProduct::new(input, initial_stock)?;

        let mut uow = self.store.begin().await?;
        let result = async {
            if let Some(unit) = product.details.unit_type_id {
                require_unit_type(&mut *uow, unit).await?;
            }
            if let Some(supplier) = supplier {
                require_supplier(&mut *uow, supplier).await?;
            }
            let created = uow.insert_product(&product).await?;
            if let Some(supplier) = supplier {
                uow.link_supplier_product(SupplierProductLink {
                    supplier_id: supplier,
                    product_id: created.id_typed(),
                })
                .await?;
            }
            Ok::<_, ServiceError>(created)
        }
        .await;
        let created = commit_or_rollback(uow, result).await?;
        tracing::info!(product_id = %created.id_typed(), name = created.name(), "product created");
        Ok(created)
    }

    /// Replace a product's editable attributes. Stock is never touched here.
    /// When `supplier` is given it becomes the product's only supplier; when
    /// no image is given the current one is kept.
    pub async fn update_product(
        &self,
        id: ProductId,
        input: ProductInput,
        supplier: Option<SupplierId>,
    ) -> ServiceResult<Product> {
        let mut details = input.validate()?;

        let mut uow = self.store.begin().await?;
        let result = async {
            let current = uow
                .find_product(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Product, id))?;
            if details.image.is_none() {
                details.image = current.details().image.clone();
            }
            if let Some(unit) = details.unit_type_id {
                require_unit_type(&mut *uow, unit).await?;
            }
            if let Some(supplier) = supplier {
                require_supplier(&mut *uow, supplier).await?;
            }
            let updated = uow
                .update_product(id, &details)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Product, id))?;
            if let Some(supplier) = supplier {
                uow.replace_product_suppliers(id, &[supplier]).await?;
            }
            Ok::<_, ServiceError>(updated)
        }
        .await;
        commit_or_rollback(uow, result).await
    }

    pub async fn list_products_by_supplier(&self, supplier: SupplierId) -> ServiceResult<Vec<Product>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            require_supplier(&mut *uow, supplier).await?;
            Ok::<_, ServiceError>(uow.list_products_by_supplier(supplier).await?)
        }
        .await;
        release(uow, result).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Unit types
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_unit_types(&self) -> ServiceResult<Vec<UnitType>> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_unit_types().await.map_err(ServiceError::from);
        release(uow, result).await
    }

    pub async fn create_unit_type(&self, name: &str) -> ServiceResult<UnitType> {
        let unit = NewUnitType::new(name)?;
        let mut uow = self.store.begin().await?;
        let result = uow.insert_unit_type(&unit).await.map_err(ServiceError::from);
        commit_or_rollback(uow, result).await
    }

    /// Products using the unit keep existing without a unit.
    pub async fn delete_unit_type(&self, id: UnitTypeId) -> ServiceResult<()> {
        let mut uow = self.store.begin().await?;
        let result = match uow.delete_unit_type(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceError::not_found(EntityKind::UnitType, id)),
            Err(err) => Err(err.into()),
        };
        commit_or_rollback(uow, result).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Suppliers
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_suppliers(&self) -> ServiceResult<Vec<Supplier>> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_suppliers().await.map_err(ServiceError::from);
        release(uow, result).await
    }

    pub async fn get_supplier(&self, id: SupplierId) -> ServiceResult<SupplierWithProducts> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let supplier = require_supplier(&mut *uow, id).await?;
            let products = uow.list_products_by_supplier(id).await?;
            Ok::<_, ServiceError>(SupplierWithProducts { supplier, products })
        }
        .await;
        release(uow, result).await
    }

    pub async fn create_supplier(&self, input: PartyInput) -> ServiceResult<Supplier> {
        let details = SupplierDetails::from_input(input)?;
        let mut uow = self.store.begin().await?;
        let result = uow.insert_supplier(&details).await.map_err(ServiceError::from);
        commit_or_rollback(uow, result).await
    }

    pub async fn update_supplier(&self, id: SupplierId, input: PartyInput) -> ServiceResult<Supplier> {
        let details = SupplierDetails::from_input(input)?;
        let mut uow = self.store.begin().await?;
        let result = match uow.update_supplier(id, &details).await {
            Ok(Some(supplier)) => Ok(supplier),
            Ok(None) => Err(ServiceError::not_found(EntityKind::Supplier, id)),
            Err(err) => Err(err.into()),
        };
        commit_or_rollback(uow, result).await
    }

    /// Record that `supplier` provides `product`. Linking twice is a no-op.
    pub async fn link_product(&self, supplier: SupplierId, product: ProductId) -> ServiceResult<()> {
        let mut uow = self.store.begin().await?;
        let result = async {
            require_supplier(&mut *uow, supplier).await?;
            find_product(&mut *uow, product).await?;
            uow.link_supplier_product(SupplierProductLink {
                supplier_id: supplier,
                product_id: product,
            })
            .await?;
            Ok::<_, ServiceError>(())
        }
        .await;
        commit_or_rollback(uow, result).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_clients(&self) -> ServiceResult<Vec<Client>> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_clients().await.map_err(ServiceError::from);
        release(uow, result).await
    }

    pub async fn get_client(&self, id: ClientId) -> ServiceResult<Client> {
        let mut uow = self.store.begin().await?;
        let result = match uow.find_client(id).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => Err(ServiceError::not_found(EntityKind::Client, id)),
            Err(err) => Err(err.into()),
        };
        release(uow, result).await
    }

    pub async fn create_client(&self, input: ClientInput) -> ServiceResult<Client> {
        let details = ClientDetails::from_input(input)?;
        let mut uow = self.store.begin().await?;
        let result = uow.insert_client(&details).await.map_err(ServiceError::from);
        commit_or_rollback(uow, result).await
    }

    pub async fn update_client(&self, id: ClientId, input: ClientInput) -> ServiceResult<Client> {
        let details = ClientDetails::from_input(input)?;
        let mut uow = self.store.begin().await?;
        let result = match uow.update_client(id, &details).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => Err(ServiceError::not_found(EntityKind::Client, id)),
            Err(err) => Err(err.into()),
        };
        commit_or_rollback(uow, result).await
    }
}

async fn find_product(uow: &mut dyn UnitOfWork, id: ProductId) -> ServiceResult<Product> {
    uow.find_product(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Product, id))
}

async fn require_unit_type(uow: &mut dyn UnitOfWork, id: UnitTypeId) -> ServiceResult<UnitType> {
    uow.find_unit_type(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::UnitType, id))
}

async fn require_supplier(uow: &mut dyn UnitOfWork, id: SupplierId) -> ServiceResult<Supplier> {
    uow.find_supplier(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Supplier, id))
}
