//! Postgres-backed entity store.
//!
//! Each unit of work is one database transaction. Order numbering is
//! serialized with a transaction-scoped advisory lock per order kind, and the
//! UNIQUE constraint on the order number column backs it up.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (numeric value out of range) | `22003` | `OutOfRange` |
//! | Database (other) | Any other | `Persistence` |
//! | PoolClosed / Io / other | N/A | `Persistence` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use almacen_auth::{NewUser, Role, User, UserProfile};
use almacen_core::{
    ClientId, EntityKind, LineId, LineItem, Money, OrderKind, OrderNumber, ProductId, PurchaseId,
    SaleId, SupplierId, UnitTypeId, UserId,
};
use almacen_parties::{
    Client, ClientDetails, ContactInfo, Supplier, SupplierDetails, SupplierProductLink,
};
use almacen_products::{NewProduct, NewUnitType, Product, ProductDetails, UnitType};
use almacen_purchasing::{Purchase, PurchaseDraft, PurchaseLine};
use almacen_sales::{Sale, SaleDraft, SaleLine};

use super::{
    CatalogRepository, OrderRepository, PartyRepository, Store, StoreError, StoreResult,
    UnitOfWork, UserRepository,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres-backed store. Cheap to clone; the pool is shared.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self { pool })
    }

    /// Create missing tables. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// One open transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CatalogRepository for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn list_products(&mut self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, nombre, descripcion, precio_compra, precio_venta, stock,
                   tipo_unidad_id, estado, imagen, fecha_registro
            FROM productos
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, nombre, descripcion, precio_compra, precio_venta, stock,
                   tipo_unidad_id, estado, imagen, fecha_registro
            FROM productos
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product), fields(name = %product.details.name), err)]
    async fn insert_product(&mut self, product: &NewProduct) -> StoreResult<Product> {
        let d = &product.details;
        let row = sqlx::query(
            r#"
            INSERT INTO productos
                (nombre, descripcion, precio_compra, precio_venta, stock, tipo_unidad_id, estado, imagen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, nombre, descripcion, precio_compra, precio_venta, stock,
                      tipo_unidad_id, estado, imagen, fecha_registro
            "#,
        )
        .bind(&d.name)
        .bind(d.description.as_deref())
        .bind(d.purchase_price.amount())
        .bind(d.sale_price.amount())
        .bind(product.initial_stock)
        .bind(d.unit_type_id.map(|u| u.get()))
        .bind(d.active)
        .bind(d.image.as_deref())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        product_from_row(&row)
    }

    #[instrument(skip(self, details), err)]
    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            UPDATE productos
            SET nombre = $2, descripcion = $3, precio_compra = $4, precio_venta = $5,
                tipo_unidad_id = $6, estado = $7, imagen = $8
            WHERE id = $1
            RETURNING id, nombre, descripcion, precio_compra, precio_venta, stock,
                      tipo_unidad_id, estado, imagen, fecha_registro
            "#,
        )
        .bind(id.get())
        .bind(&details.name)
        .bind(details.description.as_deref())
        .bind(details.purchase_price.amount())
        .bind(details.sale_price.amount())
        .bind(details.unit_type_id.map(|u| u.get()))
        .bind(details.active)
        .bind(details.image.as_deref())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn adjust_product_stock(&mut self, id: ProductId, delta: i64) -> StoreResult<Option<i64>> {
        // Relative update: concurrent writers queue on the row lock and each
        // one adds to the value the previous one committed.
        let row = sqlx::query("UPDATE productos SET stock = stock + $2 WHERE id = $1 RETURNING stock")
            .bind(id.get())
            .bind(delta)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("adjust_product_stock", e))?;

        row.map(|r| r.try_get::<i64, _>("stock"))
            .transpose()
            .map_err(|e| map_sqlx_error("adjust_product_stock", e))
    }

    #[instrument(skip(self), err)]
    async fn list_products_by_supplier(&mut self, supplier: SupplierId) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.nombre, p.descripcion, p.precio_compra, p.precio_venta, p.stock,
                   p.tipo_unidad_id, p.estado, p.imagen, p.fecha_registro
            FROM productos p
            JOIN proveedor_producto pp ON pp.producto_id = p.id
            WHERE pp.proveedor_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(supplier.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_products_by_supplier", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_unit_types(&mut self) -> StoreResult<Vec<UnitType>> {
        let rows = sqlx::query("SELECT id, nombre FROM tipo_unidad ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_unit_types", e))?;

        rows.iter().map(unit_type_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_unit_type(&mut self, id: UnitTypeId) -> StoreResult<Option<UnitType>> {
        let row = sqlx::query("SELECT id, nombre FROM tipo_unidad WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_unit_type", e))?;

        row.as_ref().map(unit_type_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn insert_unit_type(&mut self, unit: &NewUnitType) -> StoreResult<UnitType> {
        let row = sqlx::query("INSERT INTO tipo_unidad (nombre) VALUES ($1) RETURNING id, nombre")
            .bind(&unit.name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_unit_type", e))?;

        unit_type_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn delete_unit_type(&mut self, id: UnitTypeId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tipo_unidad WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_unit_type", e))?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Suppliers and clients
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PartyRepository for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn list_suppliers(&mut self) -> StoreResult<Vec<Supplier>> {
        let rows = sqlx::query(
            r#"
            SELECT id, nombre, documento, email, telefono, direccion, estado
            FROM proveedores
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_suppliers", e))?;

        rows.iter().map(supplier_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        let row = sqlx::query(
            r#"
            SELECT id, nombre, documento, email, telefono, direccion, estado
            FROM proveedores
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_supplier", e))?;

        row.as_ref().map(supplier_from_row).transpose()
    }

    #[instrument(skip(self, details), fields(name = %details.name), err)]
    async fn insert_supplier(&mut self, details: &SupplierDetails) -> StoreResult<Supplier> {
        let row = sqlx::query(
            r#"
            INSERT INTO proveedores (nombre, documento, email, telefono, direccion, estado)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, nombre, documento, email, telefono, direccion, estado
            "#,
        )
        .bind(&details.name)
        .bind(details.document.as_deref())
        .bind(details.contact.email.as_deref())
        .bind(details.contact.phone.as_deref())
        .bind(details.contact.address.as_deref())
        .bind(details.active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_supplier", e))?;

        supplier_from_row(&row)
    }

    #[instrument(skip(self, details), err)]
    async fn update_supplier(
        &mut self,
        id: SupplierId,
        details: &SupplierDetails,
    ) -> StoreResult<Option<Supplier>> {
        let row = sqlx::query(
            r#"
            UPDATE proveedores
            SET nombre = $2, documento = $3, email = $4, telefono = $5, direccion = $6, estado = $7
            WHERE id = $1
            RETURNING id, nombre, documento, email, telefono, direccion, estado
            "#,
        )
        .bind(id.get())
        .bind(&details.name)
        .bind(details.document.as_deref())
        .bind(details.contact.email.as_deref())
        .bind(details.contact.phone.as_deref())
        .bind(details.contact.address.as_deref())
        .bind(details.active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e))?;

        row.as_ref().map(supplier_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn link_supplier_product(&mut self, link: SupplierProductLink) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO proveedor_producto (proveedor_id, producto_id)
            VALUES ($1, $2)
            ON CONFLICT (proveedor_id, producto_id) DO NOTHING
            "#,
        )
        .bind(link.supplier_id.get())
        .bind(link.product_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("link_supplier_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn replace_product_suppliers(
        &mut self,
        product: ProductId,
        suppliers: &[SupplierId],
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM proveedor_producto WHERE producto_id = $1")
            .bind(product.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("replace_product_suppliers", e))?;

        for supplier in suppliers {
            self.link_supplier_product(SupplierProductLink {
                supplier_id: *supplier,
                product_id: product,
            })
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_clients(&mut self) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query(
            r#"
            SELECT id, nombre, documento, tipo_documento, email, telefono, direccion, estado
            FROM clientes
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_clients", e))?;

        rows.iter().map(client_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_client(&mut self, id: ClientId) -> StoreResult<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, nombre, documento, tipo_documento, email, telefono, direccion, estado
            FROM clientes
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_client", e))?;

        row.as_ref().map(client_from_row).transpose()
    }

    #[instrument(skip(self, details), fields(name = %details.name), err)]
    async fn insert_client(&mut self, details: &ClientDetails) -> StoreResult<Client> {
        let row = sqlx::query(
            r#"
            INSERT INTO clientes (nombre, documento, tipo_documento, email, telefono, direccion, estado)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, nombre, documento, tipo_documento, email, telefono, direccion, estado
            "#,
        )
        .bind(&details.name)
        .bind(details.document.as_deref())
        .bind(&details.document_type)
        .bind(details.contact.email.as_deref())
        .bind(details.contact.phone.as_deref())
        .bind(details.contact.address.as_deref())
        .bind(details.active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e))?;

        client_from_row(&row)
    }

    #[instrument(skip(self, details), err)]
    async fn update_client(
        &mut self,
        id: ClientId,
        details: &ClientDetails,
    ) -> StoreResult<Option<Client>> {
        let row = sqlx::query(
            r#"
            UPDATE clientes
            SET nombre = $2, documento = $3, tipo_documento = $4, email = $5,
                telefono = $6, direccion = $7, estado = $8
            WHERE id = $1
            RETURNING id, nombre, documento, tipo_documento, email, telefono, direccion, estado
            "#,
        )
        .bind(id.get())
        .bind(&details.name)
        .bind(details.document.as_deref())
        .bind(&details.document_type)
        .bind(details.contact.email.as_deref())
        .bind(details.contact.phone.as_deref())
        .bind(details.contact.address.as_deref())
        .bind(details.active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_client", e))?;

        row.as_ref().map(client_from_row).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

/// Per-kind SQL names and the advisory lock key guarding numbering.
struct OrderTable {
    header: &'static str,
    number_column: &'static str,
    lock_key: i64,
}

fn order_table(kind: OrderKind) -> OrderTable {
    match kind {
        OrderKind::Purchase => OrderTable {
            header: "compras",
            number_column: "orden_compra",
            lock_key: 0x616c_6d61_0001,
        },
        OrderKind::Sale => OrderTable {
            header: "ventas",
            number_column: "orden_venta",
            lock_key: 0x616c_6d61_0002,
        },
    }
}

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn lock_order_sequence(&mut self, kind: OrderKind) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(order_table(kind).lock_key)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order_sequence", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn max_numeric_order_number(&mut self, kind: OrderKind) -> StoreResult<Option<u64>> {
        let table = order_table(kind);
        let sql = format!(
            "SELECT MAX(CAST({col} AS BIGINT)) AS max_number FROM {header} WHERE {col} ~ '^[0-9]{{1,18}}$'",
            col = table.number_column,
            header = table.header,
        );
        let row = sqlx::query(&sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("max_numeric_order_number", e))?;

        let max: Option<i64> = column(&row, "max_number")?;
        Ok(max.and_then(|n| u64::try_from(n).ok()))
    }

    #[instrument(skip(self), err)]
    async fn max_order_id(&mut self, kind: OrderKind) -> StoreResult<Option<i64>> {
        let sql = format!("SELECT MAX(id) AS max_id FROM {}", order_table(kind).header);
        let row = sqlx::query(&sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("max_order_id", e))?;

        column(&row, "max_id")
    }

    #[instrument(skip(self, draft), fields(order_number = %draft.order_number), err)]
    async fn insert_purchase(&mut self, draft: &PurchaseDraft) -> StoreResult<Purchase> {
        let row = sqlx::query(
            r#"
            INSERT INTO compras (proveedor_id, orden_compra, fecha)
            VALUES ($1, $2, $3)
            RETURNING id, proveedor_id, orden_compra, fecha
            "#,
        )
        .bind(draft.supplier_id.get())
        .bind(draft.order_number.as_str())
        .bind(draft.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase", e))?;

        purchase_from_row(&row)
    }

    #[instrument(skip(self, line), err)]
    async fn insert_purchase_line(
        &mut self,
        purchase: PurchaseId,
        line: &LineItem,
    ) -> StoreResult<PurchaseLine> {
        let row = sqlx::query(
            r#"
            INSERT INTO detalle_compra (compra_id, producto_id, cantidad, precio_unitario)
            VALUES ($1, $2, $3, $4)
            RETURNING id, compra_id, producto_id, cantidad, precio_unitario
            "#,
        )
        .bind(purchase.get())
        .bind(line.product_id.get())
        .bind(line.quantity)
        .bind(line.unit_price.amount())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase_line", e))?;

        purchase_line_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list_purchases(&mut self) -> StoreResult<Vec<Purchase>> {
        let rows = sqlx::query(
            "SELECT id, proveedor_id, orden_compra, fecha FROM compras ORDER BY fecha DESC, id DESC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_purchases", e))?;

        rows.iter().map(purchase_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_purchase(&mut self, id: PurchaseId) -> StoreResult<Option<Purchase>> {
        let row = sqlx::query("SELECT id, proveedor_id, orden_compra, fecha FROM compras WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_purchase", e))?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn purchase_lines(&mut self, id: PurchaseId) -> StoreResult<Vec<PurchaseLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, compra_id, producto_id, cantidad, precio_unitario
            FROM detalle_compra
            WHERE compra_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("purchase_lines", e))?;

        rows.iter().map(purchase_line_from_row).collect()
    }

    #[instrument(skip(self, draft), fields(order_number = %draft.order_number), err)]
    async fn insert_sale(&mut self, draft: &SaleDraft) -> StoreResult<Sale> {
        let row = sqlx::query(
            r#"
            INSERT INTO ventas (cliente_id, vendedor_id, orden_venta, fecha)
            VALUES ($1, $2, $3, $4)
            RETURNING id, cliente_id, vendedor_id, orden_venta, fecha
            "#,
        )
        .bind(draft.client_id.get())
        .bind(draft.seller_id.map(|u| u.get()))
        .bind(draft.order_number.as_str())
        .bind(draft.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;

        sale_from_row(&row)
    }

    #[instrument(skip(self, line), err)]
    async fn insert_sale_line(&mut self, sale: SaleId, line: &LineItem) -> StoreResult<SaleLine> {
        let row = sqlx::query(
            r#"
            INSERT INTO detalle_venta (venta_id, producto_id, cantidad, precio_unitario)
            VALUES ($1, $2, $3, $4)
            RETURNING id, venta_id, producto_id, cantidad, precio_unitario
            "#,
        )
        .bind(sale.get())
        .bind(line.product_id.get())
        .bind(line.quantity)
        .bind(line.unit_price.amount())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale_line", e))?;

        sale_line_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list_sales(&mut self) -> StoreResult<Vec<Sale>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cliente_id, vendedor_id, orden_venta, fecha
            FROM ventas
            ORDER BY fecha DESC, id DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_sales", e))?;

        rows.iter().map(sale_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>> {
        let row = sqlx::query(
            "SELECT id, cliente_id, vendedor_id, orden_venta, fecha FROM ventas WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_sale", e))?;

        row.as_ref().map(sale_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn sale_lines(&mut self, id: SaleId) -> StoreResult<Vec<SaleLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, venta_id, producto_id, cantidad, precio_unitario
            FROM detalle_venta
            WHERE venta_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("sale_lines", e))?;

        rows.iter().map(sale_line_from_row).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserRepository for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn list_users(&mut self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, nombre, apellidos, email, password, rol, estado FROM usuarios ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, nombre, apellidos, email, password, rol, estado FROM usuarios WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, nombre, apellidos, email, password, rol, estado FROM usuarios WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(email = %user.profile.email), err)]
    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        let p = &user.profile;
        let row = sqlx::query(
            r#"
            INSERT INTO usuarios (nombre, apellidos, email, password, rol, estado)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, nombre, apellidos, email, password, rol, estado
            "#,
        )
        .bind(&p.first_name)
        .bind(&p.last_names)
        .bind(&p.email)
        .bind(&user.password_hash)
        .bind(p.role.as_str())
        .bind(p.active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        user_from_row(&row)
    }

    #[instrument(skip(self, profile, password_hash), err)]
    async fn update_user(
        &mut self,
        id: UserId,
        profile: &UserProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            UPDATE usuarios
            SET nombre = $2, apellidos = $3, email = $4, rol = $5, estado = $6,
                password = COALESCE($7, password)
            WHERE id = $1
            RETURNING id, nombre, apellidos, email, password, rol, estado
            "#,
        )
        .bind(id.get())
        .bind(&profile.first_name)
        .bind(&profile.last_names)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .bind(profile.active)
        .bind(password_hash)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn set_user_active(&mut self, id: UserId, active: bool) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            UPDATE usuarios SET estado = $2 WHERE id = $1
            RETURNING id, nombre, apellidos, email, password, rol, estado
            "#,
        )
        .bind(id.get())
        .bind(active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_user_active", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Persistence(format!("failed to read {name}: {e}")))
}

fn money(row: &PgRow, name: &str) -> StoreResult<Money> {
    let amount: Decimal = column(row, name)?;
    Money::new(amount)
        .map_err(|e| StoreError::Persistence(format!("invalid amount in {name}: {e}")))
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let details = ProductDetails {
        name: column(row, "nombre")?,
        description: column(row, "descripcion")?,
        purchase_price: money(row, "precio_compra")?,
        sale_price: money(row, "precio_venta")?,
        unit_type_id: column::<Option<i64>>(row, "tipo_unidad_id")?.map(UnitTypeId::new),
        active: column(row, "estado")?,
        image: column(row, "imagen")?,
    };
    let registered_at: DateTime<Utc> = column(row, "fecha_registro")?;
    Ok(Product::hydrate(
        ProductId::new(column(row, "id")?),
        details,
        column(row, "stock")?,
        registered_at,
    ))
}

fn unit_type_from_row(row: &PgRow) -> StoreResult<UnitType> {
    Ok(UnitType {
        id: UnitTypeId::new(column(row, "id")?),
        name: column(row, "nombre")?,
    })
}

fn contact_from_row(row: &PgRow) -> StoreResult<ContactInfo> {
    Ok(ContactInfo {
        email: column(row, "email")?,
        phone: column(row, "telefono")?,
        address: column(row, "direccion")?,
    })
}

fn supplier_from_row(row: &PgRow) -> StoreResult<Supplier> {
    Ok(Supplier {
        id: SupplierId::new(column(row, "id")?),
        details: SupplierDetails {
            name: column(row, "nombre")?,
            document: column(row, "documento")?,
            contact: contact_from_row(row)?,
            active: column(row, "estado")?,
        },
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    Ok(Client {
        id: ClientId::new(column(row, "id")?),
        details: ClientDetails {
            name: column(row, "nombre")?,
            document: column(row, "documento")?,
            document_type: column(row, "tipo_documento")?,
            contact: contact_from_row(row)?,
            active: column(row, "estado")?,
        },
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = column(row, "rol")?;
    Ok(User {
        id: UserId::new(column(row, "id")?),
        profile: UserProfile {
            first_name: column(row, "nombre")?,
            last_names: column(row, "apellidos")?,
            email: column(row, "email")?,
            role: Role::new(role),
            active: column(row, "estado")?,
        },
        password_hash: column(row, "password")?,
    })
}

fn purchase_from_row(row: &PgRow) -> StoreResult<Purchase> {
    let number: String = column(row, "orden_compra")?;
    Ok(Purchase {
        id: PurchaseId::new(column(row, "id")?),
        supplier_id: SupplierId::new(column(row, "proveedor_id")?),
        order_number: OrderNumber::from_stored(number),
        created_at: column(row, "fecha")?,
    })
}

fn purchase_line_from_row(row: &PgRow) -> StoreResult<PurchaseLine> {
    Ok(PurchaseLine {
        id: LineId::new(column(row, "id")?),
        purchase_id: PurchaseId::new(column(row, "compra_id")?),
        product_id: ProductId::new(column(row, "producto_id")?),
        quantity: column(row, "cantidad")?,
        unit_price: money(row, "precio_unitario")?,
    })
}

fn sale_from_row(row: &PgRow) -> StoreResult<Sale> {
    let number: String = column(row, "orden_venta")?;
    Ok(Sale {
        id: SaleId::new(column(row, "id")?),
        client_id: ClientId::new(column(row, "cliente_id")?),
        seller_id: column::<Option<i64>>(row, "vendedor_id")?.map(UserId::new),
        order_number: OrderNumber::from_stored(number),
        created_at: column(row, "fecha")?,
    })
}

fn sale_line_from_row(row: &PgRow) -> StoreResult<SaleLine> {
    Ok(SaleLine {
        id: LineId::new(column(row, "id")?),
        sale_id: SaleId::new(column(row, "venta_id")?),
        product_id: ProductId::new(column(row, "producto_id")?),
        quantity: column(row, "cantidad")?,
        unit_price: money(row, "precio_unitario")?,
    })
}

/// Map SQLx errors to [`StoreError`].
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique violation, e.g. a duplicate order number or email
                Some("23505") => StoreError::Conflict(msg),
                // referenced row is missing
                Some("23503") => StoreError::Conflict(msg),
                // numeric or bigint overflow
                Some("22003") => StoreError::OutOfRange(msg),
                _ => StoreError::Persistence(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Persistence(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Persistence(format!("sqlx error in {}: {}", operation, err)),
    }
}
