//! Wire format. Field names follow the Spanish names the front-end uses.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Value, json};

use almacen_auth::{User, UserInput};
use almacen_core::{ClientId, LineItem, Money, ProductId, SupplierId, UnitTypeId, UserId};
use almacen_infra::{
    AccessToken, OrderLineView, OrderNumberPreview, OrderReceipt, PartySummary, PurchaseDetail, SaleDetail,
    SellerSummary, SupplierWithProducts,
};
use almacen_parties::{Client, ClientInput, PartyInput, Supplier};
use almacen_products::{Product, ProductInput, UnitType};
use almacen_purchasing::NewPurchase;
use almacen_sales::NewSale;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub correo: String,
    #[serde(rename = "contraseña", alias = "password")]
    pub contrasena: String,
}

/// Body of registration and of user create/update.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub nombre: String,
    pub apellidos: String,
    pub correo: String,
    pub rol: String,
    pub is_active: Option<bool>,
    /// Required on create; on update a blank or missing value keeps the
    /// current password.
    #[serde(rename = "contraseña", alias = "password", default)]
    pub contrasena: Option<String>,
}

impl UserRequest {
    pub fn into_parts(self) -> (UserInput, Option<String>) {
        (
            UserInput {
                first_name: self.nombre,
                last_names: self.apellidos,
                email: self.correo,
                role: self.rol,
                active: self.is_active,
            },
            self.contrasena,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio_compra: Option<Money>,
    pub precio_venta: Option<Money>,
    /// Initial stock; only honoured on create.
    pub stock: Option<i64>,
    #[serde(alias = "tUnidad")]
    pub tipo_unidad_id: Option<UnitTypeId>,
    pub proveedor_id: Option<SupplierId>,
    pub is_active: Option<bool>,
    pub imagen: Option<String>,
}

impl ProductRequest {
    pub fn into_parts(self) -> (ProductInput, Option<i64>, Option<SupplierId>) {
        (
            ProductInput {
                name: self.nombre,
                description: self.descripcion,
                purchase_price: self.precio_compra,
                sale_price: self.precio_venta,
                unit_type_id: self.tipo_unidad_id,
                active: self.is_active,
                image: self.imagen,
            },
            self.stock,
            self.proveedor_id,
        )
    }
}

/// Multipart text fields of a product form, keyed by field name.
pub type FormFields = HashMap<String, String>;

impl ProductRequest {
    /// Build from multipart text fields. Blank values count as absent, as
    /// browsers send empty inputs as `""`.
    pub fn from_form(fields: &FormFields) -> Result<Self, String> {
        Ok(Self {
            nombre: form_text(fields, &["nombre"]).unwrap_or_default().to_string(),
            descripcion: form_text(fields, &["descripcion"]).map(str::to_string),
            precio_compra: form_value(fields, &["precio_compra"])?,
            precio_venta: form_value(fields, &["precio_venta"])?,
            stock: form_value(fields, &["stock"])?,
            tipo_unidad_id: form_value(fields, &["tipo_unidad_id", "tUnidad"])?,
            proveedor_id: form_value(fields, &["proveedor_id"])?,
            is_active: form_value(fields, &["is_active"])?,
            imagen: form_text(fields, &["imagen"]).map(str::to_string),
        })
    }
}

fn form_text<'a>(fields: &'a FormFields, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn form_value<T>(fields: &FormFields, names: &[&str]) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    form_text(fields, names)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| format!("invalid value for {}: {e}", names[0]))
        })
        .transpose()
}

#[derive(Debug, Deserialize)]
pub struct UnitTypeRequest {
    pub nombre: String,
}

#[derive(Debug, Deserialize)]
pub struct PartyRequest {
    pub nombre: String,
    pub documento: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub is_active: Option<bool>,
    #[serde(alias = "tipoDocumento")]
    pub tipo_documento: Option<String>,
}

impl PartyRequest {
    pub fn into_supplier_input(self) -> PartyInput {
        self.into_client_input().party
    }

    pub fn into_client_input(self) -> ClientInput {
        ClientInput {
            party: PartyInput {
                name: self.nombre,
                email: self.correo,
                phone: self.telefono,
                address: self.direccion,
                document: self.documento,
                active: self.is_active,
            },
            document_type: self.tipo_documento,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub producto_id: ProductId,
    pub cantidad: i64,
    pub precio_unitario: Money,
}

impl From<LineRequest> for LineItem {
    fn from(line: LineRequest) -> Self {
        LineItem::new(line.producto_id, line.cantidad, line.precio_unitario)
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub proveedor_id: SupplierId,
    pub productos: Vec<LineRequest>,
}

impl From<PurchaseRequest> for NewPurchase {
    fn from(body: PurchaseRequest) -> Self {
        NewPurchase {
            supplier_id: body.proveedor_id,
            lines: body.productos.into_iter().map(LineItem::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub cliente_id: ClientId,
    pub vendedor_id: Option<UserId>,
    pub detalles: Vec<LineRequest>,
}

impl SaleRequest {
    /// The caller is recorded as seller unless the body names one.
    pub fn into_new_sale(self, caller: UserId) -> NewSale {
        NewSale {
            client_id: self.cliente_id,
            seller_id: Some(self.vendedor_id.unwrap_or(caller)),
            lines: self.detalles.into_iter().map(LineItem::from).collect(),
        }
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn user_to_json(user: &User) -> Value {
    let profile = &user.profile;
    json!({
        "id": user.id,
        "nombre": profile.first_name,
        "apellidos": profile.last_names,
        "correo": profile.email,
        "rol": profile.role,
        "is_active": profile.active,
    })
}

pub fn token_to_json(token: &AccessToken) -> Value {
    json!({
        "access_token": token.access_token,
        "token_type": token.token_type,
        "expires_at": token.expires_at.to_rfc3339(),
    })
}

pub fn product_to_json(product: &Product) -> Value {
    let details = product.details();
    json!({
        "id": product.id_typed(),
        "nombre": details.name,
        "descripcion": details.description,
        "precio_compra": details.purchase_price,
        "precio_venta": details.sale_price,
        "stock": product.stock(),
        "tipo_unidad_id": details.unit_type_id,
        "is_active": details.active,
        "imagen": details.image,
        "fecha_ingreso": product.registered_at().to_rfc3339(),
    })
}

pub fn unit_type_to_json(unit: &UnitType) -> Value {
    json!({ "id": unit.id, "nombre": unit.name })
}

pub fn supplier_to_json(supplier: &Supplier) -> Value {
    let details = &supplier.details;
    json!({
        "id": supplier.id,
        "nombre": details.name,
        "documento": details.document,
        "correo": details.contact.email,
        "telefono": details.contact.phone,
        "direccion": details.contact.address,
        "is_active": details.active,
    })
}

pub fn supplier_with_products_to_json(found: &SupplierWithProducts) -> Value {
    let mut value = supplier_to_json(&found.supplier);
    value["productos"] = found.products.iter().map(product_to_json).collect();
    value
}

pub fn client_to_json(client: &Client) -> Value {
    let details = &client.details;
    json!({
        "id": client.id,
        "nombre": details.name,
        "documento": details.document,
        "tipo_documento": details.document_type,
        "correo": details.contact.email,
        "telefono": details.contact.phone,
        "direccion": details.contact.address,
        "is_active": details.active,
    })
}

pub fn purchase_receipt_to_json<Id: serde::Serialize>(receipt: &OrderReceipt<Id>) -> Value {
    json!({
        "message": "Compra registrada correctamente",
        "orden_compra": receipt.order_number,
        "id": receipt.id,
        "total": receipt.total,
    })
}

pub fn sale_receipt_to_json<Id: serde::Serialize>(receipt: &OrderReceipt<Id>) -> Value {
    json!({
        "message": "Venta registrada correctamente",
        "orden_venta": receipt.order_number,
        "id": receipt.id,
        "total": receipt.total,
    })
}

fn party_summary_to_json(party: Option<&PartySummary>) -> Value {
    match party {
        Some(p) => json!({
            "id": p.id,
            "nombre": p.name,
            "documento": p.document,
            "correo": p.email,
            "telefono": p.phone,
        }),
        None => Value::Null,
    }
}

fn seller_to_json(seller: Option<&SellerSummary>) -> Value {
    match seller {
        Some(s) => json!({ "id": s.id, "nombre": s.name }),
        None => Value::Null,
    }
}

fn line_to_json(line: &OrderLineView) -> Value {
    json!({
        "id": line.id,
        "producto": {
            "id": line.product_id,
            "nombre": line.product_name,
        },
        "cantidad": line.quantity,
        "precio_unitario": line.unit_price,
        "total": line.total,
    })
}

pub fn purchase_to_json(purchase: &PurchaseDetail) -> Value {
    json!({
        "id": purchase.id,
        "orden_compra": purchase.order_number,
        "fecha": purchase.created_at.to_rfc3339(),
        "proveedor": party_summary_to_json(purchase.supplier.as_ref()),
        "detalles": purchase.lines.iter().map(line_to_json).collect::<Vec<_>>(),
        "total": purchase.total,
    })
}

pub fn sale_to_json(sale: &SaleDetail) -> Value {
    json!({
        "id": sale.id,
        "orden_venta": sale.order_number,
        "fecha": sale.created_at.to_rfc3339(),
        "cliente": party_summary_to_json(sale.client.as_ref()),
        "vendedor": seller_to_json(sale.seller.as_ref()),
        "detalles": sale.lines.iter().map(line_to_json).collect::<Vec<_>>(),
        "total": sale.total,
    })
}

pub fn preview_to_json(preview: &OrderNumberPreview) -> Value {
    json!({
        "numero_orden": preview.next,
        "estimado_por_id": preview.id_estimate,
        "provisional": preview.provisional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_without_seller_records_the_caller() {
        let body: SaleRequest = serde_json::from_value(json!({
            "cliente_id": 3,
            "detalles": [{ "producto_id": 1, "cantidad": 2, "precio_unitario": 10.0 }]
        }))
        .unwrap();
        let sale = body.into_new_sale(UserId::new(9));
        assert_eq!(sale.seller_id, Some(UserId::new(9)));
        assert_eq!(sale.lines[0].unit_price, Money::parse("10").unwrap());
    }

    #[test]
    fn legacy_field_spellings_are_accepted() {
        let product: ProductRequest =
            serde_json::from_value(json!({ "nombre": "Arroz", "tUnidad": 2 })).unwrap();
        assert_eq!(product.tipo_unidad_id, Some(UnitTypeId::new(2)));

        let client: PartyRequest =
            serde_json::from_value(json!({ "nombre": "Rosa", "tipoDocumento": "RUC" })).unwrap();
        assert_eq!(client.into_client_input().document_type.as_deref(), Some("RUC"));

        let mut form = FormFields::new();
        form.insert("nombre".into(), "Galletas Soda".into());
        form.insert("tUnidad".into(), "3".into());
        form.insert("precio_venta".into(), "1.50".into());
        form.insert("proveedor_id".into(), "".into());
        let product = ProductRequest::from_form(&form).unwrap();
        assert_eq!(product.tipo_unidad_id, Some(UnitTypeId::new(3)));
        assert_eq!(product.precio_venta, Some(Money::from_cents(150).unwrap()));
        assert_eq!(product.proveedor_id, None);

        form.insert("stock".into(), "muchos".into());
        assert!(ProductRequest::from_form(&form).unwrap_err().contains("stock"));

        let login: LoginRequest =
            serde_json::from_value(json!({ "correo": "a@b.pe", "contraseña": "123456" })).unwrap();
        assert_eq!(login.contrasena, "123456");
    }
}
