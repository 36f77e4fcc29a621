use serde::{Deserialize, Serialize};

use almacen_core::{
    ClientId, DomainResult, Entity, ProductId, SupplierId, optional_text, require_email,
    require_text,
};

/// Document type recorded for clients that do not state one.
pub const DEFAULT_DOCUMENT_TYPE: &str = "DNI";

/// Contact information shared by suppliers and clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    /// Validate raw contact fields; blank values are dropped.
    pub fn new(
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> DomainResult<Self> {
        let email = match email.map(str::trim) {
            None | Some("") => None,
            Some(e) => Some(require_email("email", e)?),
        };
        Ok(Self {
            email,
            phone: optional_text("phone", phone, 20)?,
            address: optional_text("address", address, 100)?,
        })
    }
}

/// Fields accepted when creating or replacing a supplier or client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartyInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub document: Option<String>,
    pub active: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Suppliers
// ─────────────────────────────────────────────────────────────────────────────

/// Validated supplier attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDetails {
    pub name: String,
    pub document: Option<String>,
    pub contact: ContactInfo,
    pub active: bool,
}

impl SupplierDetails {
    pub fn from_input(input: PartyInput) -> DomainResult<Self> {
        Ok(Self {
            name: require_text("name", &input.name, 100)?,
            document: optional_text("document", input.document.as_deref(), 100)?,
            contact: ContactInfo::new(
                input.email.as_deref(),
                input.phone.as_deref(),
                input.address.as_deref(),
            )?,
            active: input.active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub details: SupplierDetails,
}

impl Supplier {
    pub fn name(&self) -> &str {
        &self.details.name
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> SupplierId {
        self.id
    }
}

/// Many-to-many association between a supplier and a product it provides.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupplierProductLink {
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Clients
// ─────────────────────────────────────────────────────────────────────────────

/// Client fields: the shared party fields plus a document type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientInput {
    #[serde(flatten)]
    pub party: PartyInput,
    pub document_type: Option<String>,
}

/// Validated client attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub name: String,
    pub document: Option<String>,
    pub document_type: String,
    pub contact: ContactInfo,
    pub active: bool,
}

impl ClientDetails {
    pub fn from_input(input: ClientInput) -> DomainResult<Self> {
        let party = input.party;
        let document_type = optional_text("document type", input.document_type.as_deref(), 50)?
            .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());
        Ok(Self {
            name: require_text("name", &party.name, 100)?,
            document: optional_text("document", party.document.as_deref(), 100)?,
            document_type,
            contact: ContactInfo::new(
                party.email.as_deref(),
                party.phone.as_deref(),
                party.address.as_deref(),
            )?,
            active: party.active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub details: ClientDetails,
}

impl Client {
    pub fn name(&self) -> &str {
        &self.details.name
    }
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> ClientId {
        self.id
    }
}
