//! Parties domain module (suppliers and clients).
//!
//! Counterparties of purchases and sales, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod party;

pub use party::{
    Client, ClientDetails, ClientInput, ContactInfo, DEFAULT_DOCUMENT_TYPE, PartyInput, Supplier,
    SupplierDetails, SupplierProductLink,
};
