//! # Addbook SQLite Store
//!
//! Reference implementation of the [`addbook_core::ContactStore`] and
//! [`addbook_core::prefs::Preferences`] interfaces over SQLite,
//! modeling the phone-side stores the provisioning engine talks to:
//! - `messages`: the inbound/outbound message log
//! - `raw_contacts` + `data`: identity rows plus mimetype-tagged
//!   attribute rows (the generic entity-attribute-value shape)
//! - `settings`: key-value preferences
//! - `profile`: the owner's display name
//!
//! The store's atomic batch-apply with back-reference resolution is
//! simulated with a single SQL transaction: insert the identity, read
//! back its generated rowid, substitute it into the dependent inserts,
//! and roll everything back on any failure.

mod prefs;
mod schema;
mod store;

pub use store::SqliteStore;
