//! External contact/message store interface
//!
//! The engine is store-agnostic: everything it reads or writes goes
//! through [`ContactStore`]. Row scans are exposed as lazy, finite,
//! non-restartable streams; dropping a stream releases the underlying
//! cursor, so an early exit from a scan never leaks store resources.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Lazy row cursor over a store query. Finite, not restartable.
pub type RowStream<'a, T> = BoxStream<'a, Result<T, StoreError>>;

/// Field names understood by [`WriteOp`] and the store's attribute rows.
pub mod fields {
    pub const MIMETYPE: &str = "mimetype";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const ACCOUNT_TYPE: &str = "account_type";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PHONE_TYPE: &str = "phone_type";
    pub const GROUP_ID: &str = "group_id";
}

/// Mimetype markers distinguishing attribute-row kinds, mirroring the
/// store's generic entity-attribute-value schema.
pub mod mimetypes {
    pub const STRUCTURED_NAME: &str = "vnd.addbook/name";
    pub const PHONE: &str = "vnd.addbook/phone";
    pub const GROUP_MEMBERSHIP: &str = "vnd.addbook/group_membership";
}

/// Phone type tag applied to provisioned numbers.
pub const PHONE_TYPE_MOBILE: &str = "mobile";

/// An inbound message row: body, sender address, timestamp (epoch ms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub body: String,
    pub address: String,
    pub date: i64,
}

/// A visible contact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRow {
    /// Store-assigned row identifier; insertion order is the only
    /// recency signal the store exposes.
    pub id: i64,
    pub display_name: String,
    /// Stable key for navigating to the contact's detail view.
    pub lookup_key: String,
}

/// A raw group-membership attribute row as returned by the store.
///
/// Any of the identifying fields may be absent; the partition resolver
/// decides eligibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembershipRow {
    pub group_id: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
    /// Visibility flag, kept as the store's raw string form.
    pub visible: Option<String>,
}

/// Which table a [`WriteOp`] inserts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordTarget {
    /// The identity table (one row per contact, owned by an account)
    Identity,
    /// The attribute table (mimetype-tagged rows referencing an identity)
    Attribute,
}

/// One insert within an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOp {
    pub target: RecordTarget,
    /// Index of an earlier op in the same batch whose generated
    /// identity id must be substituted in at apply time.
    pub back_reference: Option<usize>,
    pub fields: Vec<(String, String)>,
}

impl WriteOp {
    /// Start a new insert against the given target.
    pub fn insert(target: RecordTarget) -> Self {
        Self {
            target,
            back_reference: None,
            fields: Vec::new(),
        }
    }

    /// Attach a field value.
    pub fn with_value(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }

    /// Reference the identity generated by op `index` in this batch.
    pub fn with_back_reference(mut self, index: usize) -> Self {
        self.back_reference = Some(index);
        self
    }

    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| f == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Abstract contact/message store.
///
/// Read methods are side-effect free. `apply_batch` is the single
/// mutation point and must be all-or-nothing: either every op in the
/// batch takes effect or none do.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Inbound messages, newest first.
    fn inbound_messages(&self) -> RowStream<'_, MessageRow>;

    /// Visible contacts, store row id descending (newest-added first).
    fn visible_contacts(&self) -> RowStream<'_, ContactRow>;

    /// Resolve a phone number to an existing contact's display name.
    /// At most one match is consumed.
    async fn reverse_lookup(&self, number: &str) -> Result<Option<String>, StoreError>;

    /// Raw group-membership attribute rows, in store order.
    fn group_membership_rows(&self) -> RowStream<'_, GroupMembershipRow>;

    /// Apply an ordered batch atomically, resolving back-references to
    /// the identity generated earlier in the same batch.
    async fn apply_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// Best-effort display name of the store's owner profile.
    async fn profile_name(&self) -> Result<Option<String>, StoreError>;
}
