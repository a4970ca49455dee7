//! Candidate source readers
//!
//! Two read-only enumerators over the external store:
//! - recent inbound messages (newest first, capped), each enriched
//!   with the sender's existing contact name when one resolves
//! - existing contacts in reverse-creation order (row-id proxy)
//!
//! Both run off the interactive path and honor a cancellation token
//! between rows; a cancelled scan delivers no candidates.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::normalize::is_numeric_label;
use crate::store::ContactStore;

/// Upper bound on inbox rows considered per scan.
pub const INBOX_SCAN_LIMIT: usize = 50;

/// Where a candidate was surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateOrigin {
    Inbox,
    ExistingContact,
}

/// A prospective contact source surfaced to the user.
///
/// Ephemeral: produced by one scan, consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// What the user sees: resolved contact name or raw number for
    /// inbox rows, ordinal-prefixed display name for contact rows.
    pub label: String,
    /// Inbox rows: the message body (the prospective contact name).
    /// Contact rows: the unprefixed display name.
    pub payload: String,
    pub origin: CandidateOrigin,
    /// Stable navigation key, present for existing-contact candidates.
    pub lookup_key: Option<String>,
}

/// Outcome of the user picking a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// The sender is not in the contact store yet; provision with this
    /// (name, phone) pair.
    NewContact { name: String, phone: String },
    /// The sender already resolved to a contact; refuse the duplicate
    /// and tell the user who it is.
    AlreadyExists { name: String },
}

/// Classify a picked candidate as provisionable or a duplicate.
///
/// An inbox label that is still a bare number means the reverse lookup
/// found no existing contact, so the pair (message body, number) is
/// provisionable. Anything else already names a contact.
pub fn classify(candidate: &Candidate) -> Selection {
    match candidate.origin {
        CandidateOrigin::Inbox if is_numeric_label(&candidate.label) => Selection::NewContact {
            name: candidate.payload.clone(),
            phone: candidate.label.clone(),
        },
        CandidateOrigin::Inbox => Selection::AlreadyExists {
            name: candidate.label.clone(),
        },
        CandidateOrigin::ExistingContact => Selection::AlreadyExists {
            name: candidate.payload.clone(),
        },
    }
}

/// Enumerate recent inbound messages as provisioning candidates.
///
/// At most [`INBOX_SCAN_LIMIT`] rows, newest first. A failed reverse
/// lookup falls back to the raw number and never aborts the scan.
/// Zero rows is an empty list, not an error.
pub async fn inbox_candidates(
    store: &dyn ContactStore,
    cancel: &CancellationToken,
) -> Result<Vec<Candidate>, ScanError> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let mut out = Vec::new();
    let mut rows = store.inbound_messages().take(INBOX_SCAN_LIMIT);

    while let Some(row) = rows.next().await {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let row = row?;

        let label = match store.reverse_lookup(&row.address).await {
            Ok(Some(name)) => name,
            Ok(None) => row.address.clone(),
            Err(e) => {
                warn!(address = %row.address, error = %e, "reverse lookup failed, using raw number");
                row.address.clone()
            }
        };

        out.push(Candidate {
            label,
            payload: row.body,
            origin: CandidateOrigin::Inbox,
            lookup_key: None,
        });
    }

    // A cancel that lands after the last row still discards the scan:
    // the caller tearing down must see no late delivery.
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    debug!(count = out.len(), "inbox scan complete");
    Ok(out)
}

/// Enumerate existing contacts, most recently added first.
///
/// Labels are ordinal-prefixed ("1. Alice") so the recency order is
/// visible to the user. Ordering uses the store's row identifier as a
/// creation-time proxy; no true creation timestamp is exposed.
pub async fn contact_candidates(
    store: &dyn ContactStore,
    cancel: &CancellationToken,
) -> Result<Vec<Candidate>, ScanError> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let mut out = Vec::new();
    let mut rows = store.visible_contacts();

    while let Some(row) = rows.next().await {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let row = row?;

        out.push(Candidate {
            label: format!("{}. {}", out.len() + 1, row.display_name),
            payload: row.display_name,
            origin: CandidateOrigin::ExistingContact,
            lookup_key: Some(row.lookup_key),
        });
    }

    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    debug!(count = out.len(), "contact scan complete");
    Ok(out)
}
