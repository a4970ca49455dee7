//! Error types for the provisioning engine

use thiserror::Error;

/// Errors surfaced by a [`crate::store::ContactStore`] implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed an operation
    #[error("store backend error: {0}")]
    Backend(String),

    /// A write batch violated the batch contract (bad back-reference,
    /// attribute op without a parent, etc.)
    #[error("malformed batch: {0}")]
    MalformedBatch(String),
}

/// Errors from a candidate source scan
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan was cancelled before completion; no candidates were
    /// delivered
    #[error("scan cancelled")]
    Cancelled,

    /// The underlying store failed mid-scan
    #[error(transparent)]
    Store(#[from] StoreError),
}
