//! # Addbook Core Library
//!
//! Contact provisioning engine:
//! - Candidate source readers (recent inbox, recent contacts)
//! - Partition resolution (which account/group may receive new records)
//! - Transaction building and atomic apply against an external store
//! - Input normalization (phone/name validation, capitalization)
//! - Injected preference store for the remembered sender name
//!
//! The engine performs no I/O of its own; all store access goes through
//! the [`store::ContactStore`] trait.

pub mod candidates;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod partition;
pub mod prefs;
pub mod store;
pub mod txn;

pub use candidates::{Candidate, CandidateOrigin, Selection};
pub use engine::{Provisioner, ProvisioningResult, Refusal};
pub use error::{ScanError, StoreError};
pub use partition::Partition;
pub use store::ContactStore;
pub use txn::ProvisioningTransaction;
