//! Provisioning engine
//!
//! Drives one provisioning attempt through its state machine:
//! `Idle → Validating → ResolvingPartition → Building → Applying`
//! ending in `Succeeded`, `Refused`, or `Failed`. No state survives an
//! attempt; in particular the partition is re-resolved every time
//! because the store's eligible partition can change between sessions.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::candidates::{self, Candidate};
use crate::error::ScanError;
use crate::normalize::{capitalize, validate_name, validate_phone};
use crate::partition;
use crate::store::ContactStore;
use crate::txn::ProvisioningTransaction;

/// Why a provisioning attempt was refused before any write was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Refusal {
    InvalidName,
    InvalidPhone,
    NoEligiblePartition,
}

impl Refusal {
    /// User-visible explanation for the refusal.
    pub fn user_message(&self) -> &'static str {
        match self {
            Refusal::InvalidName => "Enter contact name.",
            Refusal::InvalidPhone => "Check that phone number is 10 digits.",
            Refusal::NoEligiblePartition => {
                "Unable to find valid contact group. This function may not work for you."
            }
        }
    }
}

/// Terminal outcome of one provisioning attempt.
///
/// All three outcomes are reported as values, never as panics or
/// opaque faults, and none triggers an automatic retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProvisioningResult {
    /// All four records now exist and are linked. Carries the stored
    /// (capitalized) display name.
    Succeeded { name: String },
    /// Refused before any write; recoverable by re-entry except for
    /// `NoEligiblePartition`.
    Refused(Refusal),
    /// The store rejected the batch or failed mid-flow; none of the
    /// records exist. Cause is not classified further.
    Failed { reason: String },
}

/// Provisioning flow states, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    Validating,
    ResolvingPartition,
    Building,
    Applying,
}

/// The contact provisioning engine.
///
/// Cheap to clone; the store is shared.
#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn ContactStore>,
}

impl Provisioner {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    fn enter(state: FlowState) {
        debug!(state = ?state, "provisioning state");
    }

    /// Run one provisioning attempt for a (name, phone) pair.
    ///
    /// The name is capitalized after validation; the phone must already
    /// be a bare 10-digit string. Two calls with identical input create
    /// two distinct records: idempotence is intentionally not provided.
    pub async fn provision(&self, name: &str, phone: &str) -> ProvisioningResult {
        Self::enter(FlowState::Validating);
        if !validate_name(name) {
            return ProvisioningResult::Refused(Refusal::InvalidName);
        }
        if !validate_phone(phone) {
            return ProvisioningResult::Refused(Refusal::InvalidPhone);
        }
        let display_name = capitalize(name);

        Self::enter(FlowState::ResolvingPartition);
        let partition = match partition::resolve(self.store.as_ref()).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                info!("provisioning refused: no eligible partition");
                return ProvisioningResult::Refused(Refusal::NoEligiblePartition);
            }
            Err(e) => {
                warn!(error = %e, "partition scan failed");
                return ProvisioningResult::Failed {
                    reason: e.to_string(),
                };
            }
        };

        Self::enter(FlowState::Building);
        let txn = ProvisioningTransaction::build(&display_name, phone, &partition);

        Self::enter(FlowState::Applying);
        match self.store.apply_batch(txn.ops()).await {
            Ok(()) => {
                info!(name = %display_name, "contact provisioned");
                ProvisioningResult::Succeeded { name: display_name }
            }
            Err(e) => {
                warn!(error = %e, "batch apply rejected");
                ProvisioningResult::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Recent inbound messages as candidates (inline scan).
    pub async fn list_inbox_candidates(&self) -> Result<Vec<Candidate>, ScanError> {
        candidates::inbox_candidates(self.store.as_ref(), &CancellationToken::new()).await
    }

    /// Existing contacts as candidates, newest-added first (inline scan).
    pub async fn list_contact_candidates(&self) -> Result<Vec<Candidate>, ScanError> {
        candidates::contact_candidates(self.store.as_ref(), &CancellationToken::new()).await
    }

    /// Run the inbox scan as a background task under the caller's
    /// cancellation token. Cancelling delivers `ScanError::Cancelled`
    /// from the joined handle; no candidates leak out.
    pub fn spawn_inbox_scan(
        &self,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Vec<Candidate>, ScanError>> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { candidates::inbox_candidates(store.as_ref(), &cancel).await })
    }

    /// Run the contact scan as a background task under the caller's
    /// cancellation token.
    pub fn spawn_contact_scan(
        &self,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Vec<Candidate>, ScanError>> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { candidates::contact_candidates(store.as_ref(), &cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{
        fields, ContactRow, GroupMembershipRow, MessageRow, RowStream, WriteOp,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store stub with one configurable group row, recording every
    /// batch it is asked to apply.
    struct RecordingStore {
        group_rows: Vec<GroupMembershipRow>,
        reject_apply: bool,
        applied: Mutex<Vec<Vec<WriteOp>>>,
    }

    impl RecordingStore {
        fn with_partition() -> Self {
            Self {
                group_rows: vec![GroupMembershipRow {
                    group_id: Some("6".to_string()),
                    account_name: Some("me@example.com".to_string()),
                    account_type: Some("com.example".to_string()),
                    visible: Some("1".to_string()),
                }],
                reject_apply: false,
                applied: Mutex::new(Vec::new()),
            }
        }

        fn without_partition() -> Self {
            Self {
                group_rows: Vec::new(),
                reject_apply: false,
                applied: Mutex::new(Vec::new()),
            }
        }

        fn apply_count(&self) -> usize {
            self.applied.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ContactStore for RecordingStore {
        fn inbound_messages(&self) -> RowStream<'_, MessageRow> {
            Box::pin(futures::stream::empty())
        }

        fn visible_contacts(&self) -> RowStream<'_, ContactRow> {
            Box::pin(futures::stream::empty())
        }

        async fn reverse_lookup(&self, _number: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn group_membership_rows(&self) -> RowStream<'_, GroupMembershipRow> {
            Box::pin(futures::stream::iter(
                self.group_rows.clone().into_iter().map(Ok),
            ))
        }

        async fn apply_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
            if self.reject_apply {
                return Err(StoreError::Backend("constraint violation".to_string()));
            }
            self.applied.lock().unwrap().push(ops.to_vec());
            Ok(())
        }

        async fn profile_name(&self) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
    }

    fn engine(store: RecordingStore) -> (Provisioner, Arc<RecordingStore>) {
        let store = Arc::new(store);
        (Provisioner::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_invalid_input_refused_without_writes() {
        let (p, store) = engine(RecordingStore::with_partition());

        assert_eq!(
            p.provision("", "5551234567").await,
            ProvisioningResult::Refused(Refusal::InvalidName)
        );
        assert_eq!(
            p.provision("Jo", "555-123-4567").await,
            ProvisioningResult::Refused(Refusal::InvalidPhone)
        );
        assert_eq!(
            p.provision("Jo", "12345").await,
            ProvisioningResult::Refused(Refusal::InvalidPhone)
        );
        assert_eq!(store.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_no_partition_refused_without_writes() {
        let (p, store) = engine(RecordingStore::without_partition());

        assert_eq!(
            p.provision("Jo", "5551234567").await,
            ProvisioningResult::Refused(Refusal::NoEligiblePartition)
        );
        assert_eq!(store.apply_count(), 0);
    }

    #[tokio::test]
    async fn test_success_applies_capitalized_name() {
        let (p, store) = engine(RecordingStore::with_partition());

        let got = p.provision("jo smith", "5551234567").await;
        assert_eq!(
            got,
            ProvisioningResult::Succeeded {
                name: "Jo Smith ".to_string()
            }
        );

        let applied = store.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        let ops = &applied[0];
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[1].field(fields::DISPLAY_NAME), Some("Jo Smith "));
        assert_eq!(ops[3].field(fields::GROUP_ID), Some("6"));
    }

    #[tokio::test]
    async fn test_apply_rejection_is_failed() {
        let mut store = RecordingStore::with_partition();
        store.reject_apply = true;
        let (p, _) = engine(store);

        match p.provision("Jo", "5551234567").await {
            ProvisioningResult::Failed { reason } => {
                assert!(reason.contains("constraint violation"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeat_provision_is_not_deduplicated() {
        let (p, store) = engine(RecordingStore::with_partition());

        p.provision("Jo", "5551234567").await;
        p.provision("Jo", "5551234567").await;
        // two attempts, two applied batches; dedup is out of scope
        assert_eq!(store.apply_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_spawned_scan_joins_with_cancelled() {
        let (p, _) = engine(RecordingStore::with_partition());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let handle = p.spawn_inbox_scan(cancel);

        let joined = handle.await.expect("scan task must not panic");
        assert!(matches!(joined, Err(ScanError::Cancelled)));
    }

    #[tokio::test]
    async fn test_refusal_messages_match_ui_copy() {
        assert_eq!(Refusal::InvalidName.user_message(), "Enter contact name.");
        assert_eq!(
            Refusal::InvalidPhone.user_message(),
            "Check that phone number is 10 digits."
        );
        assert!(Refusal::NoEligiblePartition
            .user_message()
            .starts_with("Unable to find valid contact group."));
    }
}
