//! Partition resolution
//!
//! Scans the store's raw group-membership rows for the first
//! (account, group) combination that is allowed to own new contact
//! records. Rows missing any identifying field, or whose visibility
//! flag does not parse as a positive integer, are skipped.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::ContactStore;

/// The (account, group) pair eligible to receive new contact records.
///
/// Resolved fresh on every provisioning attempt; the eligible partition
/// can change between sessions, so callers must not cache it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub group_id: String,
    pub account_name: String,
    pub account_type: String,
}

/// Find an eligible partition, if any.
///
/// Consumes the group-membership stream only as far as the first
/// eligible row; the cursor is released when the stream is dropped.
/// Exhausting the scan without a hit is a legitimate outcome
/// (`Ok(None)`), not an error — the caller must refuse provisioning.
pub async fn resolve(store: &dyn ContactStore) -> Result<Option<Partition>, StoreError> {
    let mut rows = store.group_membership_rows();

    while let Some(row) = rows.next().await {
        let row = row?;
        let visible = row
            .visible
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v > 0)
            .unwrap_or(false);

        if let (Some(group_id), Some(account_name), Some(account_type)) =
            (row.group_id, row.account_name, row.account_type)
        {
            if visible {
                debug!(%group_id, %account_name, "eligible partition found");
                return Ok(Some(Partition {
                    group_id,
                    account_name,
                    account_type,
                }));
            }
        }
    }

    debug!("group membership scan exhausted without an eligible partition");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ContactRow, GroupMembershipRow, MessageRow, RowStream, WriteOp,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store stub serving a fixed list of group-membership rows and
    /// counting how many of them were actually pulled.
    struct GroupRowStore {
        rows: Vec<GroupMembershipRow>,
        pulled: AtomicUsize,
    }

    impl GroupRowStore {
        fn new(rows: Vec<GroupMembershipRow>) -> Self {
            Self {
                rows,
                pulled: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContactStore for GroupRowStore {
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
            let rows = self.rows.clone();
            Box::pin(futures::stream::iter(rows.into_iter().map(Ok)).inspect(|_| {
                self.pulled.fetch_add(1, Ordering::SeqCst);
            }))
        }

        async fn apply_batch(&self, _ops: &[WriteOp]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn profile_name(&self) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
    }

    fn full_row(group: &str, visible: &str) -> GroupMembershipRow {
        GroupMembershipRow {
            group_id: Some(group.to_string()),
            account_name: Some("me@example.com".to_string()),
            account_type: Some("com.example".to_string()),
            visible: Some(visible.to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_eligible_row_wins() {
        let store = GroupRowStore::new(vec![full_row("g1", "1"), full_row("g2", "1")]);
        let p = resolve(&store).await.unwrap().unwrap();
        assert_eq!(p.group_id, "g1");
    }

    #[tokio::test]
    async fn test_scan_stops_at_first_hit() {
        let store = GroupRowStore::new(vec![
            full_row("g1", "1"),
            full_row("g2", "1"),
            full_row("g3", "1"),
        ]);
        resolve(&store).await.unwrap().unwrap();
        assert_eq!(store.pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skips_rows_missing_fields() {
        let mut incomplete = full_row("g1", "1");
        incomplete.account_name = None;
        let store = GroupRowStore::new(vec![incomplete, full_row("g2", "1")]);
        let p = resolve(&store).await.unwrap().unwrap();
        assert_eq!(p.group_id, "g2");
    }

    #[tokio::test]
    async fn test_skips_invisible_and_garbage_flags() {
        let store = GroupRowStore::new(vec![
            full_row("g1", "0"),
            full_row("g2", "-3"),
            full_row("g3", "soon"),
            GroupMembershipRow {
                visible: None,
                ..full_row("g4", "1")
            },
            full_row("g5", "2"),
        ]);
        let p = resolve(&store).await.unwrap().unwrap();
        assert_eq!(p.group_id, "g5");
    }

    #[tokio::test]
    async fn test_exhausted_scan_is_none() {
        let store = GroupRowStore::new(vec![full_row("g1", "0")]);
        assert_eq!(resolve(&store).await.unwrap(), None);

        let empty = GroupRowStore::new(vec![]);
        assert_eq!(resolve(&empty).await.unwrap(), None);
    }
}
