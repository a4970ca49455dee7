//! SQLite-backed contact/message store

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use addbook_core::store::{
    fields, mimetypes, ContactRow, GroupMembershipRow, MessageRow, RecordTarget, RowStream,
    WriteOp,
};
use addbook_core::{ContactStore, StoreError};
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::schema;

/// Map a sqlx error onto the engine's store error type.
pub(crate) fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// SQLite implementation of [`ContactStore`].
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a file-backed store.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        Self::connect(&url).await
    }

    /// Open a fresh in-memory store.
    ///
    /// Uses a uniquely named shared-cache memory database so every
    /// pooled connection sees the same data; a plain `:memory:` URL
    /// gives each pooled connection its own empty database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let name = Uuid::new_v4().simple().to_string();
        let url = format!("sqlite:file:addbook-{name}?mode=memory&cache=shared");
        Self::connect(&url).await
    }

    async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(5000));

        // min_connections(1) with no idle timeout keeps one connection
        // alive so a shared-cache memory database is not dropped
        // between operations.
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;

        schema::create_all_tables(&pool).await?;
        info!(%url, "contact store opened");
        Ok(Self { pool })
    }

    /// Direct pool access for consumers that need ad-hoc queries
    /// (tests, the excluded UI layer's detail views).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a message. `date` is epoch milliseconds; `None` means now.
    pub async fn insert_message(
        &self,
        body: &str,
        address: &str,
        date: Option<i64>,
        inbound: bool,
    ) -> Result<(), StoreError> {
        let date = date.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        sqlx::query("INSERT INTO messages (body, address, date, inbound) VALUES (?, ?, ?, ?)")
            .bind(body)
            .bind(address)
            .bind(date)
            .bind(inbound as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Seed a standalone group-membership attribute row (the rows the
    /// partition resolver scans). Absent fields are stored as NULL.
    pub async fn insert_group_membership(
        &self,
        group_id: Option<&str>,
        account_name: Option<&str>,
        account_type: Option<&str>,
        visible: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO data (mimetype, group_id, account_name, account_type, visible)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(mimetypes::GROUP_MEMBERSHIP)
        .bind(group_id)
        .bind(account_name)
        .bind(account_type)
        .bind(visible)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Set the owner profile's display name.
    pub async fn set_profile_name(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profile (id, display_name) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Reject batches that the apply loop could not resolve, before
    /// any write is issued.
    fn validate_batch(ops: &[WriteOp]) -> Result<(), StoreError> {
        for (index, op) in ops.iter().enumerate() {
            match op.target {
                RecordTarget::Identity => {
                    if op.back_reference.is_some() {
                        return Err(StoreError::MalformedBatch(format!(
                            "identity op {index} carries a back-reference"
                        )));
                    }
                }
                RecordTarget::Attribute => {
                    let valid = op
                        .back_reference
                        .map(|r| r < index && ops[r].target == RecordTarget::Identity)
                        .unwrap_or(false);
                    if !valid {
                        return Err(StoreError::MalformedBatch(format!(
                            "attribute op {index} must back-reference an earlier identity op"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    fn inbound_messages(&self) -> RowStream<'_, MessageRow> {
        let pool = self.pool.clone();
        Box::pin(async_stream::stream! {
            let mut rows = sqlx::query_as::<_, (String, String, i64)>(
                "SELECT body, address, date FROM messages WHERE inbound = 1 ORDER BY date DESC",
            )
            .fetch(&pool);

            while let Some(row) = rows.next().await {
                match row {
                    Ok((body, address, date)) => yield Ok(MessageRow { body, address, date }),
                    Err(e) => {
                        yield Err(backend(e));
                        return;
                    }
                }
            }
        })
    }

    fn visible_contacts(&self) -> RowStream<'_, ContactRow> {
        let pool = self.pool.clone();
        Box::pin(async_stream::stream! {
            // Row id descending stands in for most-recently-added
            // order; the store keeps no creation timestamp. A contact
            // is visible only through a membership in a group whose
            // standalone row (raw_contact_id IS NULL) has a positive
            // visible flag.
            let mut rows = sqlx::query_as::<_, (i64, String, String)>(
                r#"
                SELECT rc.id, COALESCE(d.display_name, ''), rc.lookup_key
                FROM raw_contacts rc
                JOIN data d
                    ON d.raw_contact_id = rc.id
                    AND d.mimetype = ?
                WHERE EXISTS (
                    SELECT 1 FROM data g
                    JOIN data grp
                        ON grp.group_id = g.group_id
                        AND grp.mimetype = g.mimetype
                        AND grp.raw_contact_id IS NULL
                        AND CAST(grp.visible AS INTEGER) > 0
                    WHERE g.raw_contact_id = rc.id
                      AND g.mimetype = ?
                )
                ORDER BY rc.id DESC
                "#,
            )
            .bind(mimetypes::STRUCTURED_NAME)
            .bind(mimetypes::GROUP_MEMBERSHIP)
            .fetch(&pool);

            while let Some(row) = rows.next().await {
                match row {
                    Ok((id, display_name, lookup_key)) => {
                        yield Ok(ContactRow { id, display_name, lookup_key })
                    }
                    Err(e) => {
                        yield Err(backend(e));
                        return;
                    }
                }
            }
        })
    }

    async fn reverse_lookup(&self, number: &str) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar::<_, String>(
            r#"
            SELECT n.display_name
            FROM data p
            JOIN data n
                ON n.raw_contact_id = p.raw_contact_id
                AND n.mimetype = ?
            WHERE p.mimetype = ?
              AND p.phone_number = ?
            LIMIT 1
            "#,
        )
        .bind(mimetypes::STRUCTURED_NAME)
        .bind(mimetypes::PHONE)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(name)
    }

    fn group_membership_rows(&self) -> RowStream<'_, GroupMembershipRow> {
        let pool = self.pool.clone();
        Box::pin(async_stream::stream! {
            let mut rows = sqlx::query_as::<
                _,
                (Option<String>, Option<String>, Option<String>, Option<String>),
            >(
                r#"
                SELECT group_id, account_name, account_type, visible
                FROM data
                WHERE mimetype = ?
                ORDER BY id
                "#,
            )
            .bind(mimetypes::GROUP_MEMBERSHIP)
            .fetch(&pool);

            while let Some(row) = rows.next().await {
                match row {
                    Ok((group_id, account_name, account_type, visible)) => {
                        yield Ok(GroupMembershipRow {
                            group_id,
                            account_name,
                            account_type,
                            visible,
                        })
                    }
                    Err(e) => {
                        yield Err(backend(e));
                        return;
                    }
                }
            }
        })
    }

    async fn apply_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        Self::validate_batch(ops)?;

        // One transaction for the whole batch; dropping `tx` on any
        // early return rolls every insert back.
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut identity_ids: HashMap<usize, i64> = HashMap::new();

        for (index, op) in ops.iter().enumerate() {
            match op.target {
                RecordTarget::Identity => {
                    let lookup_key = Uuid::new_v4().to_string();
                    let result = sqlx::query(
                        "INSERT INTO raw_contacts (account_name, account_type, lookup_key) VALUES (?, ?, ?)",
                    )
                    .bind(op.field(fields::ACCOUNT_NAME))
                    .bind(op.field(fields::ACCOUNT_TYPE))
                    .bind(&lookup_key)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;

                    identity_ids.insert(index, result.last_insert_rowid());
                }
                RecordTarget::Attribute => {
                    let parent = op
                        .back_reference
                        .and_then(|r| identity_ids.get(&r))
                        .copied()
                        .ok_or_else(|| {
                            StoreError::MalformedBatch(format!(
                                "attribute op {index} references an unresolved identity"
                            ))
                        })?;

                    sqlx::query(
                        r#"
                        INSERT INTO data
                            (raw_contact_id, mimetype, display_name, phone_number, phone_type, group_id)
                        VALUES (?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(parent)
                    .bind(op.field(fields::MIMETYPE))
                    .bind(op.field(fields::DISPLAY_NAME))
                    .bind(op.field(fields::PHONE_NUMBER))
                    .bind(op.field(fields::PHONE_TYPE))
                    .bind(op.field(fields::GROUP_ID))
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                }
            }
        }

        tx.commit().await.map_err(backend)?;
        debug!(ops = ops.len(), "batch applied");
        Ok(())
    }

    async fn profile_name(&self) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar::<_, Option<String>>(
            "SELECT display_name FROM profile WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(name.flatten())
    }
}
