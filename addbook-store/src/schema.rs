//! Schema creation
//!
//! All tables are created idempotently so opening an existing database
//! is safe.

use addbook_core::StoreError;
use sqlx::SqlitePool;

pub(crate) async fn create_all_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    create_messages_table(pool).await?;
    create_raw_contacts_table(pool).await?;
    create_data_table(pool).await?;
    create_settings_table(pool).await?;
    create_profile_table(pool).await?;
    Ok(())
}

async fn create_messages_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            body TEXT NOT NULL,
            address TEXT NOT NULL,
            date INTEGER NOT NULL,
            inbound INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(crate::store::backend)?;

    Ok(())
}

async fn create_raw_contacts_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_name TEXT,
            account_type TEXT,
            lookup_key TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(crate::store::backend)?;

    Ok(())
}

/// The generic attribute table: one row per (contact, mimetype) fact.
/// `raw_contact_id` is nullable because standalone group-membership
/// rows (the partition source) are not owned by any one contact.
async fn create_data_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_contact_id INTEGER REFERENCES raw_contacts(id) ON DELETE CASCADE,
            mimetype TEXT NOT NULL,
            display_name TEXT,
            phone_number TEXT,
            phone_type TEXT,
            group_id TEXT,
            account_name TEXT,
            account_type TEXT,
            visible TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(crate::store::backend)?;

    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(crate::store::backend)?;

    Ok(())
}

async fn create_profile_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profile (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            display_name TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(crate::store::backend)?;

    Ok(())
}
