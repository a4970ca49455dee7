//! Remembered sender name
//!
//! When the user provisions a contact from a manually entered number,
//! the surrounding UI offers to text the new contact the user's own
//! name. That name lives in an injected key-value preference store;
//! there is no global singleton. Actually sending the text is out of
//! scope here.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::ContactStore;

/// Preference key under which the sender name is remembered.
pub const SENDER_NAME_KEY: &str = "sender_name";

/// Message used in place of a name when none has been set.
pub const NO_NAME_MESSAGE: &str = "No name is set in Add Contact but here is my number";

/// Injected key-value preference store.
#[async_trait]
pub trait Preferences: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// The name to introduce the user with, or the no-name fallback
/// message when none is remembered.
pub async fn sender_name(prefs: &dyn Preferences) -> Result<String, StoreError> {
    let remembered = prefs
        .get(SENDER_NAME_KEY)
        .await?
        .filter(|n| !n.trim().is_empty());
    Ok(remembered.unwrap_or_else(|| NO_NAME_MESSAGE.to_string()))
}

/// Remember the sender name. Blank input is rejected (returns `false`)
/// so a stray submit cannot erase a previously set name.
pub async fn remember_sender_name(
    prefs: &dyn Preferences,
    name: &str,
) -> Result<bool, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(false);
    }
    prefs.set(SENDER_NAME_KEY, name).await?;
    Ok(true)
}

/// Best-effort guess at the user's own name from the store's owner
/// profile, used to prefill the set-name flow.
pub async fn suggest_own_name(store: &dyn ContactStore) -> Result<Option<String>, StoreError> {
    Ok(store.profile_name().await?.filter(|n| !n.is_empty()))
}
