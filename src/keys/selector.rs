//! Key selection by `kid`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{KeySet, SigningKey};
use crate::error::KeySelectionError;

/// Behaviour when the token's `kid` matches no key in the set.
///
/// [`FirstKey`](Self::FirstKey) tolerates single-key legacy realms whose
/// synthesized key id (the realm name) never matches the provider's real
/// `kid`. It weakens key pinning, so every use is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Verify against the first key in the set
    #[default]
    FirstKey,
    /// Fail with [`KeySelectionError::UnknownKeyId`]
    Reject,
}

/// Select a key using the default [`FallbackPolicy::FirstKey`] policy.
///
/// # Errors
///
/// Returns [`KeySelectionError::EmptyKeySet`] if `key_set` is empty.
pub fn select_key<'a>(
    key_set: &'a KeySet,
    header_key_id: Option<&str>,
) -> Result<&'a SigningKey, KeySelectionError> {
    select_key_with(key_set, header_key_id, FallbackPolicy::FirstKey)
}

/// Select the key named by `header_key_id`, applying `policy` on a miss.
///
/// # Errors
///
/// Returns [`KeySelectionError::EmptyKeySet`] if `key_set` is empty, or
/// [`KeySelectionError::UnknownKeyId`] on a miss under
/// [`FallbackPolicy::Reject`].
pub fn select_key_with<'a>(
    key_set: &'a KeySet,
    header_key_id: Option<&str>,
    policy: FallbackPolicy,
) -> Result<&'a SigningKey, KeySelectionError> {
    let first = key_set.first().ok_or(KeySelectionError::EmptyKeySet)?;

    if let Some(key) = header_key_id.and_then(|kid| key_set.find(kid)) {
        return Ok(key);
    }

    match policy {
        FallbackPolicy::FirstKey => {
            warn!(
                requested_kid = header_key_id.unwrap_or("<none>"),
                fallback_kid = %first.key_id,
                available = ?key_set.key_ids(),
                "No key matches token kid, falling back to first key"
            );
            Ok(first)
        }
        FallbackPolicy::Reject => Err(KeySelectionError::UnknownKeyId(
            header_key_id.unwrap_or_default().to_string(),
        )),
    }
}
