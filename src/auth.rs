//! Auth token resolution.
//!
//! Lookup runs in two stages: the `user` entry of the key/value cache, then the raw `auth`
//! blob in local storage. A credential found in the blob is not cached automatically;
//! callers run [promote] to write it into the cache.

use crate::storage::{KeyValueStore, LocalStorage, StorageError};
use serde::Deserialize;
use serde_json::{json, Value};

/// Cache key holding `{id, token}`.
pub const USER_KEY: &str = "user";
/// Local storage key holding the site's JSON auth blob.
pub const LOCAL_AUTH_KEY: &str = "auth";

/// Bearer token plus the user id the site uses as `ui` in reader URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user_id: String,
    pub token: String,
}

impl Credential {
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Request headers carrying this credential.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), self.authorization())]
    }
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cache,
    /// Local auth blob; `expires_at` is the blob's `timestamp + expires_in`.
    LocalAuth { expires_at: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub credential: Credential,
    pub source: CredentialSource,
}

#[derive(Debug, Deserialize)]
struct LocalAuthBlob {
    #[serde(default)]
    auth: Option<LocalAuthUser>,
    #[serde(default)]
    token: Option<LocalAuthToken>,
}

#[derive(Debug, Deserialize)]
struct LocalAuthUser {
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Deserialize)]
struct LocalAuthToken {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    expires_in: i64,
}

/// Current time in epoch milliseconds, the unit the stores use for expiry.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Stage one: the cached `user` entry.
pub fn from_cache(cache: &dyn KeyValueStore, now_ms: i64) -> Option<Credential> {
    let user = cache.get(USER_KEY, now_ms)?;
    let token = user
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())?;
    let user_id = user.get("id").and_then(id_text)?;
    Some(Credential {
        user_id,
        token: token.to_string(),
    })
}

/// Stage two: the local auth blob. A blob that is not valid JSON is treated as absent.
pub fn from_local_auth(local: &dyn LocalStorage) -> Option<ResolvedCredential> {
    let raw = local.item(LOCAL_AUTH_KEY)?;
    let blob: LocalAuthBlob = match serde_json::from_str(&raw) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("ignoring unreadable local auth blob: {}", e);
            return None;
        }
    };
    let token = blob.token?;
    let access_token = token.access_token.filter(|t| !t.is_empty())?;
    let user_id = blob.auth.and_then(|a| id_text(&a.id))?;
    Some(ResolvedCredential {
        credential: Credential {
            user_id,
            token: access_token,
        },
        source: CredentialSource::LocalAuth {
            expires_at: token.timestamp.saturating_add(token.expires_in),
        },
    })
}

/// Resolve a credential: cache first, then the local auth blob.
pub fn resolve_credential(
    cache: &dyn KeyValueStore,
    local: &dyn LocalStorage,
    now_ms: i64,
) -> Option<ResolvedCredential> {
    if let Some(credential) = from_cache(cache, now_ms) {
        tracing::debug!("using cached credential for user {}", credential.user_id);
        return Some(ResolvedCredential {
            credential,
            source: CredentialSource::Cache,
        });
    }
    let resolved = from_local_auth(local);
    if let Some(r) = &resolved {
        tracing::debug!("using local auth credential for user {}", r.credential.user_id);
    }
    resolved
}

/// Write a credential resolved from the local blob into the cache. Returns whether a write
/// happened (cached credentials are left alone).
pub fn promote(
    cache: &mut dyn KeyValueStore,
    resolved: &ResolvedCredential,
) -> Result<bool, StorageError> {
    match resolved.source {
        CredentialSource::Cache => Ok(false),
        CredentialSource::LocalAuth { expires_at } => {
            let value = json!({
                "id": resolved.credential.user_id,
                "token": resolved.credential.token,
            });
            cache.set(USER_KEY, value, Some(expires_at))?;
            Ok(true)
        }
    }
}
