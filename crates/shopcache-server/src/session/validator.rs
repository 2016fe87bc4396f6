use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::store::{SharedStore, StoreError};
use crate::config::SessionConfig;
use crate::metrics;

/// The authenticated user behind a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub nick_name: String,
    pub icon: String,
}

impl Identity {
    /// Decode a session record. Returns `None` if `id` is missing or not an integer.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let id = fields.get("id")?.trim().parse().ok()?;
        Some(Self {
            id,
            nick_name: fields.get("nickName").cloned().unwrap_or_default(),
            icon: fields.get("icon").cloned().unwrap_or_default(),
        })
    }

    /// Encode as session record fields.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.to_string()),
            ("nickName".to_string(), self.nick_name.clone()),
            ("icon".to_string(), self.icon.clone()),
        ]
    }
}

/// Validates session tokens and maintains their sliding expiry.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    store: SharedStore,
    key_prefix: String,
    ttl: Duration,
    header: String,
}

impl SessionValidator {
    pub fn new(store: SharedStore, config: &SessionConfig) -> Self {
        Self {
            store,
            key_prefix: config.key_prefix.clone(),
            ttl: config.ttl(),
            header: config.header.to_ascii_lowercase(),
        }
    }

    /// Name of the request header carrying the token (lowercase).
    pub fn header(&self) -> &str {
        &self.header
    }

    #[inline]
    fn session_key(&self, token: &str) -> String {
        format!("{}{token}", self.key_prefix)
    }

    /// Resolve a token to an identity.
    ///
    /// Missing or blank tokens, unknown tokens and malformed records all yield
    /// `Ok(None)` (anonymous). A valid record has its TTL refreshed.
    pub async fn validate(&self, token: Option<&str>) -> Result<Option<Identity>, StoreError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let key = self.session_key(token);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            tracing::debug!("no session record for token");
            metrics::record_session("anonymous");
            return Ok(None);
        }

        let Some(identity) = Identity::from_fields(&fields) else {
            tracing::warn!(key = %key, "session record has no usable id, treating as anonymous");
            metrics::record_session("anonymous");
            return Ok(None);
        };

        self.store.expire(&key, self.ttl).await?;
        tracing::debug!(user_id = identity.id, "session validated");
        metrics::record_session("valid");
        Ok(Some(identity))
    }

    /// Create a session record for `identity` and return its token.
    pub async fn issue(&self, identity: &Identity) -> Result<String, StoreError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let key = self.session_key(&token);
        self.store.hash_set_all(&key, &identity.to_fields()).await?;
        self.store.expire(&key, self.ttl).await?;
        tracing::debug!(user_id = identity.id, "session issued");
        Ok(token)
    }

    /// Delete a session record. Returns `true` if one existed.
    pub async fn revoke(&self, token: &str) -> Result<bool, StoreError> {
        self.store.delete(&self.session_key(token)).await
    }
}
