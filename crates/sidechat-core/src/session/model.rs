//! Session domain model.
//!
//! A `Session` is one conversation context bound to a page URL (or to a
//! synthetic URL for manually created sessions). The serialized form is the
//! JSON shape exchanged with the remote session service.

use super::derive::is_synthetic_url;
use super::message::ChatMessage;
use serde::{Deserialize, Deserializer, Serialize};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Represents a chat session attached to a page.
///
/// Timestamps are epoch milliseconds and never move backwards (see [`Session::touch`]).
/// `is_blank_session` and `original_url` are local-only and are stripped by
/// [`Session::normalized`] before the record leaves the process.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable remote primary key (UUID). Assigned once, never changed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    /// Id derived from `url` by the identity resolver; used for local lookup.
    #[serde(default, deserialize_with = "null_as_default")]
    pub local_id: String,
    /// Page URL, or a synthetic `sidechat-blank://` URL for blank sessions.
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Extracted page body. May be large.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ChatMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_access_time: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_blank_session: bool,
    /// Synthetic URL of a blank session, kept so reconciliation never replaces it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

impl Session {
    /// Creates a session bound to `url` with a fresh key.
    pub fn new(local_id: impl Into<String>, url: impl Into<String>, now: i64) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            local_id: local_id.into(),
            url: url.into(),
            created_at: now,
            updated_at: now,
            last_access_time: now,
            ..Self::default()
        }
    }

    /// Creates a blank session bound to a synthetic URL.
    pub fn new_blank(local_id: impl Into<String>, synthetic_url: impl Into<String>, now: i64) -> Self {
        let synthetic_url = synthetic_url.into();
        Self {
            is_blank_session: true,
            original_url: Some(synthetic_url.clone()),
            ..Self::new(local_id, synthetic_url, now)
        }
    }

    /// True for sessions exempt from page-context reconciliation.
    pub fn is_blank(&self) -> bool {
        self.is_blank_session || self.url.is_empty() || is_synthetic_url(&self.url)
    }

    /// Assigns a key if the record arrived without one. Returns true if assigned.
    pub fn ensure_key(&mut self) -> bool {
        if self.key.trim().is_empty() {
            self.key = uuid::Uuid::new_v4().to_string();
            return true;
        }
        false
    }

    /// Fills in missing structural fields (key, timestamps).
    ///
    /// Returns true if anything was initialized.
    pub fn ensure_structure(&mut self, now: i64) -> bool {
        let mut changed = self.ensure_key();
        if self.created_at <= 0 {
            self.created_at = if self.updated_at > 0 { self.updated_at } else { now };
            changed = true;
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
            changed = true;
        }
        if self.last_access_time <= 0 {
            self.last_access_time = self.updated_at;
            changed = true;
        }
        changed
    }

    /// Marks the session as modified at `now`. Never moves `updated_at` backwards.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }

    /// Updates `last_access_time` if at least `throttle_ms` passed since the last update.
    pub fn touch_access(&mut self, now: i64, throttle_ms: i64) -> bool {
        if now - self.last_access_time > throttle_ms {
            self.last_access_time = now;
            return true;
        }
        false
    }

    /// Best-available timestamp for date filtering and sorting.
    pub fn effective_timestamp(&self) -> i64 {
        [self.updated_at, self.last_access_time, self.created_at]
            .into_iter()
            .find(|ts| *ts > 0)
            .unwrap_or(0)
    }

    /// True if the session carries at least one non-blank tag.
    pub fn has_tags(&self) -> bool {
        self.tags.iter().any(|tag| !tag.trim().is_empty())
    }

    /// Appends `tag` unless an equal tag is already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Returns the record as it should be sent to the remote service.
    ///
    /// Local-only flags are cleared, tags are trimmed and deduplicated and a
    /// missing key is assigned.
    pub fn normalized(&self) -> Session {
        let mut wire = self.clone();
        wire.ensure_key();
        let mut tags: Vec<String> = Vec::with_capacity(wire.tags.len());
        for tag in wire.tags.iter().map(|t| t.trim()) {
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        wire.tags = tags;
        wire.is_blank_session = false;
        wire.original_url = None;
        wire
    }
}
