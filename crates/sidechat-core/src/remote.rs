//! Collaborators on the remote side: the session service, credentials and
//! user notifications.

use crate::error::Result;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;

/// Whether a save targets an existing remote record or creates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveIntent {
    Create,
    Update,
}

/// Body returned by [`RemoteSessionService::save`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveResponse {
    /// Canonical copy, if the service echoes one. Only its `updated_at` is
    /// adopted locally, and only when newer.
    pub session: Option<Session>,
}

/// Remote session store.
///
/// Implementations report a missing record as
/// [`SidechatError::NotFound`](crate::SidechatError::NotFound), transport
/// failures as `Network` and undecodable bodies as `Validation`.
#[async_trait]
pub trait RemoteSessionService: Send + Sync {
    async fn list(&self) -> Result<Vec<Session>>;

    /// Fetches one session by key. `force_refresh` bypasses intermediary caches.
    async fn get(&self, key: &str, force_refresh: bool) -> Result<Session>;

    /// Idempotent upsert of a normalized session.
    async fn save(&self, session: &Session, intent: SaveIntent) -> Result<SaveResponse>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Supplies authentication headers for remote calls.
pub trait CredentialProvider: Send + Sync {
    fn headers(&self) -> HashMap<String, String>;
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Toast presenter of the host UI.
pub trait NotificationPresenter: Send + Sync {
    fn show(&self, message: &str, level: NotificationLevel);
}

/// Presenter that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPresenter;

impl NotificationPresenter for SilentPresenter {
    fn show(&self, _message: &str, _level: NotificationLevel) {}
}
