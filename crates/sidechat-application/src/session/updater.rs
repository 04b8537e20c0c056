//! Session updater helper for common update patterns.
//!
//! This module provides `SessionUpdater` which abstracts the common
//! "find → update → schedule save" pattern used by message and metadata edits.

use super::scheduler::SyncScheduler;
use super::store::SessionStore;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::session::{Session, now_millis};

/// Helper struct for updating sessions with a common pattern.
///
/// `SessionUpdater` encapsulates the common pattern of:
/// 1. Looking up the session in the store
/// 2. Applying updates inside the store's critical section
/// 3. Bumping `updated_at`
/// 4. Requesting a throttled remote write
#[derive(Clone)]
pub struct SessionUpdater {
    store: SessionStore,
    scheduler: SyncScheduler,
}

impl SessionUpdater {
    /// Creates a new `SessionUpdater` over `store`, saving through `scheduler`.
    pub fn new(store: SessionStore, scheduler: SyncScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Updates a session by applying the given updater function.
    ///
    /// # Arguments
    ///
    /// * `id` - Local id of the session to update
    /// * `updater` - A function that modifies the session
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session doesn't exist
    /// - The updater function returns an error (the session is left as the
    ///   updater left it, so updaters validate before mutating)
    pub async fn update<F, R>(&self, id: &str, updater: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> Result<R>,
    {
        tracing::debug!("[SessionUpdater] update() called for id: {}", id);

        let value = self
            .store
            .update(id, |session| -> Result<R> {
                let value = updater(session)?;
                session.touch(now_millis());
                Ok(value)
            })
            .ok_or_else(|| SidechatError::not_found("Session", id))??;

        self.scheduler.request_save(id, false).await?;
        Ok(value)
    }
}
