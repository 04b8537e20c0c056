//! Active-session state machine.
//!
//! Exactly one session is active at a time. Switching runs
//! `Inactive -> Activating -> Active`: the previous session is deactivated
//! (and optionally saved), the canonical remote copy may be fetched and
//! merged, and the live page context is applied if the session belongs to
//! the current page.

use super::consistency::ConsistencyEnforcer;
use super::scheduler::SyncScheduler;
use super::store::SessionStore;
use sidechat_core::config::SyncConfig;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::page::PageContextProvider;
use sidechat_core::remote::RemoteSessionService;
use sidechat_core::session::{ActivationTransition, Session, SessionEventListener, now_millis};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Activating,
    Active,
}

/// Options for [`ActivationController::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateOptions {
    /// Save the previously active session immediately before switching.
    pub save_previous: bool,
    /// Keep local timestamps when merging a fetched copy, so the session does
    /// not move in a recency-sorted list.
    pub preserve_order: bool,
    /// Fetch even if the same session was fetched within the cache window.
    pub force_refresh: bool,
}

impl Default for ActivateOptions {
    fn default() -> Self {
        Self {
            save_previous: true,
            preserve_order: false,
            force_refresh: false,
        }
    }
}

impl ActivateOptions {
    /// Options for switches made by the engine itself (e.g. after a delete).
    pub fn housekeeping() -> Self {
        Self {
            save_previous: false,
            preserve_order: true,
            force_refresh: false,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    current: Option<(String, ActivationState)>,
    /// Bumped on every switch; an activation that finds a different value
    /// after its awaits has been superseded.
    generation: u64,
    recent_fetches: HashMap<String, Instant>,
}

pub struct ActivationController {
    store: SessionStore,
    consistency: ConsistencyEnforcer,
    scheduler: SyncScheduler,
    remote: Arc<dyn RemoteSessionService>,
    page: Arc<dyn PageContextProvider>,
    listener: Arc<dyn SessionEventListener>,
    config: SyncConfig,
    state: Mutex<ControllerState>,
}

impl ActivationController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: SessionStore,
        consistency: ConsistencyEnforcer,
        scheduler: SyncScheduler,
        remote: Arc<dyn RemoteSessionService>,
        page: Arc<dyn PageContextProvider>,
        listener: Arc<dyn SessionEventListener>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            consistency,
            scheduler,
            remote,
            page,
            listener,
            config,
            state: Mutex::new(ControllerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `id` the active session and returns its state after activation.
    ///
    /// A failed remote fetch never blocks activation; the local copy is used.
    pub async fn activate(&self, id: &str, options: ActivateOptions) -> Result<Session> {
        let session = self
            .store
            .get(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))?;

        let (previous, generation) = {
            let mut state = self.state();
            state.generation += 1;
            let previous = state
                .current
                .take()
                .map(|(prev, _)| prev)
                .filter(|prev| prev != id);
            state.current = Some((id.to_string(), ActivationState::Activating));
            (previous, state.generation)
        };

        if let Some(prev) = &previous {
            tracing::debug!("[ActivationController] Deactivating {}", prev);
            self.listener
                .on_activation_transition(&ActivationTransition::Deactivated { id: prev.clone() });
        }
        self.listener
            .on_activation_transition(&ActivationTransition::Activating { id: id.to_string() });

        if let Some(prev) = previous.filter(|p| options.save_previous && self.store.contains(p)) {
            if let Err(e) = self.scheduler.request_save(&prev, true).await {
                tracing::warn!(
                    "[ActivationController] Failed to save {} before switching: {}",
                    prev,
                    e
                );
            }
        }

        if self.should_fetch(id, &session, options.force_refresh) {
            self.fetch_and_merge(id, &session.key, options).await;
        }

        self.apply_page_context(id).await?;

        {
            let mut state = self.state();
            if state.generation != generation {
                tracing::debug!("[ActivationController] Activation of {} superseded", id);
                drop(state);
                return self
                    .store
                    .get(id)
                    .ok_or_else(|| SidechatError::not_found("Session", id));
            }
            state.current = Some((id.to_string(), ActivationState::Active));
        }

        let session = self
            .store
            .get(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))?;
        self.listener
            .on_activation_transition(&ActivationTransition::Activated { id: id.to_string() });
        self.listener.on_active_session_changed(Some(&session));
        tracing::info!("[ActivationController] Session {} active", id);
        Ok(session)
    }

    /// Decides whether activation should refetch the remote copy, and records
    /// the fetch if so.
    fn should_fetch(&self, id: &str, session: &Session, force_refresh: bool) -> bool {
        if !self.config.remote_enabled {
            return false;
        }

        let grace_ms = i64::try_from(self.config.new_session_grace_ms).unwrap_or(i64::MAX);
        if now_millis() - session.created_at < grace_ms {
            tracing::debug!("[ActivationController] {} is new, skipping fetch", id);
            return false;
        }

        if self.scheduler.has_unsynced(id) {
            tracing::debug!("[ActivationController] {} has unsynced edits, skipping fetch", id);
            return false;
        }

        let now = Instant::now();
        let mut state = self.state();
        if !force_refresh {
            if let Some(last) = state.recent_fetches.get(id) {
                if now.duration_since(*last) < self.config.fetch_cache_window() {
                    tracing::debug!("[ActivationController] {} fetched recently, skipping", id);
                    return false;
                }
            }
        }
        state.recent_fetches.insert(id.to_string(), now);
        true
    }

    async fn fetch_and_merge(&self, id: &str, key: &str, options: ActivateOptions) {
        // Waits out an in-flight write, whose payload is newer than the remote copy.
        let lock = self.scheduler.write_lock(id);
        let _guard = lock.lock().await;
        if self.scheduler.has_unsynced(id) {
            tracing::debug!("[ActivationController] {} changed while waiting, skipping fetch", id);
            return;
        }

        match self.remote.get(key, options.force_refresh).await {
            Ok(remote) => {
                let merged = self
                    .store
                    .update(id, |local| merge_remote(local, remote, options.preserve_order));
                if merged.is_some() {
                    tracing::debug!("[ActivationController] Merged remote copy of {}", id);
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    "[ActivationController] {} not on remote yet, using local copy",
                    id
                );
            }
            Err(e) => {
                tracing::warn!(
                    "[ActivationController] Fetch of {} failed, using local copy: {}",
                    id,
                    e
                );
            }
        }
    }

    async fn apply_page_context(&self, id: &str) -> Result<()> {
        let page = self.page.current().await;
        let session = self
            .store
            .get(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))?;

        let changed = if session.is_blank() {
            self.consistency.reconcile(id, &page) | self.consistency.touch_access(id)
        } else if session.url == page.url {
            self.consistency.reconcile(id, &page)
        } else {
            // Another page is open: only the access time may move.
            self.consistency.touch_access(id)
        };

        if changed {
            self.scheduler.request_save(id, false).await?;
        }
        Ok(())
    }

    /// Activation state of `id`.
    pub fn state_of(&self, id: &str) -> ActivationState {
        match &self.state().current {
            Some((current, state)) if current == id => *state,
            _ => ActivationState::Inactive,
        }
    }

    /// Id of the session currently in the `Active` state.
    pub fn active_id(&self) -> Option<String> {
        match &self.state().current {
            Some((id, ActivationState::Active)) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn active_session(&self) -> Option<Session> {
        self.active_id().and_then(|id| self.store.get(&id))
    }

    /// Handles removal of session `id` from the store.
    ///
    /// If it was the active one, the most recently accessed remaining session
    /// is activated; with none left the active session becomes `None`.
    pub async fn on_session_deleted(&self, id: &str) -> Result<Option<Session>> {
        let was_current = {
            let mut state = self.state();
            state.recent_fetches.remove(id);
            let is_current = state.current.as_ref().is_some_and(|(current, _)| current == id);
            if is_current {
                state.current = None;
                state.generation += 1;
            }
            is_current
        };
        if !was_current {
            return Ok(None);
        }

        self.listener
            .on_activation_transition(&ActivationTransition::Deactivated { id: id.to_string() });

        match self.store.most_recently_accessed() {
            Some(next) => {
                tracing::debug!("[ActivationController] {} deleted, falling back to {}", id, next);
                self.activate(&next, ActivateOptions::housekeeping())
                    .await
                    .map(Some)
            }
            None => {
                tracing::debug!("[ActivationController] Last session deleted");
                self.listener.on_active_session_changed(None);
                Ok(None)
            }
        }
    }
}

/// Merges a fetched remote copy into the local record.
///
/// Remote messages and description win; local content wins when non-empty.
/// Title, tags and favorite follow whichever copy was updated last. Unless
/// `preserve_order` is set, timestamps advance to the remote values without
/// ever moving backwards.
fn merge_remote(local: &mut Session, remote: Session, preserve_order: bool) {
    let remote_is_newer = remote.updated_at >= local.updated_at;

    local.messages = remote.messages;
    local.description = remote.description;
    if local.content.is_empty() {
        local.content = remote.content;
    }
    if remote_is_newer {
        if !remote.title.is_empty() {
            local.title = remote.title;
        }
        local.tags = remote.tags;
        local.is_favorite = remote.is_favorite;
    }

    if !preserve_order {
        local.updated_at = local.updated_at.max(remote.updated_at);
        local.last_access_time = local.last_access_time.max(remote.last_access_time);
        if remote.created_at > 0 && (local.created_at <= 0 || remote.created_at < local.created_at) {
            local.created_at = remote.created_at;
        }
    }
}

#[cfg(test)]
#[path = "activation_test.rs"]
mod tests;
