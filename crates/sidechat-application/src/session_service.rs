//! Session service: the engine's public surface.
//!
//! `SessionService` is constructed once with its collaborators and handed to
//! the UI layer. It owns the store, the scheduler and the activation
//! controller, and exposes every user-facing session operation.

use crate::session::{
    ActivateOptions, ActivationController, ConsistencyEnforcer, SessionStore, SessionUpdater,
    SyncScheduler,
};
use sidechat_core::config::SyncConfig;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::identity::IdentityResolver;
use sidechat_core::page::{PageContext, PageContextProvider};
use sidechat_core::remote::{NotificationLevel, NotificationPresenter, RemoteSessionService};
use sidechat_core::session::{
    ChatMessage, FilterEngine, LocalSessionCache, Session, SessionEventListener, SessionQuery,
    blank_url, derive_title, domain_tag, is_synthetic_url, now_millis,
};
use std::sync::Arc;

const BLANK_SESSION_TITLE: &str = "New Chat";

/// External collaborators the engine is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub remote: Arc<dyn RemoteSessionService>,
    pub page: Arc<dyn PageContextProvider>,
    pub notifier: Arc<dyn NotificationPresenter>,
    pub listener: Arc<dyn SessionEventListener>,
}

/// Entry point for all session operations.
///
/// # Responsibilities
///
/// - Creating page-bound and blank sessions
/// - Switching the active session (see [`ActivationController`])
/// - Message and metadata edits, each followed by a throttled remote write
/// - Manual saves, deletion, bulk refresh and the optional local cache
/// - Notifying the UI through [`SessionEventListener`]
pub struct SessionService {
    config: SyncConfig,
    store: SessionStore,
    consistency: ConsistencyEnforcer,
    scheduler: SyncScheduler,
    updater: SessionUpdater,
    activation: ActivationController,
    remote: Arc<dyn RemoteSessionService>,
    page: Arc<dyn PageContextProvider>,
    notifier: Arc<dyn NotificationPresenter>,
    listener: Arc<dyn SessionEventListener>,
    local_cache: Option<Arc<dyn LocalSessionCache>>,
}

impl SessionService {
    /// Creates a new `SessionService` with an empty store.
    ///
    /// # Arguments
    ///
    /// * `config` - Timing and remote settings
    /// * `collaborators` - Remote service, page provider, notifier and UI listener
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            remote,
            page,
            notifier,
            listener,
        } = collaborators;

        let store = SessionStore::new(IdentityResolver::new(config.hash_algorithm));
        let consistency = ConsistencyEnforcer::new(store.clone(), config.access_throttle());
        let scheduler = SyncScheduler::new(
            store.clone(),
            remote.clone(),
            notifier.clone(),
            config.clone(),
        );
        let updater = SessionUpdater::new(store.clone(), scheduler.clone());
        let activation = ActivationController::new(
            store.clone(),
            consistency.clone(),
            scheduler.clone(),
            remote.clone(),
            page.clone(),
            listener.clone(),
            config.clone(),
        );

        Self {
            config,
            store,
            consistency,
            scheduler,
            updater,
            activation,
            remote,
            page,
            notifier,
            listener,
            local_cache: None,
        }
    }

    /// Attaches a durable local cache used by [`restore_local`](Self::restore_local)
    /// and [`persist_local`](Self::persist_local).
    pub fn with_local_cache(mut self, cache: Arc<dyn LocalSessionCache>) -> Self {
        self.local_cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn activation(&self) -> &ActivationController {
        &self.activation
    }

    fn notify_list_changed(&self) {
        self.listener.on_session_list_changed(&self.store.all());
    }

    fn get_or_not_found(&self, id: &str) -> Result<Session> {
        self.store
            .get(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))
    }

    // ============================================================================
    // Loading
    // ============================================================================

    /// Seeds the store from the local cache. Returns the number of cached sessions.
    pub async fn restore_local(&self) -> Result<usize> {
        let Some(cache) = &self.local_cache else {
            return Ok(0);
        };
        let sessions = cache.load_all().await.inspect_err(|e| {
            tracing::warn!("[SessionService] Failed to restore local cache: {}", e);
        })?;
        let count = sessions.len();
        self.store.load(sessions);
        tracing::info!("[SessionService] Restored {} sessions from local cache", count);
        self.notify_list_changed();
        Ok(count)
    }

    /// Writes a snapshot of the store to the local cache.
    pub async fn persist_local(&self) -> Result<()> {
        let Some(cache) = &self.local_cache else {
            return Ok(());
        };
        cache.save_all(&self.store.all()).await.inspect_err(|e| {
            tracing::warn!("[SessionService] Failed to persist local cache: {}", e);
        })
    }

    /// Merges the remote listing into the store.
    ///
    /// Per key the copy with the greater `updated_at` wins; sessions that
    /// exist only locally are kept. Returns the number of remote sessions.
    pub async fn refresh_from_remote(&self) -> Result<usize> {
        if !self.config.remote_enabled {
            return Ok(0);
        }
        let remote_sessions = self.remote.list().await.inspect_err(|e| {
            tracing::warn!("[SessionService] Remote listing failed: {}", e);
        })?;
        let count = remote_sessions.len();
        self.store.load(remote_sessions);
        tracing::info!("[SessionService] Refreshed {} sessions from remote", count);
        self.notify_list_changed();
        Ok(count)
    }

    // ============================================================================
    // Creation and activation
    // ============================================================================

    /// Activates the session bound to the live page, creating it on first visit.
    pub async fn open_page_session(&self) -> Result<Session> {
        let page = self.page.current().await;
        if page.url.is_empty() || is_synthetic_url(&page.url) {
            return self.create_blank_session(None).await;
        }

        let id = self.store.id_for_url(&page.url);
        if self.store.contains(&id) {
            return self.activate(&id, ActivateOptions::default()).await;
        }

        let session = session_from_page(&id, &page, now_millis());
        tracing::info!("[SessionService] Creating session {} for {}", id, page.url);
        self.insert_created(&id, session).await;
        self.activate(&id, ActivateOptions::default()).await
    }

    /// Creates a session not bound to any page and activates it.
    pub async fn create_blank_session(&self, title: Option<&str>) -> Result<Session> {
        let url = blank_url();
        let id = self.store.id_for_url(&url);
        let mut session = Session::new_blank(id.clone(), url, now_millis());
        session.title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(BLANK_SESSION_TITLE)
            .to_string();

        tracing::info!("[SessionService] Creating blank session {}", id);
        self.insert_created(&id, session).await;
        self.activate(&id, ActivateOptions::default()).await
    }

    /// Stores a new session and writes it with create intent.
    ///
    /// A failed remote write does not fail creation: the write is retried in
    /// the background and the user is warned.
    async fn insert_created(&self, id: &str, session: Session) {
        self.store.upsert(id, session);
        self.notify_list_changed();

        if let Err(e) = self.scheduler.save_created(id).await {
            tracing::warn!("[SessionService] Initial save of {} failed: {}", id, e);
            self.notifier.show(
                "Session created locally; it will sync when the service is reachable",
                NotificationLevel::Warning,
            );
        }
    }

    pub async fn activate(&self, id: &str, options: ActivateOptions) -> Result<Session> {
        self.activation.activate(id, options).await
    }

    pub fn active_session(&self) -> Option<Session> {
        self.activation.active_session()
    }

    /// Applies the live page context to the active session (e.g. after the
    /// page content changed). Returns true if the session changed.
    pub async fn sync_page_context(&self) -> Result<bool> {
        let Some(id) = self.activation.active_id() else {
            return Ok(false);
        };
        let page = self.page.current().await;
        let changed = self.consistency.reconcile(&id, &page);
        if changed {
            self.scheduler.request_save(&id, false).await?;
            self.notify_list_changed();
        }
        Ok(changed)
    }

    // ============================================================================
    // Deletion
    // ============================================================================

    /// Deletes session `id` locally and, best effort, remotely.
    ///
    /// If it was active, the most recently accessed remaining session becomes active.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))?;
        self.scheduler.forget(id);
        tracing::info!("[SessionService] Deleted session {} (key={})", id, removed.key);

        if self.config.remote_enabled {
            match self.remote.delete(&removed.key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("[SessionService] {} was never synced, nothing to delete", id);
                }
                Err(e) => {
                    tracing::warn!("[SessionService] Remote delete of {} failed: {}", id, e);
                }
            }
        }

        self.notify_list_changed();
        self.activation.on_session_deleted(id).await?;
        Ok(())
    }

    // ============================================================================
    // Messages
    // ============================================================================

    pub async fn append_message(&self, id: &str, message: ChatMessage) -> Result<Session> {
        self.updater
            .update(id, |session| {
                session.messages.push(message);
                Ok(())
            })
            .await?;
        self.get_or_not_found(id)
    }

    /// Replaces the text of message `index`.
    pub async fn edit_message(&self, id: &str, index: usize, text: String) -> Result<()> {
        self.updater
            .update(id, |session| {
                let len = session.messages.len();
                let message = session
                    .messages
                    .get_mut(index)
                    .ok_or_else(|| out_of_range(index, len))?;
                message.text = text;
                Ok(())
            })
            .await
    }

    /// Removes message `index` and returns it.
    pub async fn delete_message(&self, id: &str, index: usize) -> Result<ChatMessage> {
        self.updater
            .update(id, |session| {
                if index >= session.messages.len() {
                    return Err(out_of_range(index, session.messages.len()));
                }
                Ok(session.messages.remove(index))
            })
            .await
    }

    /// Moves message `from` to position `to`, shifting the ones in between.
    pub async fn move_message(&self, id: &str, from: usize, to: usize) -> Result<()> {
        self.updater
            .update(id, |session| {
                let len = session.messages.len();
                if from >= len {
                    return Err(out_of_range(from, len));
                }
                if to >= len {
                    return Err(out_of_range(to, len));
                }
                let message = session.messages.remove(from);
                session.messages.insert(to, message);
                Ok(())
            })
            .await
    }

    // ============================================================================
    // Metadata
    // ============================================================================

    /// Renames a session. Blank titles are rejected.
    pub async fn rename(&self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SidechatError::validation("Session title must not be empty"));
        }
        self.updater
            .update(id, |session| {
                session.title = title.to_string();
                Ok(())
            })
            .await?;
        self.notify_list_changed();
        Ok(())
    }

    /// Replaces the tag set. Tags are trimmed, deduplicated and empty ones dropped.
    pub async fn set_tags(&self, id: &str, tags: Vec<String>) -> Result<()> {
        self.updater
            .update(id, |session| {
                session.tags.clear();
                for tag in tags {
                    session.add_tag(tag);
                }
                Ok(())
            })
            .await?;
        self.notify_list_changed();
        Ok(())
    }

    /// Flips the favorite flag and returns the new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let favorite = self
            .updater
            .update(id, |session| {
                session.is_favorite = !session.is_favorite;
                Ok(session.is_favorite)
            })
            .await?;
        self.notify_list_changed();
        Ok(favorite)
    }

    // ============================================================================
    // Saving and views
    // ============================================================================

    /// Manual save: written immediately, outcome shown to the user.
    pub async fn save_session(&self, id: &str) -> Result<()> {
        self.scheduler.save_user_visible(id).await
    }

    /// The sidebar list: favorites first, each partition newest first.
    pub fn visible_sessions(&self, query: &SessionQuery) -> Vec<Session> {
        let mut visible = FilterEngine::filter(&self.store.all(), query);
        FilterEngine::sort_by_recent(&mut visible);
        visible
    }

    /// Flushes pending writes and persists the local cache.
    pub async fn shutdown(&self) {
        self.scheduler.flush_pending().await;
        if let Err(e) = self.persist_local().await {
            tracing::warn!("[SessionService] Local cache not written on shutdown: {}", e);
        }
        tracing::info!("[SessionService] Shut down");
    }
}

fn out_of_range(index: usize, len: usize) -> SidechatError {
    SidechatError::validation(format!(
        "Message index {index} out of range for {len} messages"
    ))
}

fn session_from_page(id: &str, page: &PageContext, now: i64) -> Session {
    let mut session = Session::new(id, page.url.clone(), now);
    session.title = derive_title(&page.title, &page.url);
    session.description = page.description.clone();
    session.content = page.content.clone();
    if let Some(tag) = domain_tag(&page.url) {
        session.add_tag(tag);
    }
    session
}

#[cfg(test)]
#[path = "session_service_test.rs"]
mod tests;
