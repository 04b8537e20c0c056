//! Coalescing, throttled remote writes.
//!
//! Non-immediate save requests share one timer: the first request opens a
//! window of `save_throttle`, every request arriving inside the window joins
//! it, and a single flush at the end of the window writes each pending
//! session once. The payload is built from the store at flush time, so the
//! latest in-memory state is what reaches the remote service.

use super::retry_queue::{QueuedWrite, RetryQueue};
use super::store::SessionStore;
use sidechat_core::config::SyncConfig;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::remote::{
    NotificationLevel, NotificationPresenter, RemoteSessionService, SaveIntent, SaveResponse,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Single-slot timer plus the ids waiting for it.
#[derive(Default)]
struct PendingFlush {
    ids: Vec<String>,
    timer: Option<JoinHandle<()>>,
}

impl PendingFlush {
    fn add(&mut self, id: &str) {
        if !self.ids.iter().any(|pending| pending == id) {
            self.ids.push(id.to_string());
        }
    }

    fn remove(&mut self, id: &str) {
        self.ids.retain(|pending| pending != id);
    }
}

#[derive(Default)]
struct SchedulerState {
    pending: PendingFlush,
    flush_count: u64,
}

struct SchedulerInner {
    store: SessionStore,
    remote: Arc<dyn RemoteSessionService>,
    notifier: Arc<dyn NotificationPresenter>,
    config: SyncConfig,
    state: Mutex<SchedulerState>,
    /// Serializes writes per session id so a later payload never lands first.
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    retry_queue: RetryQueue,
}

/// Schedules remote writes of sessions held in a [`SessionStore`].
///
/// Cheap to clone; clones share the same timer and queue.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    pub fn new(
        store: SessionStore,
        remote: Arc<dyn RemoteSessionService>,
        notifier: Arc<dyn NotificationPresenter>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                remote,
                notifier,
                config,
                state: Mutex::new(SchedulerState::default()),
                write_locks: Mutex::new(HashMap::new()),
                retry_queue: RetryQueue::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests a remote write of session `id`.
    ///
    /// With `immediate = false` the write joins the shared throttle window and
    /// this always returns `Ok`; failures are logged. With `immediate = true`
    /// the session is written now and the outcome is returned.
    pub async fn request_save(&self, id: &str, immediate: bool) -> Result<()> {
        if !self.inner.config.remote_enabled {
            tracing::debug!("[SyncScheduler] Remote sync disabled, not saving {}", id);
            return Ok(());
        }
        if immediate {
            self.state().pending.remove(id);
            return self.write_now(id, SaveIntent::Update).await;
        }

        self.schedule(id);
        Ok(())
    }

    /// Writes a freshly created session with create intent.
    pub async fn save_created(&self, id: &str) -> Result<()> {
        if !self.inner.config.remote_enabled {
            return Ok(());
        }
        self.state().pending.remove(id);
        self.write_now(id, SaveIntent::Create).await
    }

    /// User-triggered save: written immediately and reported through the
    /// notification presenter.
    pub async fn save_user_visible(&self, id: &str) -> Result<()> {
        let result = self.request_save(id, true).await;
        match &result {
            Ok(()) => self
                .inner
                .notifier
                .show("Session saved", NotificationLevel::Success),
            Err(e) => {
                tracing::error!("[SyncScheduler] Manual save of {} failed: {}", id, e);
                self.inner
                    .notifier
                    .show(&format!("Failed to save session: {e}"), NotificationLevel::Error);
            }
        }
        result
    }

    fn schedule(&self, id: &str) {
        let mut state = self.state();
        state.pending.add(id);
        if state.pending.timer.is_some() {
            tracing::debug!(
                "[SyncScheduler] Coalesced save of {} into pending flush ({} pending)",
                id,
                state.pending.ids.len()
            );
            return;
        }

        let now = Instant::now();
        let deadline = now + self.inner.config.save_throttle();

        let scheduler = self.clone();
        state.pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            scheduler.flush(false).await;
        }));
        tracing::debug!(
            "[SyncScheduler] Save of {} deferred by {:?}",
            id,
            deadline.saturating_duration_since(now)
        );
    }

    /// Flushes every pending id now, ahead of the timer. Also used on shutdown.
    pub async fn flush_pending(&self) {
        self.flush(true).await;
    }

    async fn flush(&self, cancel_timer: bool) {
        let ids = {
            let mut state = self.state();
            if let Some(timer) = state.pending.timer.take() {
                if cancel_timer {
                    timer.abort();
                }
            }
            std::mem::take(&mut state.pending.ids)
        };

        for id in ids {
            if let Err(e) = self.write_now(&id, SaveIntent::Update).await {
                tracing::warn!("[SyncScheduler] Background save of {} failed: {}", id, e);
            }
        }
    }

    /// Per-id lock held for the duration of a remote write.
    pub(super) fn write_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.to_string()).or_default().clone()
    }

    async fn write_now(&self, id: &str, intent: SaveIntent) -> Result<()> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().await;

        // Built after acquiring the lock: the latest state is what gets sent.
        let payload = self
            .inner
            .store
            .get(id)
            .ok_or_else(|| SidechatError::not_found("Session", id))?
            .normalized();

        self.state().flush_count += 1;

        tracing::debug!(
            "[SyncScheduler] Writing session {} (key={}, intent={:?}, messages={})",
            id,
            payload.key,
            intent,
            payload.messages.len()
        );

        match self.inner.remote.save(&payload, intent).await {
            Ok(response) => {
                tracing::debug!("[SyncScheduler] Session {} saved", id);
                self.apply_echo(id, response);
                Ok(())
            }
            Err(e) if e.is_not_found() && intent == SaveIntent::Update => {
                tracing::info!(
                    "[SyncScheduler] Session {} not found remotely, queueing creation",
                    id
                );
                self.enqueue(id, SaveIntent::Create);
                Ok(())
            }
            Err(e) if e.is_network() => {
                tracing::warn!(
                    "[SyncScheduler] Network error saving {}, queued for retry: {}",
                    id,
                    e
                );
                self.enqueue(id, intent);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Adopts the service's `updated_at` from an echoed copy. Only moves the
    /// timestamp forward and never touches content.
    fn apply_echo(&self, id: &str, response: SaveResponse) {
        let Some(echo) = response.session else {
            return;
        };
        self.inner.store.update(id, |session| {
            if session.key == echo.key && echo.updated_at > session.updated_at {
                session.updated_at = echo.updated_at;
            }
        });
    }

    fn enqueue(&self, id: &str, intent: SaveIntent) {
        if self.inner.retry_queue.push(id, intent) {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.drain_retry_queue().await });
        }
    }

    async fn drain_retry_queue(self) {
        while let Some(mut entry) = self.inner.retry_queue.pop() {
            entry.attempts += 1;
            tokio::time::sleep(self.inner.config.retry_backoff(entry.attempts)).await;
            self.retry_once(entry).await;
        }
        tracing::debug!("[SyncScheduler] Retry queue drained");
    }

    async fn retry_once(&self, entry: QueuedWrite) {
        let lock = self.write_lock(&entry.id);
        let _guard = lock.lock().await;

        let Some(session) = self.inner.store.get(&entry.id) else {
            tracing::debug!("[SyncScheduler] Dropping queued write of deleted session {}", entry.id);
            return;
        };

        match self.inner.remote.save(&session.normalized(), entry.intent).await {
            Ok(response) => {
                tracing::info!(
                    "[SyncScheduler] Queued write of {} landed after {} attempt(s)",
                    entry.id,
                    entry.attempts
                );
                self.apply_echo(&entry.id, response);
            }
            Err(e) if e.is_not_found() && entry.intent == SaveIntent::Update => {
                tracing::info!("[SyncScheduler] Session {} not found remotely, retrying as create", entry.id);
                self.inner.retry_queue.requeue(QueuedWrite {
                    intent: SaveIntent::Create,
                    ..entry
                });
            }
            Err(e) if entry.attempts < self.inner.config.retry_max_attempts => {
                tracing::warn!(
                    "[SyncScheduler] Queued write of {} failed (attempt {}): {}",
                    entry.id,
                    entry.attempts,
                    e
                );
                self.inner.retry_queue.requeue(entry);
            }
            Err(e) => {
                tracing::error!(
                    "[SyncScheduler] Giving up on session {} after {} attempts: {}",
                    entry.id,
                    entry.attempts,
                    e
                );
            }
        }
    }

    /// Drops every pending or queued write of `id` (used after deletion).
    pub fn forget(&self, id: &str) {
        self.state().pending.remove(id);
        self.inner.retry_queue.remove(id);
        self.inner
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// True while a deferred flush is scheduled.
    pub fn has_pending(&self) -> bool {
        self.state().pending.timer.is_some()
    }

    /// True if a write of `id` is waiting on the throttle window or the
    /// retry queue.
    pub fn has_unsynced(&self, id: &str) -> bool {
        self.state().pending.ids.iter().any(|pending| pending == id)
            || self.inner.retry_queue.contains(id)
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state().pending.ids.clone()
    }

    /// Number of writes queued for retry.
    pub fn queued_retries(&self) -> usize {
        self.inner.retry_queue.len()
    }

    /// Number of remote writes attempted by the throttled/immediate path.
    pub fn flush_count(&self) -> u64 {
        self.state().flush_count
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
