//! Mock collaborators shared by the unit tests of this crate.

use async_trait::async_trait;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::page::{PageContext, PageContextProvider};
use sidechat_core::remote::{
    NotificationLevel, NotificationPresenter, RemoteSessionService, SaveIntent, SaveResponse,
};
use sidechat_core::session::{
    ActivationTransition, LocalSessionCache, Session, SessionEventListener,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory remote service that records every call.
#[derive(Default)]
pub struct MockRemote {
    sessions: Mutex<HashMap<String, Session>>,
    saves: Mutex<Vec<(Session, SaveIntent)>>,
    gets: Mutex<Vec<(String, bool)>>,
    deletes: Mutex<Vec<String>>,
    save_errors: Mutex<VecDeque<SidechatError>>,
    get_error: Mutex<Option<SidechatError>>,
    /// When set, `Update` of an unknown key fails with NotFound.
    strict_updates: AtomicBool,
    /// `updated_at` the service stamps on every saved copy.
    stamp: Mutex<Option<i64>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn strict() -> Arc<Self> {
        let remote = Self::default();
        remote.strict_updates.store(true, Ordering::SeqCst);
        Arc::new(remote)
    }

    pub fn put(&self, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.key.clone(), session);
    }

    pub fn stored(&self, key: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(key).cloned()
    }

    pub fn stamp_saves(&self, updated_at: i64) {
        *self.stamp.lock().unwrap() = Some(updated_at);
    }

    pub fn fail_next_save(&self, error: SidechatError) {
        self.save_errors.lock().unwrap().push_back(error);
    }

    pub fn fail_gets(&self, error: Option<SidechatError>) {
        *self.get_error.lock().unwrap() = error;
    }

    pub fn saves(&self) -> Vec<(Session, SaveIntent)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<(String, bool)> {
        self.gets.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSessionService for MockRemote {
    async fn list(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.lock().unwrap().values().cloned().collect())
    }

    async fn get(&self, key: &str, force_refresh: bool) -> Result<Session> {
        self.gets
            .lock()
            .unwrap()
            .push((key.to_string(), force_refresh));
        if let Some(error) = self.get_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.stored(key)
            .ok_or_else(|| SidechatError::not_found("Session", key))
    }

    async fn save(&self, session: &Session, intent: SaveIntent) -> Result<SaveResponse> {
        self.saves.lock().unwrap().push((session.clone(), intent));
        if let Some(error) = self.save_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        let known = self.sessions.lock().unwrap().contains_key(&session.key);
        if intent == SaveIntent::Update && !known && self.strict_updates.load(Ordering::SeqCst) {
            return Err(SidechatError::not_found("Session", session.key.clone()));
        }
        let mut canonical = session.clone();
        if let Some(updated_at) = *self.stamp.lock().unwrap() {
            canonical.updated_at = updated_at;
        }
        self.put(canonical.clone());
        Ok(SaveResponse {
            session: Some(canonical),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.sessions.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Page provider whose context can be swapped by the test.
pub struct MockPage {
    context: Mutex<PageContext>,
}

impl MockPage {
    pub fn new(context: PageContext) -> Arc<Self> {
        Arc::new(Self {
            context: Mutex::new(context),
        })
    }

    pub fn set(&self, context: PageContext) {
        *self.context.lock().unwrap() = context;
    }
}

#[async_trait]
impl PageContextProvider for MockPage {
    async fn current(&self) -> PageContext {
        self.context.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<(String, NotificationLevel)>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.shown.lock().unwrap().iter().map(|(_, l)| *l).collect()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn show(&self, message: &str, level: NotificationLevel) {
        self.shown.lock().unwrap().push((message.to_string(), level));
    }
}

#[derive(Default)]
pub struct RecordingListener {
    list_sizes: Mutex<Vec<usize>>,
    active: Mutex<Vec<Option<String>>>,
    transitions: Mutex<Vec<ActivationTransition>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn list_sizes(&self) -> Vec<usize> {
        self.list_sizes.lock().unwrap().clone()
    }

    /// Local ids passed to `on_active_session_changed`, in order.
    pub fn active_changes(&self) -> Vec<Option<String>> {
        self.active.lock().unwrap().clone()
    }

    pub fn transitions(&self) -> Vec<ActivationTransition> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.list_sizes.lock().unwrap().clear();
        self.active.lock().unwrap().clear();
        self.transitions.lock().unwrap().clear();
    }
}

impl SessionEventListener for RecordingListener {
    fn on_session_list_changed(&self, sessions: &[Session]) {
        self.list_sizes.lock().unwrap().push(sessions.len());
    }

    fn on_active_session_changed(&self, session: Option<&Session>) {
        self.active
            .lock()
            .unwrap()
            .push(session.map(|s| s.local_id.clone()));
    }

    fn on_activation_transition(&self, transition: &ActivationTransition) {
        self.transitions.lock().unwrap().push(transition.clone());
    }
}

/// Local cache held in memory.
#[derive(Default)]
pub struct MemoryCache {
    sessions: Mutex<Vec<Session>>,
}

impl MemoryCache {
    pub fn with(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions),
        })
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSessionCache for MemoryCache {
    async fn load_all(&self) -> Result<Vec<Session>> {
        Ok(self.snapshot())
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<()> {
        *self.sessions.lock().unwrap() = sessions.to_vec();
        Ok(())
    }
}

/// A session bound to `url`, created `age_ms` before `now_millis()`.
pub fn aged_session(url: &str, age_ms: i64) -> Session {
    let created = sidechat_core::session::now_millis() - age_ms;
    Session {
        title: format!("Session for {url}"),
        ..Session::new("", url, created)
    }
}
