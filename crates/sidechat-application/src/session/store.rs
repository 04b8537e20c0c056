use sidechat_core::identity::IdentityResolver;
use sidechat_core::session::{Session, now_millis};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory session collection; the single source of truth of the process.
///
/// Sessions are keyed by their local id (the resolved URL hash). Every
/// mutation runs inside one synchronous critical section, so two operations
/// never interleave field-by-field on the same record. Clones share the same
/// underlying map.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    resolver: IdentityResolver,
}

impl SessionStore {
    /// Creates an empty store using `resolver` to derive local ids.
    pub fn new(resolver: IdentityResolver) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            resolver,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Local id of the session bound to `url`.
    pub fn id_for_url(&self, url: &str) -> String {
        self.resolver.resolve(url)
    }

    pub fn resolver(&self) -> IdentityResolver {
        self.resolver
    }

    /// Merges a bulk listing into the store and returns the resulting map.
    ///
    /// Records missing a key get one. When two records compete (same key, or
    /// different keys resolving to the same local id) the one with the greater
    /// `updated_at` is kept; a tie keeps what is already stored. A displaced
    /// session with a different key moves to the id derived from its key
    /// instead of being dropped. Sessions absent from `records` are left alone.
    pub fn load(&self, records: Vec<Session>) -> HashMap<String, Session> {
        let now = now_millis();
        let mut sessions = self.write();

        let mut id_by_key: HashMap<String, String> = sessions
            .iter()
            .map(|(id, s)| (s.key.clone(), id.clone()))
            .collect();

        for mut record in records {
            record.ensure_structure(now);
            let id = self.local_id_for(&record);
            record.local_id = id.clone();

            let same_key = id_by_key.get(&record.key).cloned();
            if let Some(existing_id) = &same_key {
                let newer = sessions
                    .get(existing_id)
                    .is_none_or(|existing| record.updated_at > existing.updated_at);
                if !newer {
                    tracing::debug!(
                        "[SessionStore] Keeping newer local copy of key={} (id={})",
                        record.key,
                        existing_id
                    );
                    continue;
                }
            }

            let occupant = sessions
                .get(&id)
                .filter(|occupant| occupant.key != record.key)
                .map(|occupant| (occupant.key.clone(), occupant.updated_at));
            if let Some((occupant_key, occupant_updated_at)) = occupant {
                if occupant_updated_at >= record.updated_at {
                    tracing::debug!(
                        "[SessionStore] Id {} holds newer key={}, skipping key={}",
                        id,
                        occupant_key,
                        record.key
                    );
                    continue;
                }
                if let Some(mut displaced) = sessions.remove(&id) {
                    let relocated = self.resolver.resolve(&occupant_key);
                    tracing::info!(
                        "[SessionStore] Moving key={} from {} to {}",
                        occupant_key,
                        id,
                        relocated
                    );
                    displaced.local_id = relocated.clone();
                    id_by_key.insert(occupant_key, relocated.clone());
                    sessions.insert(relocated, displaced);
                }
            }

            if let Some(existing_id) = same_key.filter(|existing_id| *existing_id != id) {
                sessions.remove(&existing_id);
            }
            id_by_key.insert(record.key.clone(), id.clone());
            sessions.insert(id, record);
        }

        tracing::debug!("[SessionStore] Loaded; {} sessions in store", sessions.len());
        sessions.clone()
    }

    fn local_id_for(&self, session: &Session) -> String {
        if !session.url.is_empty() {
            self.resolver.resolve(&session.url)
        } else if !session.local_id.is_empty() {
            session.local_id.clone()
        } else {
            self.resolver.resolve(&session.key)
        }
    }

    /// Returns a copy of the session stored under `id`.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Finds a session by its remote key, returning its local id with it.
    pub fn find_by_key(&self, key: &str) -> Option<(String, Session)> {
        self.read()
            .iter()
            .find(|(_, s)| s.key == key)
            .map(|(id, s)| (id.clone(), s.clone()))
    }

    /// Inserts or replaces the session stored under `id`.
    ///
    /// The stored copy gets `local_id = id` and a key if it had none; that
    /// copy is returned.
    pub fn upsert(&self, id: &str, mut session: Session) -> Session {
        if session.ensure_key() {
            tracing::debug!("[SessionStore] Assigned key {} to session {}", session.key, id);
        }
        session.local_id = id.to_string();
        self.write().insert(id.to_string(), session.clone());
        session
    }

    /// Applies `updater` to the stored session in one critical section.
    ///
    /// Returns `None` if no session is stored under `id`.
    pub fn update<F, R>(&self, id: &str, updater: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.write();
        let session = sessions.get_mut(id)?;
        session.ensure_key();
        Some(updater(session))
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.write().remove(id)
    }

    /// Every session, deduplicated by key, most recently updated first.
    ///
    /// Among duplicates with equal `updated_at` the smaller local id wins.
    pub fn all(&self) -> Vec<Session> {
        let sessions = self.read();
        let mut by_key: HashMap<&str, (&String, &Session)> = HashMap::with_capacity(sessions.len());
        for (id, session) in sessions.iter() {
            by_key
                .entry(session.key.as_str())
                .and_modify(|(kept_id, kept)| {
                    let wins = session
                        .updated_at
                        .cmp(&kept.updated_at)
                        .then_with(|| kept_id.as_str().cmp(id.as_str()))
                        .is_gt();
                    if wins {
                        *kept_id = id;
                        *kept = session;
                    }
                })
                .or_insert((id, session));
        }

        let mut all: Vec<Session> = by_key.into_values().map(|(_, s)| s.clone()).collect();
        all.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        all
    }

    /// Local id of the session with the latest `last_access_time`.
    pub fn most_recently_accessed(&self) -> Option<String> {
        self.read()
            .iter()
            .max_by(|(a_id, a), (b_id, b)| {
                a.last_access_time
                    .cmp(&b.last_access_time)
                    .then_with(|| b_id.cmp(a_id))
            })
            .map(|(id, _)| id.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(IdentityResolver::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(key: &str, url: &str, updated_at: i64) -> Session {
        Session {
            key: key.to_string(),
            url: url.to_string(),
            title: format!("{key} title"),
            created_at: 1,
            updated_at,
            last_access_time: updated_at,
            ..Session::default()
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = SessionStore::default();
        let id = store.id_for_url("https://a.test");
        let original = Session {
            local_id: id.clone(),
            ..session("k1", "https://a.test", 10)
        };

        store.upsert(&id, original.clone());
        assert_eq!(store.get(&id), Some(original));
    }

    #[test]
    fn upsert_assigns_missing_key() {
        let store = SessionStore::default();
        let stored = store.upsert("id1", session("", "https://a.test", 1));

        assert!(!stored.key.is_empty());
        assert_eq!(stored.local_id, "id1");
        assert_eq!(store.get("id1").unwrap().key, stored.key);
    }

    #[test]
    fn load_keeps_newer_duplicate_key() {
        let store = SessionStore::default();
        let loaded = store.load(vec![
            session("k1", "https://a.test", 10),
            session("k1", "https://a.test/moved", 20),
            session("k1", "https://a.test/stale", 5),
        ]);

        assert_eq!(loaded.len(), 1);
        let kept = loaded.values().next().unwrap();
        assert_eq!(kept.url, "https://a.test/moved");
        assert_eq!(kept.local_id, store.id_for_url("https://a.test/moved"));
    }

    #[test]
    fn load_does_not_overwrite_newer_local_copy() {
        let store = SessionStore::default();
        let id = store.id_for_url("https://a.test");
        let mut local = session("k1", "https://a.test", 50);
        local.title = "edited locally".into();
        store.upsert(&id, local);

        store.load(vec![session("k1", "https://a.test", 40), session("k2", "https://b.test", 1)]);

        assert_eq!(store.get(&id).unwrap().title, "edited locally");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_keeps_newer_local_session_bound_to_same_url() {
        let store = SessionStore::default();
        let id = store.id_for_url("https://a.test");
        let mut local = session("local-key", "https://a.test", 50_000);
        local.title = "local edits".into();
        store.upsert(&id, local);

        let mut remote = session("remote-key", "https://a.test", 10_000);
        remote.title = "older remote".into();
        store.load(vec![remote]);

        let kept = store.get(&id).unwrap();
        assert_eq!(kept.key, "local-key");
        assert_eq!(kept.title, "local edits");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_moves_displaced_local_session_under_its_key() {
        let store = SessionStore::default();
        let id = store.id_for_url("https://a.test");
        store.upsert(&id, session("local-key", "https://a.test", 10_000));

        store.load(vec![session("remote-key", "https://a.test", 50_000)]);

        assert_eq!(store.get(&id).unwrap().key, "remote-key");
        let (moved_id, moved) = store.find_by_key("local-key").unwrap();
        assert_eq!(moved_id, store.resolver().resolve("local-key"));
        assert_eq!(moved.local_id, moved_id);
        assert_eq!(store.len(), 2);

        // A later listing holding both keys settles without flipping slots.
        store.load(vec![
            session("remote-key", "https://a.test", 50_000),
            session("local-key", "https://a.test", 10_000),
        ]);
        assert_eq!(store.get(&id).unwrap().key, "remote-key");
        assert_eq!(store.get(&moved_id).unwrap().key, "local-key");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_tolerates_missing_keys_and_timestamps() {
        let store = SessionStore::default();
        let loaded = store.load(vec![Session {
            url: "https://a.test".into(),
            ..Session::default()
        }]);

        let only = loaded.values().next().unwrap();
        assert!(!only.key.is_empty());
        assert!(only.created_at > 0);
    }

    #[test]
    fn all_deduplicates_by_key() {
        let store = SessionStore::default();
        store.upsert("id-a", session("shared", "https://a.test", 10));
        store.upsert("id-b", session("shared", "https://b.test", 30));
        store.upsert("id-c", session("other", "https://c.test", 20));

        let all = store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].url, "https://b.test");
        assert_eq!(all[1].key, "other");
    }

    #[test]
    fn all_breaks_ties_by_local_id() {
        let store = SessionStore::default();
        store.upsert("id-b", session("shared", "https://b.test", 10));
        store.upsert("id-a", session("shared", "https://a.test", 10));

        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].local_id, "id-a");
    }

    #[test]
    fn update_runs_in_place_and_reports_missing() {
        let store = SessionStore::default();
        store.upsert("id1", session("k1", "https://a.test", 1));

        let result = store.update("id1", |s| {
            s.title = "renamed".into();
            s.title.len()
        });
        assert_eq!(result, Some(7));
        assert_eq!(store.get("id1").unwrap().title, "renamed");
        assert_eq!(store.update("missing", |_| ()), None);
    }

    #[test]
    fn most_recently_accessed_picks_latest() {
        let store = SessionStore::default();
        assert_eq!(store.most_recently_accessed(), None);
        store.upsert("old", session("k1", "https://a.test", 10));
        store.upsert("new", session("k2", "https://b.test", 99));

        assert_eq!(store.most_recently_accessed().as_deref(), Some("new"));
        store.remove("new");
        assert_eq!(store.most_recently_accessed().as_deref(), Some("old"));
    }
}
