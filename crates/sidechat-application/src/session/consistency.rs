use super::store::SessionStore;
use sidechat_core::page::PageContext;
use sidechat_core::session::{Session, derive_title, is_placeholder_title, now_millis};
use std::time::Duration;

/// Reconciles page-derived session fields with the live page.
///
/// `url`, `description` and `content` of a session only ever change while the
/// page the user is looking at is the page the session belongs to. A session
/// for another page, or a blank session, is never touched by page context.
#[derive(Clone)]
pub struct ConsistencyEnforcer {
    store: SessionStore,
    access_throttle: Duration,
}

impl ConsistencyEnforcer {
    pub fn new(store: SessionStore, access_throttle: Duration) -> Self {
        Self {
            store,
            access_throttle,
        }
    }

    /// Reconciles session `id` against `page`. Returns true if anything changed.
    pub fn reconcile(&self, id: &str, page: &PageContext) -> bool {
        self.reconcile_at(id, page, now_millis())
    }

    /// [`reconcile`](Self::reconcile) with an explicit clock reading.
    pub fn reconcile_at(&self, id: &str, page: &PageContext, now: i64) -> bool {
        let throttle_ms = self.access_throttle_ms();
        let changed = self
            .store
            .update(id, |session| apply_page_context(session, page, now, throttle_ms))
            .unwrap_or(false);

        if changed {
            tracing::debug!("[ConsistencyEnforcer] Session {} reconciled with {}", id, page.url);
        }
        changed
    }

    /// Updates `last_access_time` only (throttled). Used when the session is
    /// not bound to the live page.
    pub fn touch_access(&self, id: &str) -> bool {
        self.touch_access_at(id, now_millis())
    }

    pub fn touch_access_at(&self, id: &str, now: i64) -> bool {
        let throttle_ms = self.access_throttle_ms();
        self.store
            .update(id, |session| session.touch_access(now, throttle_ms))
            .unwrap_or(false)
    }

    fn access_throttle_ms(&self) -> i64 {
        i64::try_from(self.access_throttle.as_millis()).unwrap_or(i64::MAX)
    }
}

fn apply_page_context(session: &mut Session, page: &PageContext, now: i64, throttle_ms: i64) -> bool {
    if session.is_blank() {
        return session.ensure_structure(now);
    }
    if session.url != page.url {
        return false;
    }

    let mut changed = session.ensure_structure(now);
    let mut content_changed = false;

    if !page.description.is_empty() && session.description != page.description {
        session.description = page.description.clone();
        content_changed = true;
    }
    if !page.content.is_empty() && session.content != page.content {
        session.content = page.content.clone();
        content_changed = true;
    }
    if is_placeholder_title(&session.title) {
        let title = derive_title(&page.title, &page.url);
        if session.title != title {
            session.title = title;
            content_changed = true;
        }
    }

    if content_changed {
        session.touch(now);
        changed = true;
    }
    changed |= session.touch_access(now, throttle_ms);
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidechat_core::session::blank_url;

    const MINUTE: i64 = 60_000;

    fn setup(session: Session) -> (ConsistencyEnforcer, String) {
        let store = SessionStore::default();
        let id = store.id_for_url(&session.url);
        store.upsert(&id, session);
        (ConsistencyEnforcer::new(store, Duration::from_secs(60)), id)
    }

    fn page(url: &str) -> PageContext {
        PageContext {
            url: url.into(),
            title: "Fresh Title".into(),
            description: "fresh description".into(),
            content: "# fresh content".into(),
        }
    }

    fn bound_session(url: &str) -> Session {
        Session {
            title: "My notes".into(),
            description: "old description".into(),
            content: "old content".into(),
            ..Session::new("", url, 10 * MINUTE)
        }
    }

    #[test]
    fn mismatched_url_is_a_no_op() {
        let (enforcer, id) = setup(bound_session("https://a.test"));
        let before = enforcer.store.get(&id).unwrap();

        let changed = enforcer.reconcile_at(&id, &page("https://b.test"), 100 * MINUTE);

        assert!(!changed);
        assert_eq!(enforcer.store.get(&id).unwrap(), before);
    }

    #[test]
    fn matching_url_updates_description_and_content() {
        let (enforcer, id) = setup(bound_session("https://a.test"));

        assert!(enforcer.reconcile_at(&id, &page("https://a.test"), 10 * MINUTE + 1));

        let session = enforcer.store.get(&id).unwrap();
        assert_eq!(session.description, "fresh description");
        assert_eq!(session.content, "# fresh content");
        // Explicit titles are never replaced.
        assert_eq!(session.title, "My notes");
        assert_eq!(session.updated_at, 10 * MINUTE + 1);
    }

    #[test]
    fn placeholder_title_is_replaced_from_page() {
        let mut session = bound_session("https://a.test");
        session.title = "New Chat".into();
        let (enforcer, id) = setup(session);

        enforcer.reconcile_at(&id, &page("https://a.test"), 10 * MINUTE);
        assert_eq!(enforcer.store.get(&id).unwrap().title, "Fresh Title.md");
    }

    #[test]
    fn empty_page_fields_do_not_erase_session_fields() {
        let (enforcer, id) = setup(bound_session("https://a.test"));

        let changed = enforcer.reconcile_at(&id, &PageContext::new("https://a.test"), 10 * MINUTE);

        assert!(!changed);
        assert_eq!(enforcer.store.get(&id).unwrap().content, "old content");
    }

    #[test]
    fn access_time_is_throttled() {
        let (enforcer, id) = setup(bound_session("https://a.test"));
        let unchanged_page = PageContext {
            url: "https://a.test".into(),
            ..PageContext::default()
        };

        assert!(!enforcer.reconcile_at(&id, &unchanged_page, 10 * MINUTE + 30_000));
        assert!(enforcer.reconcile_at(&id, &unchanged_page, 11 * MINUTE + 1));
        assert_eq!(enforcer.store.get(&id).unwrap().last_access_time, 11 * MINUTE + 1);
    }

    #[test]
    fn blank_sessions_only_get_structural_fixes() {
        let url = blank_url();
        let mut session = Session::new_blank("", url.clone(), 0);
        session.created_at = 0;
        let (enforcer, id) = setup(session);

        let mut live = page(&url);
        live.url = url.clone();
        assert!(enforcer.reconcile_at(&id, &live, 5 * MINUTE));

        let stored = enforcer.store.get(&id).unwrap();
        assert_eq!(stored.url, url);
        assert!(stored.description.is_empty());
        assert!(stored.content.is_empty());
        assert_eq!(stored.created_at, 5 * MINUTE);

        assert!(!enforcer.reconcile_at(&id, &live, 6 * MINUTE));
    }

    #[test]
    fn touch_access_respects_throttle() {
        let (enforcer, id) = setup(bound_session("https://a.test"));
        assert!(!enforcer.touch_access_at(&id, 10 * MINUTE + 59_000));
        assert!(enforcer.touch_access_at(&id, 12 * MINUTE));
        assert!(!enforcer.touch_access_at("missing", 12 * MINUTE));
    }
}
