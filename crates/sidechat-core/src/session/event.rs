use super::model::Session;

/// Activation state changes, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationTransition {
    /// The previously active session lost focus.
    Deactivated { id: String },
    /// `id` is being prepared (remote refresh, page reconciliation).
    Activating { id: String },
    /// `id` is now the active session.
    Activated { id: String },
}

/// Hooks the rendering layer subscribes to.
///
/// Callbacks are invoked synchronously after the store mutation completed and
/// must not block.
pub trait SessionEventListener: Send + Sync {
    /// The visible session collection changed (created, deleted, edited, refreshed).
    fn on_session_list_changed(&self, sessions: &[Session]);

    /// The active session changed; `None` when no session remains.
    fn on_active_session_changed(&self, session: Option<&Session>);

    fn on_activation_transition(&self, _transition: &ActivationTransition) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionEventListener for NoopListener {
    fn on_session_list_changed(&self, _sessions: &[Session]) {}

    fn on_active_session_changed(&self, _session: Option<&Session>) {}
}
