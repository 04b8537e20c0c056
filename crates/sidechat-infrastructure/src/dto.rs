//! Response bodies of the remote session service.
//!
//! The service wraps records inconsistently (`[...]` vs `{"sessions": [...]}`,
//! bare record vs `{"session": {...}}`); these types accept both shapes.

use serde::Deserialize;
use sidechat_core::session::Session;

/// Body of `GET /sessions`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionListBody {
    Wrapped { sessions: Vec<Session> },
    Bare(Vec<Session>),
}

impl SessionListBody {
    pub fn into_sessions(self) -> Vec<Session> {
        match self {
            SessionListBody::Wrapped { sessions } | SessionListBody::Bare(sessions) => sessions,
        }
    }
}

/// Body of `GET /sessions/{key}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionBody {
    Wrapped { session: Session },
    Bare(Session),
}

impl SessionBody {
    pub fn into_session(self) -> Session {
        match self {
            SessionBody::Wrapped { session } | SessionBody::Bare(session) => session,
        }
    }
}

/// Body of a save (`POST`/`PUT`). The service may echo the stored record.
#[derive(Debug, Default, Deserialize)]
pub struct SaveResponseBody {
    #[serde(default)]
    pub session: Option<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_accepts_both_shapes() {
        let bare: SessionListBody = serde_json::from_str(r#"[{"key": "a"}]"#).unwrap();
        let wrapped: SessionListBody =
            serde_json::from_str(r#"{"sessions": [{"key": "a"}, {"key": "b"}]}"#).unwrap();

        assert_eq!(bare.into_sessions().len(), 1);
        assert_eq!(wrapped.into_sessions().len(), 2);
    }

    #[test]
    fn single_session_accepts_both_shapes() {
        let wrapped: SessionBody =
            serde_json::from_str(r#"{"session": {"key": "k", "title": "T"}}"#).unwrap();
        let bare: SessionBody = serde_json::from_str(r#"{"key": "k", "title": "T"}"#).unwrap();

        assert_eq!(wrapped.into_session().title, "T");
        assert_eq!(bare.into_session().key, "k");
    }
}
