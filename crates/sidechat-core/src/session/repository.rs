//! Local cache trait.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// Optional durable copy of the session collection.
///
/// The remote service stays the source of truth across restarts; the cache
/// only lets the sidebar render before the first remote listing arrives.
#[async_trait]
pub trait LocalSessionCache: Send + Sync {
    /// Loads every cached session. A missing cache yields an empty list.
    async fn load_all(&self) -> Result<Vec<Session>>;

    /// Replaces the cached collection with `sessions`.
    async fn save_all(&self, sessions: &[Session]) -> Result<()>;
}
