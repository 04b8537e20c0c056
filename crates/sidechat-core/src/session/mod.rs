//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Core session record (`Session`)
//! - `message`: Conversation message types (`MessageRole`, `ChatMessage`, `Attachment`)
//! - `derive`: Page-derived titles, domain tags and synthetic URLs
//! - `filter`: Sidebar filtering (`FilterEngine`, `SessionQuery`, `DateRange`)
//! - `event`: Hooks exposed to the rendering layer (`SessionEventListener`)
//! - `repository`: Optional local durable cache (`LocalSessionCache`)

mod derive;
mod event;
mod filter;
mod message;
mod model;
mod repository;

// Re-export public API
pub use derive::{
    BLANK_URL_SCHEME, PLACEHOLDER_TITLES, blank_url, derive_title, domain_tag,
    is_placeholder_title, is_synthetic_url,
};
pub use event::{ActivationTransition, NoopListener, SessionEventListener};
pub use filter::{DateRange, FilterEngine, SessionQuery};
pub use message::{Attachment, ChatMessage, MessageRole};
pub use model::{Session, now_millis};
pub use repository::LocalSessionCache;
