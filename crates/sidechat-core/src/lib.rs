//! Domain layer for Sidechat.
//!
//! This crate holds the session model, the pure session algorithms
//! (identity resolution, filtering, title/tag derivation), and the traits
//! through which the engine talks to its collaborators (remote service,
//! page context, notifications, credentials, UI listeners).

pub mod config;
pub mod error;
pub mod identity;
pub mod page;
pub mod remote;
pub mod session;

// Re-export common error type
pub use error::{ErrorKind, Result, SidechatError};
