//! Application layer for Sidechat.
//!
//! This crate wires the domain types of `sidechat-core` into a running
//! engine: `SessionService` is the one object the UI layer holds, built once
//! with its collaborators injected.

pub mod session;
pub mod session_service;

pub use session::{ActivateOptions, ActivationController, ActivationState, SessionStore, SyncScheduler};
pub use session_service::{Collaborators, SessionService};

#[cfg(test)]
mod test_support;
