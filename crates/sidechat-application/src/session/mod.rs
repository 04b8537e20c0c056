//! Session synchronization engine.
//!
//! This module contains the stateful parts of the engine: the in-memory
//! store, page-context reconciliation, throttled remote writes with their
//! retry queue, and the activation state machine.

mod activation;
mod consistency;
mod retry_queue;
mod scheduler;
mod store;
mod updater;

pub use activation::{ActivateOptions, ActivationController, ActivationState};
pub use consistency::ConsistencyEnforcer;
pub use retry_queue::{QueuedWrite, RetryQueue};
pub use scheduler::SyncScheduler;
pub use store::SessionStore;
pub use updater::SessionUpdater;
