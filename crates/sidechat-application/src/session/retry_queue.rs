use sidechat_core::remote::SaveIntent;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A write that still has to reach the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedWrite {
    /// Local id of the session; the payload is rebuilt from the store on every attempt.
    pub id: String,
    pub intent: SaveIntent,
    pub attempts: u32,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueuedWrite>,
    draining: bool,
}

/// FIFO of pending remote writes, at most one entry per session id.
///
/// Queuing an id that is already waiting merges into the existing entry, so
/// whatever is in the store when the entry is drained is what gets sent. A
/// pending `Create` is never downgraded to `Update`.
#[derive(Default)]
pub struct RetryQueue {
    state: Mutex<QueueState>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a write for `id`.
    ///
    /// Returns true if the caller must start a drain worker (no worker is running).
    pub fn push(&self, id: &str, intent: SaveIntent) -> bool {
        self.push_entry(QueuedWrite {
            id: id.to_string(),
            intent,
            attempts: 0,
        })
    }

    /// Puts back an entry after a failed attempt, keeping its attempt count.
    pub fn requeue(&self, entry: QueuedWrite) -> bool {
        self.push_entry(entry)
    }

    fn push_entry(&self, entry: QueuedWrite) -> bool {
        let mut state = self.lock();
        match state.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                if entry.intent == SaveIntent::Create {
                    existing.intent = SaveIntent::Create;
                }
                existing.attempts = existing.attempts.max(entry.attempts);
            }
            None => state.entries.push_back(entry),
        }
        if state.draining {
            false
        } else {
            state.draining = true;
            true
        }
    }

    /// Takes the next entry. When the queue is empty the worker flag is
    /// released in the same critical section, so a concurrent `push` starts a
    /// new worker instead of being stranded.
    pub fn pop(&self) -> Option<QueuedWrite> {
        let mut state = self.lock();
        let next = state.entries.pop_front();
        if next.is_none() {
            state.draining = false;
        }
        next
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != id);
        state.entries.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
