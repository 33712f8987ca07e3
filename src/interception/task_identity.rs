// src/interception/task_identity.rs
//! Task identities and the network task abstraction
//!
//! A [`TaskIdentity`] is only ever a lookup key. The gate never dereferences
//! it and never extends the lifetime of the task it was derived from.

use crate::utils::errors::ForcedFailure;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Stable, comparable handle for a network task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskIdentity(u64);

impl TaskIdentity {
    /// Allocate a fresh identity from the process-wide sequence
    pub fn next() -> Self {
        Self(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an identity issued elsewhere.
    ///
    /// The gate remembers resolved identities, so a raw value must not be
    /// reused for a new task until `InterceptionTable::forget` has dropped it.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Invoked with the failure when a suppressed task must be abandoned
pub type CompletionCallback = Box<dyn FnOnce(ForcedFailure) + Send + 'static>;

/// What the gate needs from a network task
pub trait NetworkTask: Send + Sync {
    fn identity(&self) -> TaskIdentity;

    /// The real "start sending" primitive, bypassing interception
    fn resume_now(&self);

    /// Complete the task with an error without touching the network
    fn complete_with_error(&self, failure: ForcedFailure);
}

/// Identity of a task, suitable for logging
pub fn task_identity<T: NetworkTask + ?Sized>(task: &T) -> TaskIdentity {
    task.identity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_next_is_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| TaskIdentity::next()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| TaskIdentity::next()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 4000);
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskIdentity::from_raw(42).to_string(), "task-42");
        assert_eq!(TaskIdentity::from_raw(42).as_u64(), 42);
    }
}
