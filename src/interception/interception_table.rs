// src/interception/interception_table.rs
//! Interception table for protected tasks
//!
//! Maps a [`TaskIdentity`] to the state the gate needs while a task waits for
//! attestation. Every operation runs under a single lock, so a take is an
//! atomic check-and-remove and exactly one caller wins any race.
//!
//! Identities whose entry has been consumed keep a tombstone recording how
//! they were resolved. A tombstoned identity can never be registered again.

use crate::interception::task_identity::{CompletionCallback, TaskIdentity};
use crate::utils::errors::{ForcedFailure, GateError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// State held for a registered task
pub enum PendingEntry {
    /// Waiting for attestation; the callback is the only way back to the caller
    AwaitingCompletion(CompletionCallback),

    /// Must fail on the next resume attempt
    ForcedError(ForcedFailure),
}

impl fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingEntry::AwaitingCompletion(_) => f.write_str("AwaitingCompletion(..)"),
            PendingEntry::ForcedError(err) => f.debug_tuple("ForcedError").field(err).finish(),
        }
    }
}

/// Terminal outcome recorded in a tombstone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Real resume was released
    Proceed,

    /// Failure delivered instead of sending
    Failed,
}

/// Result of feeding one resume attempt through the table
#[derive(Debug, PartialEq, Eq)]
pub enum ResumeTransition {
    /// Identity never registered
    Unprotected,

    /// First attempt on an awaiting task; withhold the resume
    Suppress,

    /// Attempt after suppression; entry removed, resume may run
    Release,

    /// Forced error consumed; deliver it instead of resuming
    Fail(ForcedFailure),

    /// Entry already consumed earlier
    AlreadyResolved(Resolution),
}

struct Slot {
    entry: PendingEntry,
    suppressed: bool,
}

struct Tombstone {
    resolution: Resolution,
    resolved_at: Instant,
}

#[derive(Default)]
struct TableState {
    pending: HashMap<TaskIdentity, Slot>,
    resolved: HashMap<TaskIdentity, Tombstone>,
}

impl TableState {
    fn resolve(&mut self, identity: TaskIdentity, resolution: Resolution) {
        self.resolved.insert(
            identity,
            Tombstone {
                resolution,
                resolved_at: Instant::now(),
            },
        );
    }
}

/// Table statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Entries registered and not yet consumed
    pub pending: usize,

    /// Pending entries whose first resume was withheld
    pub suppressed: usize,

    /// Tombstones
    pub resolved: usize,
}

/// Concurrency-safe store of pending interceptions
pub struct InterceptionTable {
    state: Mutex<TableState>,
}

impl InterceptionTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
        }
    }

    /// Register a task that is waiting for attestation
    pub fn register(&self, identity: TaskIdentity, callback: CompletionCallback) -> Result<()> {
        self.insert(identity, PendingEntry::AwaitingCompletion(callback))
    }

    /// Register a task that must fail on its first resume attempt
    pub fn register_forced_error(&self, identity: TaskIdentity, failure: ForcedFailure) -> Result<()> {
        self.insert(identity, PendingEntry::ForcedError(failure))
    }

    fn insert(&self, identity: TaskIdentity, entry: PendingEntry) -> Result<()> {
        let mut state = self.state.lock();

        let detail = if state.pending.contains_key(&identity) {
            Some("task is already registered")
        } else if state.resolved.contains_key(&identity) {
            Some("task was already resolved and cannot be registered again")
        } else {
            None
        };

        if let Some(detail) = detail {
            drop(state);
            error!(%identity, ?entry, "Rejected registration: {}", detail);
            return Err(GateError::ProtocolViolation {
                identity,
                detail: detail.to_string(),
            });
        }

        trace!(%identity, ?entry, "Registered task");
        state.pending.insert(
            identity,
            Slot {
                entry,
                suppressed: false,
            },
        );
        Ok(())
    }

    /// Remove and return the callback of an awaiting task.
    ///
    /// Leaves forced-error entries untouched. A successful take resolves the
    /// identity as failed, since the caller now owns delivery of the result.
    pub fn take_if_awaiting(&self, identity: TaskIdentity) -> Option<CompletionCallback> {
        let mut state = self.state.lock();

        if !matches!(
            state.pending.get(&identity),
            Some(Slot {
                entry: PendingEntry::AwaitingCompletion(_),
                ..
            })
        ) {
            return None;
        }

        let slot = state.pending.remove(&identity)?;
        state.resolve(identity, Resolution::Failed);

        match slot.entry {
            PendingEntry::AwaitingCompletion(callback) => Some(callback),
            PendingEntry::ForcedError(_) => None,
        }
    }

    /// Remove and return the error of a forced-error task
    pub fn take_forced_error(&self, identity: TaskIdentity) -> Option<ForcedFailure> {
        let mut state = self.state.lock();

        if !matches!(
            state.pending.get(&identity),
            Some(Slot {
                entry: PendingEntry::ForcedError(_),
                ..
            })
        ) {
            return None;
        }

        let slot = state.pending.remove(&identity)?;
        state.resolve(identity, Resolution::Failed);

        match slot.entry {
            PendingEntry::ForcedError(failure) => Some(failure),
            PendingEntry::AwaitingCompletion(_) => None,
        }
    }

    /// True if the identity was ever registered, pending or resolved
    pub fn is_registered(&self, identity: TaskIdentity) -> bool {
        let state = self.state.lock();
        state.pending.contains_key(&identity) || state.resolved.contains_key(&identity)
    }

    /// True if the identity still holds an unconsumed entry
    pub fn is_pending(&self, identity: TaskIdentity) -> bool {
        self.state.lock().pending.contains_key(&identity)
    }

    /// Recorded outcome for a resolved identity
    pub fn resolution(&self, identity: TaskIdentity) -> Option<Resolution> {
        self.state
            .lock()
            .resolved
            .get(&identity)
            .map(|tombstone| tombstone.resolution)
    }

    /// Apply one resume attempt to the identity's state
    pub fn advance(&self, identity: TaskIdentity) -> ResumeTransition {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(tombstone) = state.resolved.get(&identity) {
            return ResumeTransition::AlreadyResolved(tombstone.resolution);
        }

        match state.pending.get_mut(&identity) {
            None => return ResumeTransition::Unprotected,
            Some(slot)
                if matches!(slot.entry, PendingEntry::AwaitingCompletion(_)) && !slot.suppressed =>
            {
                slot.suppressed = true;
                return ResumeTransition::Suppress;
            }
            Some(_) => {}
        }

        match state.pending.remove(&identity) {
            Some(Slot {
                entry: PendingEntry::AwaitingCompletion(_),
                ..
            }) => {
                state.resolve(identity, Resolution::Proceed);
                ResumeTransition::Release
            }
            Some(Slot {
                entry: PendingEntry::ForcedError(failure),
                ..
            }) => {
                state.resolve(identity, Resolution::Failed);
                ResumeTransition::Fail(failure)
            }
            None => ResumeTransition::Unprotected,
        }
    }

    /// Release a suppressed awaiting task once its attestation has finished.
    ///
    /// Only the Suppressed -> Resolved(Proceed) step returns true. Returns
    /// false if another resume already released the task, if it was failed,
    /// or if its first resume was never withheld.
    pub fn release_suppressed(&self, identity: TaskIdentity) -> bool {
        let mut state = self.state.lock();

        if !matches!(
            state.pending.get(&identity),
            Some(Slot {
                entry: PendingEntry::AwaitingCompletion(_),
                suppressed: true,
            })
        ) {
            return false;
        }

        state.pending.remove(&identity);
        state.resolve(identity, Resolution::Proceed);
        true
    }

    /// Drop the tombstone of a resolved identity, e.g. when its task is freed.
    ///
    /// Returns false if the identity is unknown or still pending.
    pub fn forget(&self, identity: TaskIdentity) -> bool {
        self.state.lock().resolved.remove(&identity).is_some()
    }

    /// Drop tombstones older than `max_age`; returns how many were removed
    pub fn prune_resolved(&self, max_age: Duration) -> usize {
        let mut state = self.state.lock();
        let before = state.resolved.len();
        let now = Instant::now();

        state
            .resolved
            .retain(|_, tombstone| now.duration_since(tombstone.resolved_at) < max_age);

        let removed = before - state.resolved.len();
        if removed > 0 {
            debug!("Pruned {} resolved task(s)", removed);
        }
        removed
    }

    pub fn stats(&self) -> TableStats {
        let state = self.state.lock();
        TableStats {
            pending: state.pending.len(),
            suppressed: state.pending.values().filter(|slot| slot.suppressed).count(),
            resolved: state.resolved.len(),
        }
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}

impl Default for InterceptionTable {
    fn default() -> Self {
        Self::new()
    }
}
