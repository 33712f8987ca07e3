// src/interception/resume_gate.rs
//! Resume gate
//!
//! Decides, on every attempt to start a network task, whether the real
//! resume may run now.
//!
//! # State machine
//!
//! ```text
//!                 register            1st resume           2nd resume
//! (unprotected) ──────────▶ Pending ────────────▶ Suppressed ───────────▶ Resolved(Proceed)
//!                              │                       │
//!                 forced error │ resume   fail_pending │
//!                              ▼                       ▼
//!                       Resolved(Failed) ◀─────────────┘
//! ```
//!
//! The gate never waits on attestation. Suppression means returning
//! `false` immediately and leaving the attestation to the caller.

use crate::interception::event_log::{GateEventKind, GateEventLog};
use crate::interception::interception_table::{InterceptionTable, Resolution, ResumeTransition};
use crate::interception::task_identity::{CompletionCallback, NetworkTask, TaskIdentity};
use crate::utils::config::ServiceConfig;
use crate::utils::errors::{ForcedFailure, GateError, Result};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{debug, warn};

static GLOBAL_GATE: Lazy<ResumeGate> = Lazy::new(ResumeGate::new);

const DECISIONS_METRIC: &str = "attest_gate_decisions_total";
const VIOLATIONS_METRIC: &str = "attest_gate_protocol_violations_total";

/// What the caller must do with a resume attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Call the real resume now
    Proceed,

    /// Do not resume; start attestation for this task
    Suppressed,

    /// Do not resume; the task has already been failed
    Failed,
}

impl ResumeDecision {
    pub fn should_execute(&self) -> bool {
        matches!(self, ResumeDecision::Proceed)
    }

    fn metric_label(&self) -> &'static str {
        match self {
            ResumeDecision::Proceed => "proceed",
            ResumeDecision::Suppressed => "suppressed",
            ResumeDecision::Failed => "failed",
        }
    }
}

/// Resume gate over an [`InterceptionTable`]
pub struct ResumeGate {
    table: Arc<InterceptionTable>,
    events: Option<Arc<GateEventLog>>,
}

impl ResumeGate {
    pub fn new() -> Self {
        Self::with_table(Arc::new(InterceptionTable::new()))
    }

    /// Gate over an existing, possibly shared, table
    pub fn with_table(table: Arc<InterceptionTable>) -> Self {
        Self {
            table,
            events: None,
        }
    }

    /// Gate over a fresh table, logging into an event log sized from `config`
    pub fn with_config(config: &ServiceConfig) -> Result<Self> {
        let events = GateEventLog::new(config.event_log_capacity)?;
        Ok(Self::new().with_event_log(Arc::new(events)))
    }

    /// Record every decision into `events`
    pub fn with_event_log(mut self, events: Arc<GateEventLog>) -> Self {
        self.events = Some(events);
        self
    }

    /// Process-wide gate instance
    pub fn global() -> &'static ResumeGate {
        &GLOBAL_GATE
    }

    pub fn table(&self) -> &Arc<InterceptionTable> {
        &self.table
    }

    pub fn event_log(&self) -> Option<&Arc<GateEventLog>> {
        self.events.as_ref()
    }

    pub fn task_identity<T: NetworkTask + ?Sized>(&self, task: &T) -> TaskIdentity {
        task.identity()
    }

    /// Mark a task as needing attestation before its first real resume.
    ///
    /// `callback` receives the failure if the task is abandoned after
    /// suppression. Must be called before the first resume attempt.
    pub fn mark_for_protection<T: NetworkTask + ?Sized>(
        &self,
        task: &T,
        callback: CompletionCallback,
    ) -> Result<()> {
        let identity = task.identity();
        let result = self.table.register(identity, callback);
        self.after_registration(identity, &result, GateEventKind::Registered);
        result
    }

    /// Mark a task that must fail instead of ever reaching the network
    pub fn mark_forced_failure<T: NetworkTask + ?Sized>(
        &self,
        task: &T,
        failure: ForcedFailure,
    ) -> Result<()> {
        let identity = task.identity();
        let result = self.table.register_forced_error(identity, failure);
        self.after_registration(identity, &result, GateEventKind::ForcedErrorRegistered);
        result
    }

    fn after_registration(&self, identity: TaskIdentity, result: &Result<()>, kind: GateEventKind) {
        match result {
            Ok(()) => {
                debug!(%identity, "Task marked for protection");
                self.record(identity, kind);
            }
            Err(GateError::ProtocolViolation { .. }) => {
                metrics::counter!(VIOLATIONS_METRIC).increment(1);
                self.record(identity, GateEventKind::ProtocolViolation);
            }
            Err(_) => {}
        }
    }

    /// Decide what to do with a resume attempt.
    ///
    /// A forced failure is delivered through
    /// [`NetworkTask::complete_with_error`] before this returns.
    pub fn decide<T: NetworkTask + ?Sized>(&self, task: &T) -> ResumeDecision {
        let identity = task.identity();

        let decision = match self.table.advance(identity) {
            ResumeTransition::Unprotected => {
                self.record(identity, GateEventKind::PassedThrough);
                ResumeDecision::Proceed
            }
            ResumeTransition::Suppress => {
                debug!(%identity, "Suppressed first resume pending attestation");
                self.record(identity, GateEventKind::Suppressed);
                ResumeDecision::Suppressed
            }
            ResumeTransition::Release => {
                debug!(%identity, "Released resume");
                self.record(identity, GateEventKind::Released);
                ResumeDecision::Proceed
            }
            ResumeTransition::Fail(failure) => {
                warn!(%identity, %failure, "Forcing task failure instead of resume");
                task.complete_with_error(failure);
                self.record(identity, GateEventKind::ForcedFailureDelivered);
                ResumeDecision::Failed
            }
            ResumeTransition::AlreadyResolved(Resolution::Proceed) => ResumeDecision::Proceed,
            ResumeTransition::AlreadyResolved(Resolution::Failed) => {
                debug!(%identity, "Blocked resume of failed task");
                self.record(identity, GateEventKind::ResumeBlocked);
                ResumeDecision::Failed
            }
        };

        metrics::counter!(DECISIONS_METRIC, "decision" => decision.metric_label()).increment(1);
        decision
    }

    /// True if the caller should call the real resume now
    pub fn should_execute_resume<T: NetworkTask + ?Sized>(&self, task: &T) -> bool {
        self.decide(task).should_execute()
    }

    /// Let an attested task go after its first resume was suppressed.
    ///
    /// True exactly once, for the caller that performs the release. False if
    /// a concurrent resume already released the task or it was failed, in
    /// which case the caller must not resume it again.
    pub fn release_attested<T: NetworkTask + ?Sized>(&self, task: &T) -> bool {
        let identity = task.identity();

        if self.table.release_suppressed(identity) {
            debug!(%identity, "Released attested task");
            self.record(identity, GateEventKind::Released);
            metrics::counter!(DECISIONS_METRIC, "decision" => ResumeDecision::Proceed.metric_label())
                .increment(1);
            true
        } else {
            debug!(%identity, "Attested task was already resolved");
            false
        }
    }

    /// Deliver an attestation failure through the stored completion callback.
    ///
    /// Returns false if there was no awaiting entry, e.g. because another
    /// thread already delivered or released it.
    pub fn fail_pending(&self, identity: TaskIdentity, failure: ForcedFailure) -> bool {
        match self.table.take_if_awaiting(identity) {
            Some(callback) => {
                warn!(%identity, %failure, "Cancelling protected task");
                callback(failure);
                self.record(identity, GateEventKind::CallbackDelivered);
                true
            }
            None => {
                debug!(%identity, "No awaiting completion to fail");
                false
            }
        }
    }

    fn record(&self, identity: TaskIdentity, kind: GateEventKind) {
        if let Some(events) = &self.events {
            events.record(identity, kind);
        }
    }
}

impl Default for ResumeGate {
    fn default() -> Self {
        Self::new()
    }
}
