// src/service/protection_service.rs
//! Protection service
//!
//! Drives the gate for a networking layer: a suppressed resume starts an
//! attestation on the tokio runtime, and its outcome either resumes the task
//! with the attested request or fails it through the stored callback.

use crate::attestation::{Attestor, OutgoingRequest};
use crate::interception::resume_gate::{ResumeDecision, ResumeGate};
use crate::interception::task_identity::{CompletionCallback, NetworkTask, TaskIdentity};
use crate::utils::config::ServiceConfig;
use crate::utils::errors::{FailureKind, ForcedFailure, GateError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Network task whose outgoing request can be read and replaced
pub trait ProtectedTask: NetworkTask {
    fn request(&self) -> OutgoingRequest;

    fn replace_request(&self, request: OutgoingRequest);
}

/// What happened to a resume attempt
#[derive(Debug)]
pub enum ResumeOutcome {
    /// Real resume was called
    Resumed,

    /// Resume withheld; attestation is running
    Attesting(JoinHandle<()>),

    /// Task was failed instead of sent
    Failed,
}

impl ResumeOutcome {
    pub fn decision(&self) -> ResumeDecision {
        match self {
            ResumeOutcome::Resumed => ResumeDecision::Proceed,
            ResumeOutcome::Attesting(_) => ResumeDecision::Suppressed,
            ResumeOutcome::Failed => ResumeDecision::Failed,
        }
    }
}

/// Gate plus attestor, wired on a tokio runtime
pub struct ProtectionService<A: Attestor> {
    gate: Arc<ResumeGate>,
    attestor: Arc<A>,
    timeout: Option<Duration>,
    runtime: Handle,
    in_flight: Arc<AtomicUsize>,
}

impl<A: Attestor> ProtectionService<A> {
    /// Create a service on the current tokio runtime with a gate of its own,
    /// logging into an event log sized from `config`
    pub fn from_config(attestor: A, config: &ServiceConfig) -> Result<Self> {
        let gate = Arc::new(ResumeGate::with_config(config)?);
        Self::new(gate, attestor, config)
    }

    /// Create a service on the current tokio runtime
    pub fn new(gate: Arc<ResumeGate>, attestor: A, config: &ServiceConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            GateError::ConfigError(format!("protection service needs a tokio runtime: {}", e))
        })?;
        Ok(Self::with_runtime(gate, attestor, config, runtime))
    }

    pub fn with_runtime(
        gate: Arc<ResumeGate>,
        attestor: A,
        config: &ServiceConfig,
        runtime: Handle,
    ) -> Self {
        info!(
            "Protection service started (attestation timeout: {:?})",
            config.attestation_timeout()
        );

        Self {
            gate,
            attestor: Arc::new(attestor),
            timeout: config.attestation_timeout(),
            runtime,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gate(&self) -> &Arc<ResumeGate> {
        &self.gate
    }

    pub fn attestor(&self) -> &Arc<A> {
        &self.attestor
    }

    /// Mark a task for attestation before its first resume
    pub fn protect<T: ProtectedTask + ?Sized>(
        &self,
        task: &T,
        callback: CompletionCallback,
    ) -> Result<()> {
        self.gate.mark_for_protection(task, callback)
    }

    /// Mark a task that must fail without reaching the network
    pub fn forbid<T: ProtectedTask + ?Sized>(
        &self,
        task: &T,
        failure: ForcedFailure,
    ) -> Result<()> {
        self.gate.mark_forced_failure(task, failure)
    }

    /// Intercepted resume: call this wherever the task would be resumed
    pub fn resume<T: ProtectedTask + 'static>(&self, task: &Arc<T>) -> ResumeOutcome {
        match self.gate.decide(task.as_ref()) {
            ResumeDecision::Proceed => {
                task.resume_now();
                ResumeOutcome::Resumed
            }
            ResumeDecision::Suppressed => {
                ResumeOutcome::Attesting(self.spawn_attestation(Arc::clone(task)))
            }
            ResumeDecision::Failed => ResumeOutcome::Failed,
        }
    }

    /// Attestations currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn spawn_attestation<T: ProtectedTask + 'static>(&self, task: Arc<T>) -> JoinHandle<()> {
        let gate = Arc::clone(&self.gate);
        let attestor = Arc::clone(&self.attestor);
        let timeout = self.timeout;
        let mut guard = AttestationGuard::start(&gate, task.identity(), &self.in_flight);

        self.runtime.spawn(async move {
            run_attestation(gate, attestor, task, timeout).await;
            guard.finished = true;
        })
    }
}

/// One running attestation. Dropping it unfinished (abort, panic, runtime
/// shutdown) fails the task as cancelled so its callback is never lost.
struct AttestationGuard {
    gate: Arc<ResumeGate>,
    identity: TaskIdentity,
    in_flight: Arc<AtomicUsize>,
    finished: bool,
}

impl AttestationGuard {
    fn start(gate: &Arc<ResumeGate>, identity: TaskIdentity, in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::AcqRel);
        Self {
            gate: Arc::clone(gate),
            identity,
            in_flight: Arc::clone(in_flight),
            finished: false,
        }
    }
}

impl Drop for AttestationGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);

        if !self.finished {
            warn!(identity = %self.identity, "Attestation dropped before it finished");
            self.gate.fail_pending(
                self.identity,
                ForcedFailure::new(FailureKind::Cancelled, "attestation was cancelled"),
            );
        }
    }
}

async fn run_attestation<A: Attestor, T: ProtectedTask>(
    gate: Arc<ResumeGate>,
    attestor: Arc<A>,
    task: Arc<T>,
    timeout: Option<Duration>,
) {
    let identity = task.identity();
    let request = task.request();
    debug!(%identity, "Attesting {}", request.url());

    let attested = match timeout {
        Some(limit) => match tokio::time::timeout(limit, attestor.attest(request)).await {
            Ok(result) => result,
            Err(_) => Err(ForcedFailure::new(
                FailureKind::Timeout,
                format!("attestation did not finish within {}ms", limit.as_millis()),
            )),
        },
        None => attestor.attest(request).await,
    };

    match attested {
        Ok(updated) => {
            task.replace_request(updated);
            if gate.release_attested(task.as_ref()) {
                task.resume_now();
            } else {
                debug!(%identity, "Task already released or failed; not resuming again");
            }
        }
        Err(failure) => {
            if !gate.fail_pending(identity, failure) {
                debug!(%identity, "Task already resolved before attestation failed");
            }
        }
    }
}
