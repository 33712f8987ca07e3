// src/interception/mod.rs
//! Task-resume interception
//!
//! - **Task Identity**: non-owning lookup keys and the network task seam
//! - **Interception Table**: pending entries and resolution tombstones
//! - **Resume Gate**: the per-attempt proceed / suppress / fail decision
//! - **Event Log**: bounded record of gate decisions
//!
//! # Architecture
//!
//! ```text
//! Networking layer
//!     │  mark_for_protection / mark_forced_failure
//!     ▼
//! Resume Gate ──advance / take──▶ Interception Table (one lock)
//!     │
//!     └─ decision ──▶ proceed | suppress (attest elsewhere) | fail now
//! ```

pub mod event_log;
pub mod interception_table;
pub mod resume_gate;
pub mod task_identity;

// Re-export commonly used types
pub use event_log::{GateEvent, GateEventKind, GateEventLog};
pub use interception_table::{InterceptionTable, PendingEntry, Resolution, ResumeTransition, TableStats};
pub use resume_gate::{ResumeDecision, ResumeGate};
pub use task_identity::{task_identity, CompletionCallback, NetworkTask, TaskIdentity};
