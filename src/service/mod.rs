// src/service/mod.rs
//! Protection service: the networking-layer side of the gate
//!
//! ```text
//! resume(task)
//!     │
//!     ├─ Proceed    → task.resume_now()
//!     ├─ Suppressed → spawn attest(request)
//!     │                  ├─ Ok(updated) → replace request → release_attested → resume_now
//!     │                  ├─ Err(failure) → stored completion callback
//!     │                  └─ dropped      → callback with a cancelled failure
//!     └─ Failed     → nothing (failure already delivered)
//! ```

pub mod protection_service;

pub use protection_service::{ProtectedTask, ProtectionService, ResumeOutcome};
