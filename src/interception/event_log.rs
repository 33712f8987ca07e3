// src/interception/event_log.rs
//! Lock-free log of gate decisions
//!
//! A bounded MPMC queue the gate pushes into on every registration and
//! resume decision. When full, new events are dropped and counted rather
//! than blocking the resuming thread.

use crate::interception::task_identity::TaskIdentity;
use crate::utils::errors::{GateError, Result};
use chrono::{DateTime, Utc};
use crossbeam::queue::ArrayQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Kind of gate event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateEventKind {
    Registered,
    ForcedErrorRegistered,
    PassedThrough,
    Suppressed,
    Released,
    ForcedFailureDelivered,
    CallbackDelivered,
    ResumeBlocked,
    ProtocolViolation,
}

/// One recorded gate event
#[derive(Debug, Clone, Serialize)]
pub struct GateEvent {
    pub identity: TaskIdentity,
    pub kind: GateEventKind,
    pub at: DateTime<Utc>,
}

impl GateEvent {
    pub fn new(identity: TaskIdentity, kind: GateEventKind) -> Self {
        Self {
            identity,
            kind,
            at: Utc::now(),
        }
    }
}

/// Bounded gate event log
pub struct GateEventLog {
    queue: ArrayQueue<GateEvent>,
    push_count: AtomicU64,
    drop_count: AtomicU64,
}

impl GateEventLog {
    /// Log holding at most `capacity` events; zero is rejected
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GateError::ConfigError(
                "event log capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            queue: ArrayQueue::new(capacity),
            push_count: AtomicU64::new(0),
            drop_count: AtomicU64::new(0),
        })
    }

    /// Record an event (non-blocking)
    pub fn record(&self, identity: TaskIdentity, kind: GateEventKind) {
        match self.queue.push(GateEvent::new(identity, kind)) {
            Ok(()) => {
                self.push_count.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove and return every queued event, oldest first
    pub fn drain(&self) -> Vec<GateEvent> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            events.push(event);
        }
        events
    }

    /// Drain queued events as a JSON array
    pub fn export_json(&self) -> Result<String> {
        let events = self.drain();
        debug!("Exporting {} gate events", events.len());
        serde_json::to_string_pretty(&events)
            .map_err(|e| GateError::ExportFailed(format!("JSON serialization error: {}", e)))
    }

    pub fn stats(&self) -> EventLogStats {
        EventLogStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Event log statistics
#[derive(Debug, Clone)]
pub struct EventLogStats {
    pub push_count: u64,
    pub drop_count: u64,
    pub current_size: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_and_drain() {
        let log = GateEventLog::new(8).unwrap();
        let id = TaskIdentity::from_raw(3);

        log.record(id, GateEventKind::Registered);
        log.record(id, GateEventKind::Suppressed);

        let events = log.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, GateEventKind::Registered);
        assert_eq!(events[1].kind, GateEventKind::Suppressed);
        assert!(log.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(GateEventLog::new(0), Err(GateError::ConfigError(_))));
        assert_eq!(GateEventLog::new(1).unwrap().stats().capacity, 1);
    }

    #[test]
    fn test_full_log_drops() {
        let log = GateEventLog::new(2).unwrap();
        let id = TaskIdentity::from_raw(1);

        log.record(id, GateEventKind::Registered);
        log.record(id, GateEventKind::Suppressed);
        log.record(id, GateEventKind::Released);

        let stats = log.stats();
        assert_eq!(stats.push_count, 2);
        assert_eq!(stats.drop_count, 1);
        assert_eq!(stats.current_size, 2);
    }

    #[test]
    fn test_export_json() {
        let log = GateEventLog::new(4).unwrap();
        log.record(TaskIdentity::from_raw(9), GateEventKind::ForcedFailureDelivered);

        let json = log.export_json().unwrap();
        assert!(json.contains("\"identity\": 9"));
        assert!(json.contains("forced_failure_delivered"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_concurrent_record() {
        let log = Arc::new(GateEventLog::new(1000).unwrap());
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for _ in 0..100 {
                        log.record(TaskIdentity::from_raw(i), GateEventKind::PassedThrough);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.stats().push_count, 1000);
        assert_eq!(log.len(), 1000);
    }
}
