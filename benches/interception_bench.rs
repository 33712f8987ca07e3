// benches/interception_bench.rs
//! Resume gate decision latency

use attest_gate::{ForcedFailure, NetworkTask, ResumeGate, TaskIdentity};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;

struct BenchTask(TaskIdentity);

impl NetworkTask for BenchTask {
    fn identity(&self) -> TaskIdentity {
        self.0
    }

    fn resume_now(&self) {}

    fn complete_with_error(&self, _failure: ForcedFailure) {}
}

fn bench_unprotected(c: &mut Criterion) {
    let gate = ResumeGate::new();
    let task = BenchTask(TaskIdentity::next());

    c.bench_function("resume_unprotected", |b| {
        b.iter(|| black_box(gate.should_execute_resume(&task)))
    });
}

fn bench_protected_lifecycle(c: &mut Criterion) {
    let gate = ResumeGate::new();

    c.bench_function("protect_suppress_release", |b| {
        b.iter(|| {
            let task = BenchTask(TaskIdentity::next());
            gate.mark_for_protection(&task, Box::new(|_| {})).unwrap();
            black_box(gate.should_execute_resume(&task));
            black_box(gate.should_execute_resume(&task));
            gate.table().forget(task.identity());
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    let gate = Arc::new(ResumeGate::new());

    c.bench_function("contended_4_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let gate = Arc::clone(&gate);
                    thread::spawn(move || {
                        for _ in 0..64 {
                            let task = BenchTask(TaskIdentity::next());
                            gate.mark_for_protection(&task, Box::new(|_| {})).unwrap();
                            gate.should_execute_resume(&task);
                            gate.should_execute_resume(&task);
                            gate.table().forget(task.identity());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_unprotected, bench_protected_lifecycle, bench_contended);
criterion_main!(benches);
