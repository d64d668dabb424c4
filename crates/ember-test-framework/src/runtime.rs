//! # Miniature Scheduler Runtime
//!
//! A single-threaded stand-in for the external Scheduler Runtime, honoring
//! its contract with the backend:
//!
//! - `dependency()` is re-invoked until it returns `None`
//! - jobs on one ring run in push (FIFO) order
//! - `run()` returning a retryable error leaves the job queued
//! - when the hardware fence (or the completion fence, for jobs recovery
//!   already resolved) signals, the outcome is propagated to the
//!   completion fence and `free()` is called exactly once

use alloc::vec::Vec;

use ember_core::{Fence, RingId, SchedBackend, SchedStatus};
use ember_sched::{DeviceState, Job};

// =============================================================================
// ENTRY STATE
// =============================================================================

/// Runtime-side status of a pushed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Not yet run (building dependencies or queued behind its ring)
    Waiting,
    /// `run()` returned a fence; awaiting completion
    Running,
    /// Outcome propagated and `free()` called
    Freed,
}

struct Entry {
    job: Job,
    hw_fence: Option<Fence>,
    status: EntryStatus,
}

// =============================================================================
// TEST RUNTIME
// =============================================================================

/// Single-threaded runtime driving jobs through the backend callbacks
pub struct TestRuntime {
    entries: Vec<Entry>,
}

impl TestRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Queue a job; returns its index for later queries
    pub fn push(&mut self, job: Job) -> usize {
        self.entries.push(Entry {
            job,
            hw_fence: None,
            status: EntryStatus::Waiting,
        });
        self.entries.len() - 1
    }

    /// One scheduling pass; returns whether any job made progress
    pub fn step(&mut self, device: &DeviceState) -> bool {
        let mut progressed = false;
        // Rings whose head-of-queue job has not run yet; later jobs on the
        // same ring must hold their FIFO position
        let mut blocked_rings: Vec<RingId> = Vec::new();

        for entry in &mut self.entries {
            match entry.status {
                EntryStatus::Waiting => {
                    let ring = entry.job.ring();
                    if blocked_rings.contains(&ring) {
                        continue;
                    }
                    match entry.job.dependency() {
                        Some(fence) if !fence.is_signaled() => {
                            blocked_rings.push(ring);
                        }
                        Some(_) => {
                            // Signaled dependency: drained on the next pass
                            progressed = true;
                            blocked_rings.push(ring);
                        }
                        None => match entry.job.run() {
                            Ok(fence) => {
                                entry.hw_fence = Some(fence);
                                entry.status = EntryStatus::Running;
                                progressed = true;
                            }
                            Err(e) if e.is_retryable() => {
                                blocked_rings.push(ring);
                            }
                            Err(e) => {
                                // The backend contract reserves Err for
                                // retryable conditions; surface the breach
                                log::error!("run() returned non-retryable {}", e);
                                blocked_rings.push(ring);
                            }
                        },
                    }
                }
                EntryStatus::Running => {
                    let hw_done = entry
                        .hw_fence
                        .as_ref()
                        .is_some_and(|f| f.is_signaled());
                    let finished = entry.job.finished();
                    if hw_done {
                        // Propagate the hardware outcome (idempotent: a
                        // skip path pre-signaled the completion fence)
                        let error = entry.hw_fence.as_ref().and_then(|f| f.error());
                        finished.signal(error);
                    }
                    if hw_done || finished.is_signaled() {
                        entry.job.free();
                        entry.status = EntryStatus::Freed;
                        progressed = true;
                    }
                }
                EntryStatus::Freed => {}
            }
        }

        device.reap_deferred();
        progressed
    }

    /// Step until no job makes progress or everything is freed
    ///
    /// Returns whether every pushed job was freed. Completions must be
    /// driven by the test between calls; this only drains what is ready.
    pub fn settle(&mut self, device: &DeviceState) -> bool {
        while self.step(device) {}
        self.is_idle()
    }

    /// Whether every pushed job has been freed
    pub fn is_idle(&self) -> bool {
        self.entries.iter().all(|e| e.status == EntryStatus::Freed)
    }

    /// Runtime-side status of job `idx`
    pub fn status(&self, idx: usize) -> EntryStatus {
        self.entries[idx].status
    }

    /// Completion fence of job `idx`
    pub fn finished(&self, idx: usize) -> Fence {
        self.entries[idx].job.finished()
    }

    /// Borrow job `idx` (for snapshots and assertions)
    pub fn job(&self, idx: usize) -> &Job {
        &self.entries[idx].job
    }

    /// Report a timeout against job `idx`, as the watchdog would
    pub fn timed_out(&mut self, idx: usize) -> SchedStatus {
        self.entries[idx].job.timed_out()
    }
}
