//! # Debug Snapshots
//!
//! Read-only views of jobs and fences for postmortem serialization.
//!
//! The dump consumer sees command-buffer references, ring ids, fence
//! sequence numbers, and context ids, and must not (and structurally
//! cannot) mutate any scheduler state through them.

use alloc::vec::Vec;

use ember_core::{CmdBuffer, ContextId, Fence, FenceError, JobPriority, RingId, SeqNo};

use crate::job::{Job, JobPhase};

// =============================================================================
// FENCE SNAPSHOT
// =============================================================================

/// Point-in-time view of a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceSnapshot {
    /// Owning ring
    pub ring: RingId,
    /// Per-ring sequence number
    pub seq: SeqNo,
    /// Whether the fence had signaled at capture time
    pub signaled: bool,
    /// Sticky error at capture time
    pub error: Option<FenceError>,
}

impl FenceSnapshot {
    /// Capture the current state of a fence
    pub fn capture(fence: &Fence) -> Self {
        // Read the outcome once: signaled and error must be consistent
        let outcome = fence.outcome();
        let (signaled, error) = match outcome {
            ember_core::FenceOutcome::Pending => (false, None),
            ember_core::FenceOutcome::Signaled(Ok(())) => (true, None),
            ember_core::FenceOutcome::Signaled(Err(e)) => (true, Some(e)),
        };
        Self {
            ring: fence.ring(),
            seq: fence.seq(),
            signaled,
            error,
        }
    }
}

// =============================================================================
// JOB SNAPSHOT
// =============================================================================

/// Point-in-time view of a job
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    /// Target ring
    pub ring: RingId,
    /// Scheduling priority
    pub priority: JobPriority,
    /// Owning context
    pub context: ContextId,
    /// Submit ticket
    pub ticket: u64,
    /// Lifecycle phase at capture time
    pub phase: JobPhase,
    /// Command-buffer references
    pub buffers: Vec<CmdBuffer>,
    /// Completion fence state
    pub finished: FenceSnapshot,
    /// Hardware fence state, if the job reached hardware
    pub hw_fence: Option<FenceSnapshot>,
}

impl JobSnapshot {
    /// Capture the current state of a job
    pub fn capture(job: &Job) -> Self {
        Self {
            ring: job.ring(),
            priority: job.priority(),
            context: job.context().id(),
            ticket: job.ticket(),
            phase: job.phase(),
            buffers: job.buffers().to_vec(),
            finished: FenceSnapshot::capture(&job.finished()),
            hw_fence: job.hw_fence().map(FenceSnapshot::capture),
        }
    }
}
