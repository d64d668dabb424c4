//! # Job
//!
//! The unit of submitted work: an ordered command-buffer list, a
//! synchronization set, a completion fence, and scheduling metadata.
//!
//! `Job` implements the four [`SchedBackend`] callbacks the external
//! Scheduler Runtime drives. The completion fence is created exactly once
//! at build time and is the stable identity dependents and recovery hold;
//! `run()` swaps the job's internal hardware-fence slot from empty to the
//! submitted fence exactly once. The runtime propagates the hardware
//! fence's outcome to the completion fence before calling `free()`.
//!
//! State machine:
//!
//! ```text
//! Built ──▶ (dependency loop) ──▶ Running ──▶ Completed | Faulted
//!                 │                                │
//!                 └────────────▶ Cancelled ◀───────┘
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use ember_core::{
    CmdBuffer, Error, Fence, FenceError, JobPriority, Result, RingId, SchedBackend, SchedStatus,
    SeqNo, SyncSet, WorkloadFlags,
};

use crate::context::GpuContext;
use crate::device::DeviceState;
use crate::recovery::Verdict;
use crate::slots::SlotAcquire;

// =============================================================================
// JOB PHASE
// =============================================================================

/// Coarse lifecycle phase, exposed for debug dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Built, not yet examined by the runtime
    Built,
    /// Waiting on synchronization-set fences or a context slot
    DependencyPending,
    /// Submitted to hardware
    Running,
    /// Completion fence signaled cleanly
    Completed,
    /// Completion fence carries a hardware error
    Faulted,
    /// Skipped or pre-empted before reaching hardware
    Cancelled,
}

// =============================================================================
// JOB DESCRIPTOR
// =============================================================================

/// Everything a client supplies to build a job
#[derive(Debug, Clone)]
pub struct JobDesc {
    /// Target hardware ring
    pub ring: RingId,
    /// Scheduling priority
    pub priority: JobPriority,
    /// Hardware features that must be live while this job runs
    pub flags: WorkloadFlags,
    /// Ordered command buffers
    pub buffers: Vec<CmdBuffer>,
}

// =============================================================================
// JOB
// =============================================================================

/// A client's unit of hardware work plus its dependency and completion
/// bookkeeping
pub struct Job {
    device: Arc<DeviceState>,
    context: Arc<GpuContext>,

    ring: RingId,
    priority: JobPriority,
    buffers: Vec<CmdBuffer>,
    deps: SyncSet,
    flags: WorkloadFlags,

    /// Completion fence, created once; the 1:1 stable identity
    finished: Fence,
    /// Hardware fence, swapped in by the single real submission
    hw_fence: Option<Fence>,
    /// Toggles actually taken at run time, released by `free`
    toggles_held: WorkloadFlags,
    /// Device generation at build time; a mismatch at run time means the
    /// device was reset underneath us
    generation_snapshot: u64,
    /// Submit ticket (FIFO order within a priority)
    ticket: u64,
    /// Whether the job bound its context's addressing slot
    slot_bound: bool,
    /// Active power reference held across run
    power_held: bool,
    /// Guard for the exactly-once free contract
    freed: bool,
    phase: JobPhase,
}

impl Job {
    /// Build a job; nothing is queued on failure
    pub fn new(
        device: Arc<DeviceState>,
        context: Arc<GpuContext>,
        desc: JobDesc,
    ) -> Result<Self> {
        if desc.buffers.iter().any(|b| b.addr.is_null() || b.size_bytes == 0) {
            return Err(Error::InvalidParameter);
        }

        let generation_snapshot = device.generation();
        // The completion fence is registered immediately: recovery must
        // cover unqueued-but-tracked jobs too
        let provisional = Fence::new(desc.ring, SeqNo::ZERO);
        let ticket = device.register_job(desc.priority, provisional.clone());
        context.job_started();

        Ok(Self {
            device,
            context,
            ring: desc.ring,
            priority: desc.priority,
            buffers: desc.buffers,
            deps: SyncSet::new(),
            flags: desc.flags,
            finished: provisional,
            hw_fence: None,
            toggles_held: WorkloadFlags::empty(),
            generation_snapshot,
            ticket,
            slot_bound: false,
            power_held: false,
            freed: false,
            phase: JobPhase::Built,
        })
    }

    /// Declare a fence this job must wait on
    pub fn add_dependency(&mut self, fence: Fence) {
        self.deps.add(fence);
    }

    /// The job's completion fence (shared handle)
    pub fn finished(&self) -> Fence {
        self.finished.clone()
    }

    /// Target ring
    pub fn ring(&self) -> RingId {
        self.ring
    }

    /// Scheduling priority
    pub fn priority(&self) -> JobPriority {
        self.priority
    }

    /// Submit ticket
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Owning context
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Command buffers (read-only, for debug dump)
    pub fn buffers(&self) -> &[CmdBuffer] {
        &self.buffers
    }

    /// Hardware fence, once submitted
    pub fn hw_fence(&self) -> Option<&Fence> {
        self.hw_fence.as_ref()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> JobPhase {
        match self.finished.outcome() {
            ember_core::FenceOutcome::Signaled(Ok(())) => JobPhase::Completed,
            ember_core::FenceOutcome::Signaled(Err(FenceError::Cancelled)) => JobPhase::Cancelled,
            ember_core::FenceOutcome::Signaled(Err(_)) => JobPhase::Faulted,
            ember_core::FenceOutcome::Pending => self.phase,
        }
    }

    /// Skip hardware entirely, leaving a sticky error on the completion
    /// fence, and hand the runtime an already-signaled token
    fn skip(&mut self, error: FenceError) -> Fence {
        self.finished.signal(Some(error));
        self.phase = JobPhase::Cancelled;
        // The completion fence may carry an earlier sticky error (e.g. a
        // mass-signaled DeviceLost); the returned token mirrors it
        Fence::signaled(self.ring, SeqNo::ZERO, self.finished.error())
    }
}

impl SchedBackend for Job {
    fn dependency(&mut self) -> Option<Fence> {
        // Bind the context's addressing slot first; contention surfaces
        // as one more fence in the synchronization set
        if !self.slot_bound {
            match self.device.slots().acquire(self.context.id()) {
                SlotAcquire::Ready(slot) => {
                    self.device
                        .slots()
                        .bind(self.context.id(), slot, self.finished.clone());
                    self.slot_bound = true;
                }
                SlotAcquire::WaitFor(fence) => {
                    self.phase = JobPhase::DependencyPending;
                    self.deps.add(fence.clone());
                    return Some(fence);
                }
            }
        }

        match self.deps.next_pending() {
            Some(fence) => {
                self.phase = JobPhase::DependencyPending;
                Some(fence)
            }
            None => None,
        }
    }

    fn run(&mut self) -> Result<Fence> {
        debug_assert!(self.deps.is_empty(), "run() before dependencies drained");

        // Exactly one real submission: a re-invocation after recovery
        // hands back the same hardware fence
        if let Some(fence) = &self.hw_fence {
            return Ok(fence.clone());
        }

        // Device was reset since this job was built: the commands may
        // reference reinitialized state, never touch hardware
        if self.device.generation() != self.generation_snapshot {
            log::debug!(
                "{}{} self-cancelled: device generation advanced",
                self.ring,
                SeqNo::new(self.ticket)
            );
            return Ok(self.skip(FenceError::Cancelled));
        }

        // Owning process is tearing down: not executed, non-retryable
        if self.context.is_exiting() {
            return Ok(self.skip(FenceError::Cancelled));
        }

        // Pre-empted: cancellation signaled our fence before run
        if self.finished.is_signaled() {
            self.phase = JobPhase::Cancelled;
            return Ok(Fence::signaled(self.ring, SeqNo::ZERO, self.finished.error()));
        }

        // A dependency carried a sticky error: propagate, do not run
        if let Some(err) = self.deps.failed_dependency() {
            log::debug!("{} dependency failed with {}", self.ring, err);
            return Ok(self.skip(FenceError::DependencyError));
        }

        // Members are no longer needed once we commit to running
        self.deps.clear();

        // Wake the device; failure here is retryable, not a job failure
        if !self.power_held {
            self.device.power().acquire_active()?;
            self.power_held = true;
        }

        // Feature toggles span exactly the job's hardware lifetime
        if self.toggles_held.is_empty() && !self.flags.is_empty() {
            self.toggles_held = self.device.toggles().request(self.flags)?;
        }

        match self.device.hw().submit(self.ring, &self.buffers) {
            Ok(fence) => {
                self.hw_fence = Some(fence.clone());
                self.phase = JobPhase::Running;
                Ok(fence)
            }
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                // Hardware-facing errors ride the fence, never the return
                log::warn!("{} submission failed: {}", self.ring, e);
                self.finished.signal(Some(FenceError::ExecutionFault));
                self.phase = JobPhase::Cancelled;
                Ok(Fence::signaled(self.ring, SeqNo::ZERO, self.finished.error()))
            }
        }
    }

    fn timed_out(&mut self) -> SchedStatus {
        match self
            .device
            .recovery()
            .evaluate_timeout(&self.device, self.ring)
        {
            Verdict::FalseAlarm | Verdict::SoftRecovered => SchedStatus::Nominal,
            Verdict::DeviceReset | Verdict::Fatal => SchedStatus::NoDevice,
        }
    }

    fn free(&mut self) {
        if self.freed {
            log::warn!("{}{} freed twice", self.ring, SeqNo::new(self.ticket));
            return;
        }
        self.freed = true;

        // Buffers stay alive until the completion fence signals so
        // in-flight hardware reads remain valid
        let buffers = mem::take(&mut self.buffers);
        self.device.defer_free(self.finished.clone(), buffers);

        if !self.toggles_held.is_empty() {
            if let Err(e) = self.device.toggles().release(self.toggles_held) {
                log::error!("toggle release failed during free: {}", e);
            }
            self.toggles_held = WorkloadFlags::empty();
        }

        if self.power_held {
            self.device.power().release_active();
            self.power_held = false;
        }

        self.deps.clear();
        self.hw_fence = None;

        if self.context.job_finished() == 0 {
            self.device.slots().release_idle(self.context.id());
        }
    }
}

impl core::fmt::Debug for Job {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Job")
            .field("ring", &self.ring)
            .field("ticket", &self.ticket)
            .field("priority", &self.priority)
            .field("phase", &self.phase())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}
