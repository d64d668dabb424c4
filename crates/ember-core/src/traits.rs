//! # EMBER Core Traits
//!
//! The seams between the scheduler and its external collaborators.
//!
//! These traits enable:
//! - Hardware abstraction (real rings or a software model in tests)
//! - A capability-set backend interface instead of raw callback tables
//! - Clear separation between scheduling logic and register programming
//!
//! ## Trait Hierarchy
//!
//! ```text
//! Scheduler Runtime ──▶ SchedBackend (dependency / run / timed_out / free)
//!                             │
//!                             ├──▶ RingHardware (submit, pointers, reset)
//!                             ├──▶ PowerGate    (active reference)
//!                             └──▶ ToggleHardware (enable / disable)
//! ```

use crate::error::Result;
use crate::fence::Fence;
use crate::types::{CmdBuffer, ResetTarget, RingId};

// =============================================================================
// SCHEDULER BACKEND TRAIT
// =============================================================================

/// Scheduler status reported after timeout recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedStatus {
    /// Device recovered (or never stalled) and can execute jobs again
    Nominal,
    /// Device is no longer available; outstanding fences were mass-signaled
    NoDevice,
}

/// The four callbacks a job type implements for the external Scheduler
/// Runtime.
///
/// The Runtime repeatedly calls [`SchedBackend::dependency`] until it
/// returns `None`, then calls [`SchedBackend::run`] and watches the
/// returned fence. If the fence does not signal within the configured
/// timeout it calls [`SchedBackend::timed_out`]. On every exit path the
/// Runtime guarantees [`SchedBackend::free`] is called exactly once per
/// job that was ever pushed.
pub trait SchedBackend {
    /// Next fence this job must wait on, or `None` when ready to run
    ///
    /// Never blocks: an unsignaled fence is handed back to the Runtime,
    /// which re-queues the job and re-invokes later.
    fn dependency(&mut self) -> Option<Fence>;

    /// Execute the job, returning the fence that tracks hardware completion
    ///
    /// Preconditions: the synchronization set is drained and a context
    /// slot is bound. Skip paths (pre-empted, device reset, exiting
    /// context) return an already-signaled fence without touching
    /// hardware. `Err` is reserved for retryable conditions (power not
    /// ready); the source of truth for "did this job succeed" is always
    /// the fence's error cell, never this return value.
    fn run(&mut self) -> Result<Fence>;

    /// Called when the job's fence has not signaled within the timeout
    fn timed_out(&mut self) -> SchedStatus;

    /// Release every resource the job owns
    ///
    /// Must be safe to call from the cleanup path of every other state
    /// (run failed, timed out, cancelled).
    fn free(&mut self);
}

// =============================================================================
// RING HARDWARE TRAIT
// =============================================================================

/// Register-level ring programming, consumed by the backend
///
/// Implementations submit command buffers to hardware rings and expose
/// the progress indicators the recovery controller reads.
pub trait RingHardware: Send + Sync {
    /// Submit command buffers to a ring, returning the hardware fence
    ///
    /// The fence signals when the hardware has retired the commands.
    fn submit(&self, ring: RingId, buffers: &[CmdBuffer]) -> Result<Fence>;

    /// Read pointer of the ring (last position the hardware consumed)
    fn read_pointer(&self, ring: RingId) -> u32;

    /// Write pointer of the ring (last position the driver produced)
    fn write_pointer(&self, ring: RingId) -> u32;

    /// Attempt ring-local recovery of a stalled stream
    ///
    /// Cheaper than a device reset; on success the stalled stream advances
    /// and in-flight work on other rings is untouched.
    fn soft_recover(&self, ring: RingId) -> Result<()>;

    /// Reset a ring or the whole device
    fn reset(&self, target: ResetTarget) -> Result<()>;
}

// =============================================================================
// POWER MANAGEMENT TRAIT
// =============================================================================

/// Opportunistic device power reference, consumed around `run()`
///
/// Failure to acquire is a retryable condition, never a job failure.
pub trait PowerGate: Send + Sync {
    /// Take an active reference, waking the device if idle-suspended
    fn acquire_active(&self) -> Result<()>;

    /// Drop the active reference
    fn release_active(&self);
}

// =============================================================================
// FEATURE TOGGLE TRAIT
// =============================================================================

/// Hardware side effect behind a feature toggle counter
///
/// Invoked exactly once on the 0→1 transition and once on 1→0.
pub trait ToggleHardware: Send + Sync {
    /// Enable the hardware feature
    fn enable(&self);

    /// Disable the hardware feature
    fn disable(&self);
}

// =============================================================================
// STATIC ASSERTIONS
// =============================================================================

// Ensure key types are Send + Sync
static_assertions::assert_impl_all!(crate::types::RingId: Send, Sync, Copy);
static_assertions::assert_impl_all!(crate::types::SlotId: Send, Sync, Copy);
static_assertions::assert_impl_all!(crate::types::ContextId: Send, Sync, Copy);
static_assertions::assert_impl_all!(crate::types::CmdBuffer: Send, Sync, Copy);
static_assertions::assert_impl_all!(crate::fence::Fence: Send, Sync);
