//! # Device State
//!
//! Per-device scheduler state: the generation counter that invalidates
//! mid-flight jobs after a reset, the context-slot allocator, the feature
//! toggle set, the outstanding-job registry used by recovery, and the
//! deferred command-buffer free list.
//!
//! Everything lives in one explicit state struct owned by the scheduler
//! instance and passed by handle to every operation. No process-wide
//! statics: multiple independent devices coexist and tear down cleanly.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use ember_core::{
    CmdBuffer, Fence, FenceError, JobPriority, PowerGate, RingHardware,
};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::recovery::{RecoveryConfig, RecoveryController};
use crate::slots::{SlotAllocator, SlotConfig};
use crate::toggle::ToggleSet;

// =============================================================================
// JOB REGISTRY
// =============================================================================

/// Registry entry for one outstanding job
#[derive(Debug, Clone)]
struct TrackedJob {
    priority: JobPriority,
    ticket: u64,
    fence: Fence,
}

// =============================================================================
// DEFERRED FREE
// =============================================================================

/// Command buffers waiting for their fence before release
///
/// In-flight hardware reads stay valid: buffers are only dropped once the
/// job's completion fence has signaled.
#[derive(Debug)]
struct DeferredFree {
    fence: Fence,
    buffers: Vec<CmdBuffer>,
}

// =============================================================================
// DEVICE STATE
// =============================================================================

/// Per-device scheduler state
pub struct DeviceState {
    /// Ring programming collaborator
    hw: Arc<dyn RingHardware>,
    /// Power management collaborator
    power: Arc<dyn PowerGate>,
    /// Addressing-slot (VMID) allocator
    slots: SlotAllocator,
    /// Feature toggle counters
    toggles: ToggleSet,
    /// Timeout and device-loss policy
    recovery: RecoveryController,
    /// Bumped on every device reset; jobs snapshot it at build time and
    /// self-cancel when it has advanced by run time
    generation: AtomicU64,
    /// Monotonic submit ticket source (FIFO order within a priority)
    next_ticket: AtomicU64,
    /// Every job built and not yet retired, for mass-signal on fault
    registry: Mutex<Vec<TrackedJob>>,
    /// Buffers owned by freed jobs whose fences have not signaled yet
    deferred: Mutex<Vec<DeferredFree>>,
}

impl DeviceState {
    /// Create the state for one device instance
    pub fn new(
        hw: Arc<dyn RingHardware>,
        power: Arc<dyn PowerGate>,
        slot_config: &SlotConfig,
        recovery_config: RecoveryConfig,
        toggles: ToggleSet,
    ) -> Arc<Self> {
        Arc::new(Self {
            hw,
            power,
            slots: SlotAllocator::new(slot_config),
            toggles,
            recovery: RecoveryController::new(recovery_config),
            generation: AtomicU64::new(0),
            next_ticket: AtomicU64::new(1),
            registry: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
        })
    }

    /// Ring hardware collaborator
    #[inline]
    pub fn hw(&self) -> &dyn RingHardware {
        &*self.hw
    }

    /// Power management collaborator
    #[inline]
    pub fn power(&self) -> &dyn PowerGate {
        &*self.power
    }

    /// Slot allocator
    #[inline]
    pub fn slots(&self) -> &SlotAllocator {
        &self.slots
    }

    /// Feature toggles
    #[inline]
    pub fn toggles(&self) -> &ToggleSet {
        &self.toggles
    }

    /// Recovery controller
    #[inline]
    pub fn recovery(&self) -> &RecoveryController {
        &self.recovery
    }

    // =========================================================================
    // Generation counter
    // =========================================================================

    /// Current device generation
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advance the generation, invalidating every job built before now
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    // =========================================================================
    // Job registry
    // =========================================================================

    /// Track a job for mass-signal; returns its submit ticket
    pub(crate) fn register_job(&self, priority: JobPriority, fence: Fence) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        let mut registry = self.registry.lock();
        // Retire entries whose jobs already completed while we hold the lock
        registry.retain(|t| !t.fence.is_signaled());
        registry.push(TrackedJob {
            priority,
            ticket,
            fence,
        });
        ticket
    }

    /// Number of tracked jobs whose fences have not signaled
    pub fn outstanding(&self) -> usize {
        self.registry
            .lock()
            .iter()
            .filter(|t| !t.fence.is_signaled())
            .count()
    }

    /// Signal every outstanding fence with `error`
    ///
    /// Ordered by priority (highest first), then FIFO by submit ticket, so
    /// no higher-priority job is starved behind recovery bookkeeping.
    /// Jobs that already completed keep their original outcome (signal is
    /// first-writer-wins).
    pub(crate) fn mass_signal(&self, error: FenceError) -> usize {
        let mut registry = self.registry.lock();
        registry.sort_unstable_by(|a, b| {
            b.priority.cmp(&a.priority).then(a.ticket.cmp(&b.ticket))
        });
        let mut signaled = 0;
        for tracked in registry.iter() {
            if tracked.fence.signal(Some(error)) {
                signaled += 1;
            }
        }
        registry.clear();
        signaled
    }

    // =========================================================================
    // Deferred free
    // =========================================================================

    /// Queue command buffers for release once `fence` signals
    pub(crate) fn defer_free(&self, fence: Fence, buffers: Vec<CmdBuffer>) {
        if buffers.is_empty() {
            return;
        }
        self.deferred.lock().push(DeferredFree { fence, buffers });
    }

    /// Drop deferred buffers whose fences have signaled
    ///
    /// Returns the number of buffers released. Called opportunistically by
    /// the runtime after completions.
    pub fn reap_deferred(&self) -> usize {
        let mut deferred = self.deferred.lock();
        let mut released = 0;
        deferred.retain(|d| {
            if d.fence.is_signaled() {
                released += d.buffers.len();
                false
            } else {
                true
            }
        });
        released
    }

    /// Buffers still awaiting their fence
    pub fn deferred_len(&self) -> usize {
        self.deferred.lock().iter().map(|d| d.buffers.len()).sum()
    }
}

impl core::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceState")
            .field("generation", &self.generation())
            .field("outstanding", &self.outstanding())
            .field("deferred", &self.deferred_len())
            .finish()
    }
}
