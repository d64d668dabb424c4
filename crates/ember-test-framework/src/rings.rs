//! # Software Collaborators
//!
//! In-memory stand-ins for ring hardware, power management, and feature
//! toggle side effects. Completions are driven explicitly by the test, so
//! every interleaving (including hangs) is reproducible.

use alloc::collections::VecDeque;

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use hashbrown::HashMap;
use spin::Mutex;

use ember_core::{
    CmdBuffer, Error, Fence, FenceError, PowerGate, ResetTarget, Result, RingHardware, RingId,
    SeqNo, ToggleHardware,
};

// =============================================================================
// SOFT RINGS
// =============================================================================

#[derive(Default)]
struct RingState {
    wptr: u32,
    rptr: u32,
    next_seq: u64,
    inflight: VecDeque<Fence>,
    soft_recoverable: bool,
}

/// Software ring hardware
///
/// Each submission advances the write pointer and parks a hardware fence
/// in flight; the test retires work through [`SoftRings::complete_next`]
/// or injects faults through [`SoftRings::fault_next`]. A ring whose
/// completions are simply never driven models a hang: the write pointer
/// sits ahead of the read pointer exactly as stuck hardware would.
pub struct SoftRings {
    rings: Mutex<HashMap<u32, RingState>>,
}

impl SoftRings {
    /// Create the model with no rings yet (rings appear on first use)
    pub fn new() -> Self {
        Self {
            rings: Mutex::new(HashMap::new()),
        }
    }

    /// Retire the oldest in-flight submission successfully
    pub fn complete_next(&self, ring: RingId) -> bool {
        self.retire(ring, None)
    }

    /// Retire every in-flight submission on `ring` successfully
    pub fn complete_all(&self, ring: RingId) -> usize {
        let mut n = 0;
        while self.retire(ring, None) {
            n += 1;
        }
        n
    }

    /// Retire the oldest in-flight submission with an execution fault
    pub fn fault_next(&self, ring: RingId) -> bool {
        self.retire(ring, Some(FenceError::ExecutionFault))
    }

    /// Allow or deny ring-local soft recovery for `ring`
    pub fn set_soft_recoverable(&self, ring: RingId, allowed: bool) {
        self.rings
            .lock()
            .entry(ring.raw())
            .or_default()
            .soft_recoverable = allowed;
    }

    /// Submissions not yet retired on `ring`
    pub fn pending(&self, ring: RingId) -> usize {
        self.rings
            .lock()
            .get(&ring.raw())
            .map_or(0, |s| s.inflight.len())
    }

    fn retire(&self, ring: RingId, error: Option<FenceError>) -> bool {
        let mut rings = self.rings.lock();
        let Some(state) = rings.get_mut(&ring.raw()) else {
            return false;
        };
        let Some(fence) = state.inflight.pop_front() else {
            return false;
        };
        state.rptr = state.rptr.wrapping_add(1);
        fence.signal(error);
        true
    }
}

impl RingHardware for SoftRings {
    fn submit(&self, ring: RingId, buffers: &[CmdBuffer]) -> Result<Fence> {
        if buffers.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let mut rings = self.rings.lock();
        let state = rings.entry(ring.raw()).or_default();
        state.wptr = state.wptr.wrapping_add(1);
        state.next_seq += 1;
        let fence = Fence::new(ring, SeqNo::new(state.next_seq));
        state.inflight.push_back(fence.clone());
        Ok(fence)
    }

    fn read_pointer(&self, ring: RingId) -> u32 {
        self.rings.lock().get(&ring.raw()).map_or(0, |s| s.rptr)
    }

    fn write_pointer(&self, ring: RingId) -> u32 {
        self.rings.lock().get(&ring.raw()).map_or(0, |s| s.wptr)
    }

    fn soft_recover(&self, ring: RingId) -> Result<()> {
        let mut rings = self.rings.lock();
        let Some(state) = rings.get_mut(&ring.raw()) else {
            return Err(Error::RecoveryFailed);
        };
        if !state.soft_recoverable {
            return Err(Error::RecoveryFailed);
        }
        // Kill the stalled stream's oldest work; the guilty job's fence
        // carries the fault while the rest of the ring drains normally
        match state.inflight.pop_front() {
            Some(fence) => {
                state.rptr = state.rptr.wrapping_add(1);
                fence.signal(Some(FenceError::ExecutionFault));
                Ok(())
            }
            None => Err(Error::RecoveryFailed),
        }
    }

    fn reset(&self, target: ResetTarget) -> Result<()> {
        let mut rings = self.rings.lock();
        match target {
            ResetTarget::Ring(ring) => {
                if let Some(state) = rings.get_mut(&ring.raw()) {
                    state.rptr = state.wptr;
                    state.inflight.clear();
                }
            }
            ResetTarget::Device => {
                for state in rings.values_mut() {
                    state.rptr = state.wptr;
                    state.inflight.clear();
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// SOFT POWER
// =============================================================================

/// Counting power gate with injectable wake failures
#[derive(Default)]
pub struct SoftPower {
    active: AtomicI32,
    acquires: AtomicU32,
    fail_next: AtomicU32,
}

impl SoftPower {
    /// Create an idle gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` acquisitions fail with `PowerNotReady`
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Current active references
    pub fn active(&self) -> i32 {
        self.active.load(Ordering::SeqCst)
    }

    /// Total successful acquisitions
    pub fn acquires(&self) -> u32 {
        self.acquires.load(Ordering::SeqCst)
    }
}

impl PowerGate for SoftPower {
    fn acquire_active(&self) -> Result<()> {
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::PowerNotReady);
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_active(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// SOFT TOGGLE
// =============================================================================

/// Counting toggle side effect
#[derive(Default)]
pub struct SoftToggle {
    enables: AtomicU32,
    disables: AtomicU32,
}

impl SoftToggle {
    /// Create a disabled toggle
    pub fn new() -> Self {
        Self::default()
    }

    /// Times the hardware feature was enabled
    pub fn enables(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    /// Times the hardware feature was disabled
    pub fn disables(&self) -> u32 {
        self.disables.load(Ordering::SeqCst)
    }
}

impl ToggleHardware for SoftToggle {
    fn enable(&self) {
        self.enables.fetch_add(1, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.disables.fetch_add(1, Ordering::SeqCst);
    }
}
