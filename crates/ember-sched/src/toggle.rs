//! # Feature Toggle Counter
//!
//! Reference-counted enable/disable of a hardware-global side effect
//! (performance counters, clock boost) that must be active for exactly
//! the span of jobs requesting it.
//!
//! One mutex per counter, not per job: the side effect is hardware-global
//! and its frequency is low, so correctness (never double-enable or
//! double-disable) matters far more than latency.

use alloc::sync::Arc;

use hashbrown::HashMap;
use spin::Mutex;

use ember_core::{Error, Result, ToggleHardware, WorkloadFlags};

// =============================================================================
// TOGGLE COUNTER
// =============================================================================

#[derive(Debug, Default)]
struct ToggleState {
    count: u32,
    /// Set after an underflow; all further requests fail
    poisoned: bool,
}

/// A single reference-counted hardware feature toggle
pub struct ToggleCounter {
    hw: Arc<dyn ToggleHardware>,
    state: Mutex<ToggleState>,
}

impl ToggleCounter {
    /// Create a counter around its hardware side effect
    pub fn new(hw: Arc<dyn ToggleHardware>) -> Self {
        Self {
            hw,
            state: Mutex::new(ToggleState::default()),
        }
    }

    /// Take a reference; the 0→1 transition enables the hardware feature
    pub fn request(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(Error::CounterUnderflow);
        }
        state.count += 1;
        if state.count == 1 {
            self.hw.enable();
        }
        Ok(())
    }

    /// Drop a reference; the 1→0 transition disables the hardware feature
    ///
    /// Releasing at zero is a lifecycle bug elsewhere: the counter poisons
    /// itself and rejects all further requests.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.count == 0 {
            state.poisoned = true;
            log::error!("toggle released below zero; halting further requests");
            return Err(Error::CounterUnderflow);
        }
        state.count -= 1;
        if state.count == 0 {
            self.hw.disable();
        }
        Ok(())
    }

    /// Current reference count
    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    /// Whether the feature is currently enabled (count > 0)
    pub fn is_enabled(&self) -> bool {
        self.count() > 0
    }

    /// Whether an underflow has halted this counter
    pub fn is_poisoned(&self) -> bool {
        self.state.lock().poisoned
    }
}

impl core::fmt::Debug for ToggleCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ToggleCounter")
            .field("count", &state.count)
            .field("poisoned", &state.poisoned)
            .finish()
    }
}

// =============================================================================
// TOGGLE SET
// =============================================================================

/// The device's toggle counters, keyed by workload flag bit
///
/// Flags with no registered counter are ignored: the hardware simply does
/// not have that feature and the job runs without it.
#[derive(Default)]
pub struct ToggleSet {
    counters: HashMap<u32, ToggleCounter>,
}

impl ToggleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    /// Register the counter backing one workload flag
    pub fn register(&mut self, flag: WorkloadFlags, hw: Arc<dyn ToggleHardware>) {
        self.counters.insert(flag.bits(), ToggleCounter::new(hw));
    }

    /// Request every registered toggle named in `flags`
    ///
    /// Returns the subset actually taken (to be released by `free`). On
    /// error the already-taken toggles are rolled back, so a failed
    /// request leaves every count unchanged.
    pub fn request(&self, flags: WorkloadFlags) -> Result<WorkloadFlags> {
        let mut taken = WorkloadFlags::empty();
        for flag in flags.iter() {
            let Some(counter) = self.counters.get(&flag.bits()) else {
                continue;
            };
            if let Err(e) = counter.request() {
                if let Err(rollback) = self.release(taken) {
                    log::error!("toggle rollback failed: {}", rollback);
                }
                return Err(e);
            }
            taken |= flag;
        }
        Ok(taken)
    }

    /// Release every toggle named in `flags`
    ///
    /// Underflow on one counter is reported but does not stop the others
    /// from being released.
    pub fn release(&self, flags: WorkloadFlags) -> Result<()> {
        let mut result = Ok(());
        for flag in flags.iter() {
            if let Some(counter) = self.counters.get(&flag.bits()) {
                if let Err(e) = counter.release() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Look up the counter for one flag
    pub fn counter(&self, flag: WorkloadFlags) -> Option<&ToggleCounter> {
        self.counters.get(&flag.bits())
    }
}
