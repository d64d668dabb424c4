//! # Recovery Controller
//!
//! Decides, on timeout, between no-op (the job actually finished), soft
//! per-ring recovery, and full device reset; on device loss, mass-signals
//! every outstanding job with a sticky error.
//!
//! A timeout is advisory until real hardware stall is confirmed by the
//! ring's progress indicators. A confirmed device fault is terminal for
//! all in-flight jobs at that moment: no partial success is reported for
//! the fences mass-signaled here.

use ember_core::{FenceError, ResetTarget, RingId};

use crate::device::DeviceState;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Recovery policy knobs
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Attempt ring-local soft recovery before declaring a device fault
    pub allow_soft_recovery: bool,
    /// On a confirmed fault, halt instead of resetting so postmortem
    /// tooling can inspect preserved hardware state (debug builds)
    pub halt_on_fault: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            allow_soft_recovery: true,
            halt_on_fault: false,
        }
    }
}

// =============================================================================
// VERDICT
// =============================================================================

/// Outcome of a timeout evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The ring was idle; fence bookkeeping raced with real completion
    FalseAlarm,
    /// The stalled stream was advanced without a device reset
    SoftRecovered,
    /// The device was reset; all outstanding fences carry `DeviceLost`
    DeviceReset,
    /// Fault confirmed but reset suppressed by policy; device is halted
    Fatal,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Timeout and device-loss policy engine
#[derive(Debug)]
pub struct RecoveryController {
    config: RecoveryConfig,
}

impl RecoveryController {
    /// Create a controller with the given policy
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    /// Active policy
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Evaluate a timeout reported against `ring`
    ///
    /// 1. Equal read/write pointers mean the ring drained and the stall
    ///    was a false alarm: no action.
    /// 2. A ring-local soft recovery is attempted if policy allows.
    /// 3. Otherwise every outstanding fence is mass-signaled `DeviceLost`
    ///    (priority order, then FIFO) and, unless `halt_on_fault`, the
    ///    device is reset and the generation counter bumped so mid-flight
    ///    jobs self-cancel instead of touching reinitialized hardware.
    pub fn evaluate_timeout(&self, device: &DeviceState, ring: RingId) -> Verdict {
        let hw = device.hw();

        let rptr = hw.read_pointer(ring);
        let wptr = hw.write_pointer(ring);
        if rptr == wptr {
            log::debug!("{} timeout was a false alarm (rptr == wptr == {})", ring, rptr);
            return Verdict::FalseAlarm;
        }

        if self.config.allow_soft_recovery {
            match hw.soft_recover(ring) {
                Ok(()) => {
                    log::warn!("{} stalled at rptr={} wptr={}, soft recovery succeeded", ring, rptr, wptr);
                    return Verdict::SoftRecovered;
                }
                Err(e) => {
                    log::warn!("{} soft recovery failed: {}", ring, e);
                }
            }
        }

        let signaled = device.mass_signal(FenceError::DeviceLost);
        if self.config.halt_on_fault {
            log::error!(
                "{} fault confirmed; {} fences signaled, reset suppressed for postmortem",
                ring,
                signaled
            );
            return Verdict::Fatal;
        }

        log::error!("{} fault confirmed; resetting device, {} fences signaled", ring, signaled);
        if let Err(e) = device.hw().reset(ResetTarget::Device) {
            log::error!("device reset failed: {}", e);
        }
        device.bump_generation();
        Verdict::DeviceReset
    }

    /// Declare the device lost outside the timeout path (hot-unplug,
    /// fatal interrupt)
    ///
    /// Mass-signals all outstanding fences and bumps the generation so no
    /// job touches the dead hardware.
    pub fn declare_device_lost(&self, device: &DeviceState) -> usize {
        let signaled = device.mass_signal(FenceError::DeviceLost);
        device.bump_generation();
        log::error!("device lost; {} outstanding fences signaled", signaled);
        signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::slots::SlotConfig;
    use crate::toggle::ToggleSet;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use ember_core::{
        CmdBuffer, Error, Fence, JobPriority, PowerGate, Result, RingHardware, SeqNo,
    };

    #[derive(Default)]
    struct StubHw {
        rptr: AtomicU32,
        wptr: AtomicU32,
        soft_ok: AtomicBool,
        resets: AtomicU32,
    }

    impl RingHardware for StubHw {
        fn submit(&self, ring: RingId, _buffers: &[CmdBuffer]) -> Result<Fence> {
            Ok(Fence::new(ring, SeqNo::new(1)))
        }
        fn read_pointer(&self, _ring: RingId) -> u32 {
            self.rptr.load(Ordering::SeqCst)
        }
        fn write_pointer(&self, _ring: RingId) -> u32 {
            self.wptr.load(Ordering::SeqCst)
        }
        fn soft_recover(&self, _ring: RingId) -> Result<()> {
            if self.soft_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Error::RecoveryFailed)
            }
        }
        fn reset(&self, _target: ResetTarget) -> Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NullPower;
    impl PowerGate for NullPower {
        fn acquire_active(&self) -> Result<()> {
            Ok(())
        }
        fn release_active(&self) {}
    }

    fn device_with(hw: Arc<StubHw>, config: RecoveryConfig) -> Arc<DeviceState> {
        DeviceState::new(
            hw,
            Arc::new(NullPower),
            &SlotConfig::default(),
            config,
            ToggleSet::new(),
        )
    }

    #[test]
    fn test_false_alarm_when_ring_drained() {
        let hw = Arc::new(StubHw::default());
        let dev = device_with(hw, RecoveryConfig::default());
        let verdict = dev.recovery().evaluate_timeout(&dev, RingId::new(0));
        assert_eq!(verdict, Verdict::FalseAlarm);
    }

    #[test]
    fn test_soft_recovery_preferred_over_reset() {
        let hw = Arc::new(StubHw::default());
        hw.wptr.store(4, Ordering::SeqCst);
        hw.soft_ok.store(true, Ordering::SeqCst);
        let dev = device_with(hw.clone(), RecoveryConfig::default());

        let verdict = dev.recovery().evaluate_timeout(&dev, RingId::new(0));
        assert_eq!(verdict, Verdict::SoftRecovered);
        assert_eq!(hw.resets.load(Ordering::SeqCst), 0);
        assert_eq!(dev.generation(), 0);
    }

    #[test]
    fn test_device_reset_mass_signals_and_bumps_generation() {
        let hw = Arc::new(StubHw::default());
        hw.wptr.store(4, Ordering::SeqCst);
        let dev = device_with(hw.clone(), RecoveryConfig::default());

        let fence = Fence::new(RingId::new(0), SeqNo::new(9));
        dev.register_job(JobPriority::Normal, fence.clone());

        let verdict = dev.recovery().evaluate_timeout(&dev, RingId::new(0));
        assert_eq!(verdict, Verdict::DeviceReset);
        assert_eq!(fence.error(), Some(FenceError::DeviceLost));
        assert_eq!(hw.resets.load(Ordering::SeqCst), 1);
        assert_eq!(dev.generation(), 1);
    }

    #[test]
    fn test_halt_on_fault_suppresses_reset() {
        let hw = Arc::new(StubHw::default());
        hw.wptr.store(4, Ordering::SeqCst);
        let config = RecoveryConfig {
            allow_soft_recovery: false,
            halt_on_fault: true,
        };
        let dev = device_with(hw.clone(), config);

        let fence = Fence::new(RingId::new(0), SeqNo::new(9));
        dev.register_job(JobPriority::Normal, fence.clone());

        let verdict = dev.recovery().evaluate_timeout(&dev, RingId::new(0));
        assert_eq!(verdict, Verdict::Fatal);
        // Waiters still unblock, but hardware state is preserved
        assert_eq!(fence.error(), Some(FenceError::DeviceLost));
        assert_eq!(hw.resets.load(Ordering::SeqCst), 0);
        assert_eq!(dev.generation(), 0);
    }

    #[test]
    fn test_declare_device_lost() {
        let hw = Arc::new(StubHw::default());
        let dev = device_with(hw, RecoveryConfig::default());
        let fence = Fence::new(RingId::new(1), SeqNo::new(2));
        dev.register_job(JobPriority::High, fence.clone());

        assert_eq!(dev.recovery().declare_device_lost(&dev), 1);
        assert_eq!(fence.error(), Some(FenceError::DeviceLost));
        assert_eq!(dev.generation(), 1);
    }
}
