//! End-to-end scheduler scenarios on the software ring model.

use std::sync::Arc;

use ember_core::{
    CmdBuffer, ContextId, FenceError, GpuAddr, JobPriority, RingId, SchedStatus, WorkloadFlags,
};
use ember_sched::{
    DeviceState, GpuContext, Job, JobDesc, JobPhase, JobSnapshot, RecoveryConfig, SlotConfig,
    ToggleSet,
};
use ember_test_framework::{EntryStatus, SoftPower, SoftRings, SoftToggle, TestRuntime};

struct Bench {
    rings: Arc<SoftRings>,
    power: Arc<SoftPower>,
    toggle: Arc<SoftToggle>,
    device: Arc<DeviceState>,
}

fn bench_with(slots: u32, recovery: RecoveryConfig) -> Bench {
    let rings = Arc::new(SoftRings::new());
    let power = Arc::new(SoftPower::new());
    let toggle = Arc::new(SoftToggle::new());
    let mut toggles = ToggleSet::new();
    toggles.register(WorkloadFlags::PERF_COUNTERS, toggle.clone());
    let device = DeviceState::new(
        rings.clone(),
        power.clone(),
        &SlotConfig { num_slots: slots },
        recovery,
        toggles,
    );
    Bench {
        rings,
        power,
        toggle,
        device,
    }
}

fn bench() -> Bench {
    bench_with(4, RecoveryConfig::default())
}

fn desc(ring: u32) -> JobDesc {
    JobDesc {
        ring: RingId::new(ring),
        priority: JobPriority::Normal,
        flags: WorkloadFlags::empty(),
        buffers: vec![CmdBuffer::new(GpuAddr::new(0x4000), 256)],
    }
}

fn job(b: &Bench, ctx: &Arc<GpuContext>, d: JobDesc) -> Job {
    Job::new(b.device.clone(), ctx.clone(), d).unwrap()
}

#[test]
fn scenario_single_job_on_idle_ring() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let id = rt.push(job(&b, &ctx, desc(0)));
    rt.settle(&b.device);
    assert_eq!(rt.status(id), EntryStatus::Running);
    assert_eq!(b.rings.pending(RingId::new(0)), 1);

    b.rings.complete_next(RingId::new(0));
    assert!(rt.settle(&b.device));
    assert_eq!(rt.status(id), EntryStatus::Freed);
    assert!(rt.finished(id).is_signaled());
    assert_eq!(rt.finished(id).error(), None);
    assert_eq!(b.device.outstanding(), 0);
    assert_eq!(b.power.active(), 0);
}

#[test]
fn scenario_job_chain_waits_on_dependency() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let a = rt.push(job(&b, &ctx, desc(0)));
    let mut second = job(&b, &ctx, desc(1));
    second.add_dependency(rt.finished(a));
    let bidx = rt.push(second);

    rt.settle(&b.device);
    // A is on hardware; B is parked on A's completion fence
    assert_eq!(rt.status(a), EntryStatus::Running);
    assert_eq!(rt.status(bidx), EntryStatus::Waiting);
    assert_eq!(b.rings.pending(RingId::new(1)), 0);

    b.rings.complete_next(RingId::new(0));
    rt.settle(&b.device);
    assert_eq!(rt.status(a), EntryStatus::Freed);
    assert_eq!(rt.status(bidx), EntryStatus::Running);

    b.rings.complete_next(RingId::new(1));
    assert!(rt.settle(&b.device));
    assert_eq!(rt.finished(bidx).error(), None);
}

#[test]
fn scenario_two_contexts_share_one_slot() {
    let b = bench_with(1, RecoveryConfig::default());
    let ctx1 = Arc::new(GpuContext::new(ContextId::new(1)));
    let ctx2 = Arc::new(GpuContext::new(ContextId::new(2)));
    let mut rt = TestRuntime::new();

    let a = rt.push(job(&b, &ctx1, desc(0)));
    let c = rt.push(job(&b, &ctx2, desc(1)));

    rt.settle(&b.device);
    // ctx1 holds the only slot; ctx2 waits on its busy fence
    assert_eq!(rt.status(a), EntryStatus::Running);
    assert_eq!(rt.status(c), EntryStatus::Waiting);

    b.rings.complete_next(RingId::new(0));
    rt.settle(&b.device);
    // One eviction cycle later ctx2 owns the slot and runs
    assert_eq!(rt.status(c), EntryStatus::Running);

    b.rings.complete_next(RingId::new(1));
    assert!(rt.settle(&b.device));
    assert_eq!(rt.finished(c).error(), None);
}

#[test]
fn scenario_same_context_back_to_back_on_one_slot() {
    // N jobs, 1 slot, 1 context: must never deadlock against itself
    let b = bench_with(1, RecoveryConfig::default());
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let ids: Vec<usize> = (0..8).map(|_| rt.push(job(&b, &ctx, desc(0)))).collect();

    for _ in 0..8 {
        rt.settle(&b.device);
        assert!(b.rings.complete_next(RingId::new(0)));
    }
    assert!(rt.settle(&b.device));
    for id in ids {
        assert_eq!(rt.finished(id).error(), None);
    }
}

#[test]
fn scenario_hang_soft_recovery() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();
    b.rings.set_soft_recoverable(RingId::new(0), true);

    let id = rt.push(job(&b, &ctx, desc(0)));
    rt.settle(&b.device);
    assert_eq!(rt.status(id), EntryStatus::Running);

    // The ring never completes; the watchdog fires
    assert_eq!(rt.timed_out(id), SchedStatus::Nominal);
    rt.settle(&b.device);

    // The guilty job carries the fault; the device survived
    assert_eq!(rt.status(id), EntryStatus::Freed);
    assert_eq!(rt.finished(id).error(), Some(FenceError::ExecutionFault));
    assert_eq!(b.device.generation(), 0);
}

#[test]
fn scenario_hang_escalates_to_device_reset() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let stuck = rt.push(job(&b, &ctx, desc(0)));
    // A second job mid-dependency on another ring, and a third built but
    // never pushed: recovery must cover every tracked job
    let mut waiting = job(&b, &ctx, desc(1));
    waiting.add_dependency(rt.finished(stuck));
    let waiting = rt.push(waiting);
    let unqueued = job(&b, &ctx, desc(2));
    let unqueued_fence = unqueued.finished();

    rt.settle(&b.device);
    assert_eq!(rt.status(stuck), EntryStatus::Running);

    // Soft recovery is not permitted on this ring; full reset follows
    assert_eq!(rt.timed_out(stuck), SchedStatus::NoDevice);
    assert_eq!(b.device.generation(), 1);

    rt.settle(&b.device);
    for id in [stuck, waiting] {
        assert_eq!(rt.status(id), EntryStatus::Freed);
        assert_eq!(rt.finished(id).error(), Some(FenceError::DeviceLost));
    }
    assert_eq!(unqueued_fence.error(), Some(FenceError::DeviceLost));

    // A job from before the reset self-cancels instead of touching the
    // reinitialized hardware
    let mut rt2 = TestRuntime::new();
    let late = rt2.push(unqueued);
    rt2.settle(&b.device);
    assert_eq!(rt2.status(late), EntryStatus::Freed);
    assert_eq!(b.rings.pending(RingId::new(2)), 0);
}

#[test]
fn scenario_halt_on_fault_preserves_hardware_state() {
    let b = bench_with(
        4,
        RecoveryConfig {
            allow_soft_recovery: false,
            halt_on_fault: true,
        },
    );
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let id = rt.push(job(&b, &ctx, desc(0)));
    rt.settle(&b.device);
    assert_eq!(rt.timed_out(id), SchedStatus::NoDevice);

    // Waiters unblock, but the ring was neither recovered nor reset
    assert_eq!(rt.finished(id).error(), Some(FenceError::DeviceLost));
    assert_eq!(b.device.generation(), 0);
    assert_eq!(b.rings.pending(RingId::new(0)), 1);
}

#[test]
fn scenario_overlapping_toggle_jobs() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let mut d0 = desc(0);
    d0.flags = WorkloadFlags::PERF_COUNTERS;
    let mut d1 = desc(1);
    d1.flags = WorkloadFlags::PERF_COUNTERS;

    let first = rt.push(job(&b, &ctx, d0));
    let second = rt.push(job(&b, &ctx, d1));
    rt.settle(&b.device);
    assert_eq!(rt.status(first), EntryStatus::Running);
    assert_eq!(rt.status(second), EntryStatus::Running);

    // Two overlapping holders: enabled exactly once
    assert_eq!(b.toggle.enables(), 1);
    assert_eq!(b.toggle.disables(), 0);

    b.rings.complete_next(RingId::new(0));
    rt.settle(&b.device);
    assert_eq!(b.toggle.disables(), 0);

    b.rings.complete_next(RingId::new(1));
    assert!(rt.settle(&b.device));
    // Disabled exactly once, after the second release
    assert_eq!(b.toggle.enables(), 1);
    assert_eq!(b.toggle.disables(), 1);
}

#[test]
fn scenario_power_retry_then_success() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();
    b.power.fail_next(2);

    let id = rt.push(job(&b, &ctx, desc(0)));
    // Two passes fail retryably; the third wakes the device
    rt.settle(&b.device);
    assert_eq!(rt.status(id), EntryStatus::Waiting);
    rt.settle(&b.device);
    rt.settle(&b.device);
    assert_eq!(rt.status(id), EntryStatus::Running);
    assert_eq!(b.power.acquires(), 1);
}

#[test]
fn scenario_debug_snapshot_tracks_lifecycle() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(7)));
    let mut rt = TestRuntime::new();

    let id = rt.push(job(&b, &ctx, desc(0)));
    rt.settle(&b.device);

    let snap = JobSnapshot::capture(rt.job(id));
    assert_eq!(snap.ring, RingId::new(0));
    assert_eq!(snap.context, ContextId::new(7));
    assert_eq!(snap.priority, JobPriority::Normal);
    assert_eq!(snap.phase, JobPhase::Running);
    assert_eq!(snap.buffers.len(), 1);
    assert!(!snap.finished.signaled);
    let hw = snap.hw_fence.expect("running job has a hardware fence");
    assert_eq!(hw.ring, RingId::new(0));
    assert!(!hw.signaled);

    b.rings.complete_next(RingId::new(0));
    assert!(rt.settle(&b.device));

    let snap = JobSnapshot::capture(rt.job(id));
    assert_eq!(snap.phase, JobPhase::Completed);
    assert!(snap.finished.signaled);
    assert_eq!(snap.finished.error, None);
    // free() returned the buffers and dropped the hardware-fence reference
    assert!(snap.buffers.is_empty());
    assert!(snap.hw_fence.is_none());
}

#[test]
fn scenario_exiting_context_cancels_unrun_jobs() {
    let b = bench();
    let ctx = Arc::new(GpuContext::new(ContextId::new(1)));
    let mut rt = TestRuntime::new();

    let id = rt.push(job(&b, &ctx, desc(0)));
    ctx.mark_exiting();
    assert!(rt.settle(&b.device));

    assert_eq!(rt.finished(id).error(), Some(FenceError::Cancelled));
    assert_eq!(b.rings.pending(RingId::new(0)), 0);
    assert_eq!(ctx.outstanding(), 0);
}
