//! # Process Context
//!
//! Per-process submission context. Jobs of one context share a single
//! hardware addressing slot (VMID) and are cancelled together when the
//! process exits.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use ember_core::ContextId;

/// A process context known to the scheduler
///
/// Shared by every job the process submits (`Arc<GpuContext>`). The
/// exiting flag is checked by `run()`: jobs of an exiting context are
/// skipped with a sticky cancellation instead of touching hardware.
#[derive(Debug)]
pub struct GpuContext {
    /// Context identifier
    id: ContextId,
    /// Set when the owning process begins teardown
    exiting: AtomicBool,
    /// Jobs built but not yet freed
    outstanding: AtomicU32,
}

impl GpuContext {
    /// Create a new context
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            exiting: AtomicBool::new(false),
            outstanding: AtomicU32::new(0),
        }
    }

    /// Context identifier
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Mark the context as exiting
    ///
    /// Jobs that have not yet run will self-cancel; jobs already on
    /// hardware complete normally.
    pub fn mark_exiting(&self) {
        self.exiting.store(true, Ordering::Release);
    }

    /// Whether the owning process is tearing down
    #[inline]
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    /// Record a job entering the scheduler
    pub(crate) fn job_started(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a job freed; returns the remaining outstanding count
    pub(crate) fn job_finished(&self) -> u32 {
        // Saturating: a double decrement would indicate a free() bug, and
        // free() itself guards against that
        let prev = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        prev.saturating_sub(1)
    }

    /// Jobs built but not yet freed
    #[inline]
    pub fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::Acquire)
    }
}
