//! # Synchronization Set
//!
//! The unordered collection of fences a job must observe signaled before
//! it may run.
//!
//! The set is populated at job-build time and may grow during dependency
//! resolution (a context-slot wait is discovered as an ordinary fence).
//! The dependency-check callback drains it via [`SyncSet::next_pending`],
//! handing one unsignaled fence at a time back to the Scheduler Runtime;
//! once the set is drained the job is ready to run and the members are no
//! longer needed.

use alloc::vec::Vec;

use crate::error::FenceError;
use crate::fence::Fence;

/// Collection of fences gating a job's execution
#[derive(Debug, Default)]
pub struct SyncSet {
    fences: Vec<Fence>,
    /// First sticky error observed among drained members
    failed: Option<FenceError>,
}

impl SyncSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            fences: Vec::new(),
            failed: None,
        }
    }

    /// Add a fence to wait on
    ///
    /// No-op if the fence has already signaled cleanly; a dependency that
    /// is already complete is never waited on. A signaled fence carrying an
    /// error is still recorded so the error propagates to the job.
    pub fn add(&mut self, fence: Fence) {
        if fence.is_signaled() {
            self.note_error(&fence);
            return;
        }
        self.fences.push(fence);
    }

    /// Return one unsignaled fence, or `None` if all members have signaled
    ///
    /// Signaled members are dropped as they are encountered; their sticky
    /// errors (if any) are retained for [`SyncSet::failed_dependency`].
    pub fn next_pending(&mut self) -> Option<Fence> {
        loop {
            match self.fences.last() {
                None => return None,
                Some(last) if !last.is_signaled() => return Some(last.clone()),
                Some(_) => {
                    if let Some(done) = self.fences.pop() {
                        self.note_error(&done);
                    }
                }
            }
        }
    }

    /// First sticky error seen among signaled dependencies
    ///
    /// A job whose dependency failed must not run; its outcome becomes the
    /// same error instead.
    pub fn failed_dependency(&self) -> Option<FenceError> {
        self.failed
    }

    /// Drop all held references
    pub fn clear(&mut self) {
        self.fences.clear();
    }

    /// Number of fences still held
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether no fences are held
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    fn note_error(&mut self, fence: &Fence) {
        if self.failed.is_none() {
            self.failed = fence.error();
        }
    }
}
