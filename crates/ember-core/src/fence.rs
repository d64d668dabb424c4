//! # Completion Fence
//!
//! Single-writer, multi-reader completion token with a sticky error slot.
//!
//! A fence is created when hardware work is issued (or when a skip path
//! needs an already-signaled token) and is shared by every holder: the
//! owning job, synchronization-set entries, and external waiters. The
//! whole outcome lives in one atomic word, so signaling is a single
//! compare-and-swap and "first writer wins" holds structurally.
//!
//! Fences never block. Waiting is expressed by the synchronization set,
//! which hands unsignaled fences back to the Scheduler Runtime.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::FenceError;
use crate::types::{RingId, SeqNo};

// =============================================================================
// OUTCOME ENCODING
// =============================================================================

/// Observed state of a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceOutcome {
    /// Not yet signaled
    Pending,
    /// Signaled; `Ok(())` on success, sticky error otherwise
    Signaled(core::result::Result<(), FenceError>),
}

// Word layout: 0 = pending, 1 = signaled ok, 1 + code = signaled with error.
const STATE_PENDING: u32 = 0;
const STATE_OK: u32 = 1;

const fn encode(error: Option<FenceError>) -> u32 {
    match error {
        None => STATE_OK,
        Some(e) => STATE_OK + e.code(),
    }
}

fn decode(word: u32) -> FenceOutcome {
    match word {
        STATE_PENDING => FenceOutcome::Pending,
        STATE_OK => FenceOutcome::Signaled(Ok(())),
        other => match FenceError::from_code(other - STATE_OK) {
            Some(e) => FenceOutcome::Signaled(Err(e)),
            // Unreachable for words this module wrote
            None => FenceOutcome::Signaled(Err(FenceError::ExecutionFault)),
        },
    }
}

// =============================================================================
// FENCE
// =============================================================================

struct FenceInner {
    /// Owning ring
    ring: RingId,
    /// Per-ring sequence number
    seq: SeqNo,
    /// Encoded outcome word
    state: AtomicU32,
}

/// Shared completion fence handle
///
/// Cloning is cheap (reference count bump); the fence lives as long as its
/// longest holder. Once signaled, the outcome never changes again.
#[derive(Clone)]
pub struct Fence {
    inner: Arc<FenceInner>,
}

impl Fence {
    /// Create an unsignaled fence for work issued on `ring`
    pub fn new(ring: RingId, seq: SeqNo) -> Self {
        Self {
            inner: Arc::new(FenceInner {
                ring,
                seq,
                state: AtomicU32::new(STATE_PENDING),
            }),
        }
    }

    /// Create an already-signaled fence
    ///
    /// Used by skip paths (pre-empted jobs, device-reset self-cancel) that
    /// must hand the runtime a completed token without touching hardware.
    pub fn signaled(ring: RingId, seq: SeqNo, error: Option<FenceError>) -> Self {
        Self {
            inner: Arc::new(FenceInner {
                ring,
                seq,
                state: AtomicU32::new(encode(error)),
            }),
        }
    }

    /// Signal the fence
    ///
    /// Idempotent: the first caller publishes the outcome; any later call
    /// is a no-op. Re-signaling with a different error is logged as a
    /// design warning but never fails.
    ///
    /// Returns `true` if this call performed the signal.
    pub fn signal(&self, error: Option<FenceError>) -> bool {
        let new = encode(error);
        match self.inner.state.compare_exchange(
            STATE_PENDING,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(existing) => {
                if existing != new {
                    log::warn!(
                        "fence {}{} re-signaled with different outcome (kept {:?}, dropped {:?})",
                        self.inner.ring,
                        self.inner.seq,
                        decode(existing),
                        decode(new),
                    );
                }
                false
            }
        }
    }

    /// Check whether the fence has signaled
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) != STATE_PENDING
    }

    /// Get the sticky error, if the fence signaled with one
    #[inline]
    pub fn error(&self) -> Option<FenceError> {
        match self.outcome() {
            FenceOutcome::Signaled(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Observe the full outcome
    ///
    /// The `Acquire` load pairs with the signaling CAS, so a thread that
    /// observes `Signaled` also observes the final error value.
    #[inline]
    pub fn outcome(&self) -> FenceOutcome {
        decode(self.inner.state.load(Ordering::Acquire))
    }

    /// Owning ring
    #[inline]
    pub fn ring(&self) -> RingId {
        self.inner.ring
    }

    /// Per-ring sequence number
    #[inline]
    pub fn seq(&self) -> SeqNo {
        self.inner.seq
    }

    /// Whether two handles refer to the same fence
    #[inline]
    pub fn same_as(&self, other: &Fence) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("ring", &self.inner.ring)
            .field("seq", &self.inner.seq)
            .field("outcome", &self.outcome())
            .finish()
    }
}
