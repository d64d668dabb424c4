//! # EMBER Error Handling
//!
//! Error types for the command-submission scheduler.
//!
//! Error handling in EMBER follows these principles:
//! - Errors are typed and categorized
//! - No panics in production code paths
//! - Hardware-facing errors are carried on fences, never thrown
//!   synchronously out of `run()`/`free()`
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// EMBER Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// FENCE ERROR
// =============================================================================

/// Sticky error carried on a completion fence
///
/// This is the fence-carriable subset of [`Error`]. It has a stable `u32`
/// encoding so an outcome fits in one atomic word, making first-writer-wins
/// a structural property of the fence rather than a locking convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FenceError {
    /// A fence the job waited on itself carried a sticky error
    DependencyError = 1,
    /// Hardware reported a fault while or after executing the job
    ExecutionFault = 2,
    /// The device was lost; resubmission is the caller's responsibility
    DeviceLost = 3,
    /// The job was pre-empted or its context exited before it ran
    Cancelled = 4,
}

impl FenceError {
    /// Stable wire code for atomic packing
    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decode from a wire code
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::DependencyError),
            2 => Some(Self::ExecutionFault),
            3 => Some(Self::DeviceLost),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this error counts as a hardware failure for statistics
    ///
    /// Cancellation is an orderly exit, not a fault.
    pub const fn is_hardware_failure(self) -> bool {
        matches!(self, Self::ExecutionFault | Self::DeviceLost)
    }
}

impl fmt::Display for FenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyError => write!(f, "dependency carried an error"),
            Self::ExecutionFault => write!(f, "hardware execution fault"),
            Self::DeviceLost => write!(f, "device lost"),
            Self::Cancelled => write!(f, "job cancelled"),
        }
    }
}

// =============================================================================
// ERROR ENUM
// =============================================================================

/// EMBER unified error type
///
/// This enum covers all error conditions across the scheduler stack.
/// Errors are categorized by subsystem for easier debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Admission Errors
    // =========================================================================
    /// Resource exhaustion while building a job; nothing was queued
    AllocationFailure,
    /// Invalid parameter provided
    InvalidParameter,

    // =========================================================================
    // Execution Errors (fence-carried, see `FenceError`)
    // =========================================================================
    /// A waited-on fence carried a sticky error
    DependencyError,
    /// Hardware reported a fault
    ExecutionFault,
    /// Device lost; all outstanding fences were mass-signaled
    DeviceLost,
    /// Job cancelled before it ran
    Cancelled,

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Power management could not bring the device active (retryable)
    PowerNotReady,
    /// Ring-local soft recovery did not advance the stalled stream
    RecoveryFailed,
    /// Ring cannot accept another submission right now
    RingFull,

    // =========================================================================
    // Lifecycle Bugs
    // =========================================================================
    /// Feature toggle counter released below zero (lifecycle bug elsewhere)
    CounterUnderflow,
}

impl Error {
    /// Whether the caller may retry the operation unchanged
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::PowerNotReady | Self::RingFull)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Admission
            Self::AllocationFailure => write!(f, "resource allocation failed"),
            Self::InvalidParameter => write!(f, "invalid parameter"),

            // Execution
            Self::DependencyError => write!(f, "dependency carried an error"),
            Self::ExecutionFault => write!(f, "hardware execution fault"),
            Self::DeviceLost => write!(f, "device lost"),
            Self::Cancelled => write!(f, "job cancelled"),

            // Collaborators
            Self::PowerNotReady => write!(f, "device not powered (retryable)"),
            Self::RecoveryFailed => write!(f, "soft recovery failed"),
            Self::RingFull => write!(f, "ring full (retryable)"),

            // Lifecycle
            Self::CounterUnderflow => write!(f, "toggle counter underflow"),
        }
    }
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<FenceError> for Error {
    fn from(e: FenceError) -> Self {
        match e {
            FenceError::DependencyError => Error::DependencyError,
            FenceError::ExecutionFault => Error::ExecutionFault,
            FenceError::DeviceLost => Error::DeviceLost,
            FenceError::Cancelled => Error::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_error_roundtrip() {
        for e in [
            FenceError::DependencyError,
            FenceError::ExecutionFault,
            FenceError::DeviceLost,
            FenceError::Cancelled,
        ] {
            assert_eq!(FenceError::from_code(e.code()), Some(e));
        }
        assert_eq!(FenceError::from_code(0), None);
        assert_eq!(FenceError::from_code(99), None);
    }

    #[test]
    fn test_cancellation_is_not_a_hardware_failure() {
        assert!(!FenceError::Cancelled.is_hardware_failure());
        assert!(!FenceError::DependencyError.is_hardware_failure());
        assert!(FenceError::DeviceLost.is_hardware_failure());
        assert!(FenceError::ExecutionFault.is_hardware_failure());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::PowerNotReady.is_retryable());
        assert!(Error::RingFull.is_retryable());
        assert!(!Error::DeviceLost.is_retryable());
        assert!(!Error::CounterUnderflow.is_retryable());
    }
}
