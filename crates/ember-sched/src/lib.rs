//! # EMBER Scheduling
//!
//! Job submission, context-slot (VMID) allocation, feature toggles, and
//! hang recovery for the EMBER GPU command-submission scheduler.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Submission Pipeline                          │
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐     │
//! │  │     Job      │    │  Dependency  │    │  Ring Hardware   │     │
//! │  │  (build +    │───▶│  Drain +     │───▶│  (submit, hw     │     │
//! │  │   fences)    │    │  VMID bind   │    │   fence)         │     │
//! │  └──────────────┘    └──────────────┘    └────────┬─────────┘     │
//! │                                                   │               │
//! │                                          ┌────────▼─────────┐     │
//! │                                          │    Recovery      │     │
//! │                                          │  (timeout path)  │     │
//! │                                          └──────────────────┘     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submission Flow
//!
//! 1. Client builds a [`job::Job`] with command buffers and dependencies
//! 2. The external Scheduler Runtime drains `dependency()` until `None`
//! 3. `run()` validates the VMID slot, checks skip conditions, submits
//! 4. The hardware fence signals; the runtime propagates the outcome to
//!    the job's completion fence and calls `free()` exactly once
//! 5. On timeout, the recovery controller decides between no-op, soft
//!    recovery, and full device reset with mass-signaled fences

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod context;
pub mod device;
pub mod job;
pub mod recovery;
pub mod slots;
pub mod snapshot;
pub mod toggle;

// Re-exports
pub use context::GpuContext;
pub use device::DeviceState;
pub use job::{Job, JobDesc, JobPhase};
pub use recovery::{RecoveryConfig, RecoveryController, Verdict};
pub use slots::{SlotAcquire, SlotAllocator, SlotConfig};
pub use snapshot::{FenceSnapshot, JobSnapshot};
pub use toggle::{ToggleCounter, ToggleSet};
