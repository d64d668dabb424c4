//! # EMBER Core
//!
//! Foundational types, fences, and scheduler interfaces for the EMBER
//! GPU command-submission scheduler.
//!
//! This crate holds everything the scheduling layer and the hardware
//! collaborators agree on: strongly-typed identifiers, the unified error
//! taxonomy, the lock-free completion fence, the synchronization set a
//! job drains before it may run, and the traits at the seams to the
//! external Scheduler Runtime, Ring Hardware, and Power Management.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ember-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Fence     │  │  SyncSet    │  │     Traits          │  │
//! │  │ (lock-free  │  │ (dependency │  │  (SchedBackend,     │  │
//! │  │  outcome)   │  │   drain)    │  │   RingHardware)     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **First Writer Wins**: fence outcomes are published by a single
//!    compare-and-swap, so a sticky error can never be overwritten
//! 2. **No Blocking**: waiting is expressed as fences handed back to the
//!    runtime, never as a parked thread
//! 3. **No Unsafe Leakage**: this crate contains no `unsafe` code

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod fence;
pub mod syncset;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use error::{Error, FenceError, Result};
pub use fence::{Fence, FenceOutcome};
pub use syncset::SyncSet;
pub use traits::*;
pub use types::*;
