//! # EMBER Test Framework
//!
//! A software model of the scheduler's external collaborators, used by
//! integration tests:
//!
//! - [`SoftRings`]: an in-memory [`RingHardware`] with manually driven
//!   completions, injectable faults, and per-ring soft-recovery control
//! - [`SoftPower`]: a counting [`PowerGate`] with injectable wake failures
//! - [`SoftToggle`]: a counting [`ToggleHardware`]
//! - [`TestRuntime`]: a miniature single-threaded Scheduler Runtime that
//!   drives the backend callbacks exactly per contract: dependency until
//!   `None`, run, propagate the hardware fence's outcome to the completion
//!   fence, then `free` exactly once

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod rings;
pub mod runtime;

pub use rings::{SoftPower, SoftRings, SoftToggle};
pub use runtime::{EntryStatus, TestRuntime};
