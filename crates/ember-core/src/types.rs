//! # EMBER Core Types
//!
//! Fundamental type definitions used across the scheduler stack.
//!
//! These types provide:
//! - Strong typing for hardware identifiers (rings, slots, contexts)
//! - Monotonic fence sequence numbers
//! - Opaque command-buffer references

use core::fmt;

// =============================================================================
// RING ID
// =============================================================================

/// Hardware ring identifier
///
/// Each ring is an independent command queue drained by one worker of the
/// external Scheduler Runtime. Jobs on the same ring execute in FIFO order
/// once their dependencies are satisfied; across rings no order is implied.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct RingId(u32);

impl RingId {
    /// Create a new ring identifier
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingId({})", self.0)
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ring{}", self.0)
    }
}

// =============================================================================
// SEQUENCE NUMBER
// =============================================================================

/// Per-ring fence sequence number
///
/// Monotonically increasing within one ring. A larger sequence number on
/// the same ring means the work was submitted later.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SeqNo(u64);

impl SeqNo {
    /// Sequence number zero (used by pre-signaled skip fences)
    pub const ZERO: Self = Self(0);

    /// Create a new sequence number
    #[inline]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The next sequence number
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNo({})", self.0)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// SLOT ID (VMID)
// =============================================================================

/// Hardware addressing-context slot identifier (VMID)
///
/// A scarce resource from a bounded range `0..N`. At most one process
/// context owns a given slot at a time; the context keeps its slot across
/// consecutive jobs until evicted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SlotId(u32);

impl SlotId {
    /// Create a new slot identifier
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the slot index for table lookups
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vmid{}", self.0)
    }
}

// =============================================================================
// CONTEXT ID
// =============================================================================

/// Process context identifier
///
/// Identifies the submitting process context. Jobs of the same context
/// share one addressing slot; the relation between a slot and its owning
/// context is identity only, never ownership of the context itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// Create a new context identifier
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

// =============================================================================
// GPU ADDRESS
// =============================================================================

/// GPU Virtual Address
///
/// This is an address in the GPU's virtual address space.
/// It is NOT a CPU pointer and cannot be dereferenced directly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct GpuAddr(u64);

impl GpuAddr {
    /// Create a new GPU address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Create a null GPU address
    #[inline]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for GpuAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuAddr(0x{:016x})", self.0)
    }
}

impl fmt::Display for GpuAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

// =============================================================================
// COMMAND BUFFER
// =============================================================================

/// Opaque command-buffer reference
///
/// A job owns an ordered sequence of these. The wire format of the
/// commands is hardware-defined and outside the scheduler's concern;
/// the scheduler only guarantees the referenced memory stays valid until
/// the job's completion fence signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdBuffer {
    /// GPU address of the encoded commands
    pub addr: GpuAddr,
    /// Size of the encoded commands in bytes
    pub size_bytes: u32,
}

impl CmdBuffer {
    /// Create a new command-buffer reference
    #[inline]
    pub const fn new(addr: GpuAddr, size_bytes: u32) -> Self {
        Self { addr, size_bytes }
    }
}

// =============================================================================
// JOB PRIORITY
// =============================================================================

/// Job scheduling priority
///
/// Used as the per-ring queue identity by the Scheduler Runtime and as the
/// primary ordering key when recovery mass-signals outstanding jobs, so no
/// higher-priority job is starved behind recovery bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Low priority (background tasks)
    Low    = 0,
    /// Normal priority (default)
    Normal = 1,
    /// High priority (interactive)
    High   = 2,
    /// Kernel priority (highest, internal work)
    Kernel = 3,
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::Normal
    }
}

// =============================================================================
// WORKLOAD FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Per-job hardware feature requests
    ///
    /// Each set bit maps to a reference-counted feature toggle that must be
    /// active for exactly the span of jobs requesting it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WorkloadFlags: u32 {
        /// Performance counters must be live for this job
        const PERF_COUNTERS = 1 << 0;
        /// Clocks pinned to boost frequency
        const CLOCK_BOOST = 1 << 1;
        /// Shader debug instrumentation enabled
        const SHADER_DEBUG = 1 << 2;
    }
}

// =============================================================================
// RESET TARGET
// =============================================================================

/// Scope of a hardware reset request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// Reset a single ring
    Ring(RingId),
    /// Reset the whole device, invalidating all in-flight work
    Device,
}
