//! # Context Slot Allocator (VMID)
//!
//! Binds process contexts to a fixed small number of hardware addressing
//! slots, minimizing slot churn.
//!
//! Cross-context contention never blocks: when every slot is busy the
//! allocator hands back the victim's busy fence, which the caller adds to
//! its job's synchronization set. Slot contention thus becomes an
//! ordinary dependency resolved by the Scheduler Runtime.

use arrayvec::ArrayVec;
use spin::Mutex;

use ember_core::{ContextId, Fence, SlotId};

/// Hard upper bound on addressing slots any hardware exposes
pub const MAX_SLOTS: usize = 32;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Slot allocator configuration
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// Number of hardware addressing slots (`0..num_slots`)
    pub num_slots: u32,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self { num_slots: 8 }
    }
}

// =============================================================================
// ACQUIRE RESULT
// =============================================================================

/// Result of a slot acquisition attempt
#[derive(Debug)]
pub enum SlotAcquire {
    /// A slot is reserved for the context and may be bound
    Ready(SlotId),
    /// Every slot is busy; wait on the victim's busy fence and retry
    WaitFor(Fence),
}

// =============================================================================
// SLOT TABLE
// =============================================================================

#[derive(Debug, Default)]
struct SlotEntry {
    /// Owning context (identity relation only)
    owner: Option<ContextId>,
    /// Completion fence of the job that last used this slot
    busy: Option<Fence>,
    /// LRU tick of the last acquisition
    last_use: u64,
}

impl SlotEntry {
    fn is_idle(&self) -> bool {
        match &self.busy {
            Some(f) => f.is_signaled(),
            None => true,
        }
    }
}

#[derive(Debug)]
struct SlotTable {
    slots: ArrayVec<SlotEntry, MAX_SLOTS>,
    tick: u64,
}

impl SlotTable {
    fn bump(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn lru_index<F: Fn(&SlotEntry) -> bool>(&self, eligible: F) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, e)| eligible(e))
            .min_by_key(|(_, e)| e.last_use)
            .map(|(i, _)| i)
    }
}

// =============================================================================
// ALLOCATOR
// =============================================================================

/// Bounded hardware addressing-slot allocator
///
/// One short-lived lock scopes every table mutation (pick victim, bind,
/// release), disjoint from all other scheduler locks.
#[derive(Debug)]
pub struct SlotAllocator {
    table: Mutex<SlotTable>,
}

impl SlotAllocator {
    /// Create an allocator with `config.num_slots` slots
    pub fn new(config: &SlotConfig) -> Self {
        let count = (config.num_slots as usize).clamp(1, MAX_SLOTS);
        let mut slots = ArrayVec::new();
        for _ in 0..count {
            slots.push(SlotEntry::default());
        }
        Self {
            table: Mutex::new(SlotTable { slots, tick: 0 }),
        }
    }

    /// Number of slots managed
    pub fn num_slots(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Acquire a slot for `ctx`
    ///
    /// - The context already owns a slot: returned immediately. A context
    ///   can therefore never deadlock against its own in-flight jobs.
    /// - A free or idle slot exists: the LRU one is (re)assigned.
    /// - Otherwise: the LRU victim's busy fence is returned as a
    ///   dependency to retry after.
    pub fn acquire(&self, ctx: ContextId) -> SlotAcquire {
        let mut table = self.table.lock();
        let tick = table.bump();

        // Fast path: the context keeps its slot across consecutive jobs
        if let Some(idx) = table.slots.iter().position(|e| e.owner == Some(ctx)) {
            table.slots[idx].last_use = tick;
            return SlotAcquire::Ready(SlotId::new(idx as u32));
        }

        // Evict the LRU idle slot (free slots are trivially idle)
        if let Some(idx) = table.lru_index(|e| e.is_idle()) {
            let entry = &mut table.slots[idx];
            if let Some(prev) = entry.owner {
                log::debug!("evicting {} from slot {} for {}", prev, idx, ctx);
            }
            entry.owner = Some(ctx);
            entry.busy = None;
            entry.last_use = tick;
            return SlotAcquire::Ready(SlotId::new(idx as u32));
        }

        // All slots are running other contexts' jobs: contention becomes a
        // dependency on the LRU victim's busy fence
        let victim = table
            .slots
            .iter()
            .filter(|e| e.busy.is_some())
            .min_by_key(|e| e.last_use);
        match victim.and_then(|e| e.busy.clone()) {
            Some(fence) => SlotAcquire::WaitFor(fence),
            // Unreachable: a table with no busy entry has an idle slot
            None => SlotAcquire::Ready(SlotId::new(0)),
        }
    }

    /// Bind an acquired slot to a job's completion fence
    ///
    /// Records ownership and marks the slot busy until the fence signals.
    pub fn bind(&self, ctx: ContextId, slot: SlotId, fence: Fence) {
        let mut table = self.table.lock();
        let tick = table.bump();
        if let Some(entry) = table.slots.get_mut(slot.index()) {
            entry.owner = Some(ctx);
            entry.busy = Some(fence);
            entry.last_use = tick;
        } else {
            log::error!("bind on out-of-range {}", slot);
        }
    }

    /// Free the context's slot if it has no more outstanding work
    pub fn release_idle(&self, ctx: ContextId) {
        let mut table = self.table.lock();
        if let Some(entry) = table.slots.iter_mut().find(|e| e.owner == Some(ctx)) {
            if entry.is_idle() {
                entry.owner = None;
                entry.busy = None;
            }
        }
    }

    /// Context currently owning `slot`, if any
    pub fn owner_of(&self, slot: SlotId) -> Option<ContextId> {
        self.table
            .lock()
            .slots
            .get(slot.index())
            .and_then(|e| e.owner)
    }

    /// Slot currently owned by `ctx`, if any
    pub fn slot_of(&self, ctx: ContextId) -> Option<SlotId> {
        self.table
            .lock()
            .slots
            .iter()
            .position(|e| e.owner == Some(ctx))
            .map(|i| SlotId::new(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{RingId, SeqNo};

    fn alloc(n: u32) -> SlotAllocator {
        SlotAllocator::new(&SlotConfig { num_slots: n })
    }

    fn fence(seq: u64) -> Fence {
        Fence::new(RingId::new(0), SeqNo::new(seq))
    }

    #[test]
    fn test_context_keeps_its_slot() {
        let a = alloc(2);
        let ctx = ContextId::new(1);
        let SlotAcquire::Ready(slot) = a.acquire(ctx) else {
            panic!("expected a slot");
        };
        a.bind(ctx, slot, fence(1));
        // Busy fence unsignaled, but it is our own slot
        let SlotAcquire::Ready(again) = a.acquire(ctx) else {
            panic!("own slot must be reusable");
        };
        assert_eq!(slot, again);
    }

    #[test]
    fn test_idle_slot_evicted_for_new_context() {
        let a = alloc(1);
        let ctx1 = ContextId::new(1);
        let ctx2 = ContextId::new(2);
        let f = fence(1);

        let SlotAcquire::Ready(slot) = a.acquire(ctx1) else {
            panic!()
        };
        a.bind(ctx1, slot, f.clone());
        f.signal(None);

        let SlotAcquire::Ready(slot2) = a.acquire(ctx2) else {
            panic!("idle slot must be evictable");
        };
        assert_eq!(slot, slot2);
        assert_eq!(a.owner_of(slot2), Some(ctx2));
        assert_eq!(a.slot_of(ctx1), None);
    }

    #[test]
    fn test_contention_returns_victim_fence() {
        let a = alloc(1);
        let ctx1 = ContextId::new(1);
        let ctx2 = ContextId::new(2);
        let busy = fence(1);

        let SlotAcquire::Ready(slot) = a.acquire(ctx1) else {
            panic!()
        };
        a.bind(ctx1, slot, busy.clone());

        let SlotAcquire::WaitFor(victim) = a.acquire(ctx2) else {
            panic!("busy foreign slot must return a wait fence");
        };
        assert!(victim.same_as(&busy));

        // Once the victim's work completes the slot is claimable
        busy.signal(None);
        let SlotAcquire::Ready(_) = a.acquire(ctx2) else {
            panic!("signaled victim must be evictable");
        };
    }

    #[test]
    fn test_self_slot_never_deadlocks() {
        // N back-to-back jobs from one context with a single slot
        let a = alloc(1);
        let ctx = ContextId::new(1);
        for seq in 0..16 {
            let SlotAcquire::Ready(slot) = a.acquire(ctx) else {
                panic!("context must never wait on itself");
            };
            // Previous job's fence intentionally left unsignaled
            a.bind(ctx, slot, fence(seq));
        }
    }

    #[test]
    fn test_release_idle() {
        let a = alloc(2);
        let ctx = ContextId::new(1);
        let f = fence(1);
        let SlotAcquire::Ready(slot) = a.acquire(ctx) else {
            panic!()
        };
        a.bind(ctx, slot, f.clone());

        // Not idle yet
        a.release_idle(ctx);
        assert_eq!(a.slot_of(ctx), Some(slot));

        f.signal(None);
        a.release_idle(ctx);
        assert_eq!(a.slot_of(ctx), None);
    }
}
