//! Arena Allocator - O(1) object pools with compact 32-bit handles.
//!
//! Orders and price buckets live in pre-sized slot vectors. Released
//! slots go onto a free-index stack and are handed out again before the
//! vector grows, so steady-state operation never touches the allocator.
//! Handles are plain `u32` indices; no Rust references escape the pool.

use std::fmt;

use crate::command::{OrderType, Side};

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers"
/// Using u32 instead of 64-bit pointers halves metadata size,
/// doubling cache efficiency.
pub type ArenaIndex = u32;

/// A single resting order - exactly 64 bytes (one cache line).
///
/// # Memory Layout
///
/// | Field      | Type | Offset | Size |
/// |------------|------|--------|------|
/// | price      | u64  | 0      | 8    |
/// | size       | u64  | 8      | 8    |
/// | filled     | u64  | 16     | 8    |
/// | order_id   | u64  | 24     | 8    |
/// | uid        | u64  | 32     | 8    |
/// | timestamp  | i64  | 40     | 8    |
/// | next       | u32  | 48     | 4    |
/// | prev       | u32  | 52     | 4    |
/// | symbol     | u32  | 56     | 4    |
/// | action     | u8   | 60     | 1    |
/// | order_type | u8   | 61     | 1    |
/// | (padding)  | -    | 62     | 2    |
/// | **Total**  |      |        | 64   |
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OrderNode {
    // === Hot Data (read on every match step) ===
    pub price: u64,

    /// Original volume, possibly shrunk by reduce commands
    pub size: u64,

    /// Volume already traded; `filled <= size`
    pub filled: u64,

    pub order_id: u64,

    /// Owner, used for ownership checks and self-trade prevention
    pub uid: u64,

    pub timestamp: i64,

    // === Linkage (FIFO queue pointers within an OrderBucket) ===
    pub next: ArenaIndex,
    pub prev: ArenaIndex,

    pub symbol: u32,
    pub action: Side,
    pub order_type: OrderType,
}

// Compile-time assertion: OrderNode must be exactly 64 bytes
const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

// Compile-time assertion: OrderNode must be 64-byte aligned
const _: () = assert!(
    std::mem::align_of::<OrderNode>() == 64,
    "OrderNode must be 64-byte aligned"
);

impl OrderNode {
    /// Create an empty/uninitialized node (for the free stack)
    #[inline]
    pub const fn empty() -> Self {
        Self {
            price: 0,
            size: 0,
            filled: 0,
            order_id: 0,
            uid: 0,
            timestamp: 0,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            symbol: 0,
            action: Side::Bid,
            order_type: OrderType::Limit,
        }
    }

    /// Volume still open for matching.
    #[inline]
    pub const fn remaining(&self) -> u64 {
        self.size - self.filled
    }
}

impl Default for OrderNode {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("order_id", &self.order_id)
            .field("uid", &self.uid)
            .field("action", &self.action)
            .field("price", &self.price)
            .field("size", &self.size)
            .field("filled", &self.filled)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Growable object pool with O(1) allocation and release.
///
/// Free slots are tracked on an index stack, so the most recently
/// released slot is reused first (it is most likely still in cache).
pub struct Arena<T> {
    /// Contiguous block of slots, live and free alike
    slots: Vec<T>,

    /// Indices of free slots; top of stack is handed out next
    free: Vec<ArenaIndex>,

    /// Number of currently allocated slots
    allocated: u32,
}

impl<T: Default> Arena<T> {
    /// Create a new arena with `capacity` slots pre-allocated.
    ///
    /// # Panics
    /// Panics if capacity reaches `NULL_INDEX` (reserved as the null handle)
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        let slots = (0..capacity).map(|_| T::default()).collect();
        // Reversed so that slot 0 is handed out first
        let free = (0..capacity).rev().collect();

        Self {
            slots,
            free,
            allocated: 0,
        }
    }

    /// Allocate a slot.
    ///
    /// Reuses a released slot when one exists, otherwise grows the
    /// backing vector by one slot. The returned slot holds `T::default()`.
    ///
    /// # Complexity
    /// O(1) amortized
    #[inline]
    pub fn alloc(&mut self) -> ArenaIndex {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.slots.len() as ArenaIndex;
                assert!(index < NULL_INDEX, "Arena exhausted the index space");
                self.slots.push(T::default());
                index
            }
        };
        self.allocated += 1;
        index
    }

    /// Return a slot to the pool, resetting its contents.
    ///
    /// The caller must not use `index` afterwards; the slot may be
    /// handed out again by the next `alloc`.
    ///
    /// # Complexity
    /// O(1) - pushes onto the free stack
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!((index as usize) < self.slots.len(), "Index out of bounds");
        debug_assert!(self.allocated > 0, "Double free detected");

        self.slots[index as usize] = T::default();
        self.free.push(index);
        self.allocated -= 1;
    }

    /// Release every slot at once, keeping the backing memory.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = T::default();
        }
        self.free.clear();
        self.free.extend((0..self.slots.len() as ArenaIndex).rev());
        self.allocated = 0;
    }
}

impl<T> Arena<T> {
    /// Get an immutable reference to a slot.
    ///
    /// # Complexity
    /// O(1) - direct array access
    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &T {
        debug_assert!((index as usize) < self.slots.len(), "Index out of bounds");
        &self.slots[index as usize]
    }

    /// Get a mutable reference to a slot.
    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut T {
        debug_assert!((index as usize) < self.slots.len(), "Index out of bounds");
        &mut self.slots[index as usize]
    }

    /// Returns the number of currently allocated slots.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Returns the number of slots backed by memory (live plus free).
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Returns the number of slots that can be handed out without growing.
    #[inline]
    pub fn available(&self) -> u32 {
        self.free.len() as u32
    }

    /// Returns true if the arena is empty (no allocated slots).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Pre-fault all memory pages (warm-up routine).
    ///
    /// Walks every slot so the OS maps the pages before the hot path
    /// needs them.
    pub fn warm_up(&mut self) {
        for slot in &mut self.slots {
            std::hint::black_box(slot);
        }
        std::hint::black_box(&mut self.free);
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.slots.len())
            .field("allocated", &self.allocated)
            .field("free", &self.free.len())
            .finish()
    }
}
