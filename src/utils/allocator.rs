//! Pooled allocator for short-lived per-frame structures.
//!
//! Requests are rounded up to a power-of-two size class. Each class carves
//! fixed-size slots out of aligned chunks that are reserved lazily and kept
//! until the pool is dropped; released slots go onto the class free list.
//!
//! The pool is shared through `&self` and guarded by a `parking_lot` mutex, so
//! one world-scoped instance may serve pairs processed on different threads.
//!
//! Raw [`Block`]s are move-only, which turns "release twice" into a compile
//! error. [`PoolBox`] goes one step further and releases on drop.

use std::alloc::{self, Layout};
#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::{
    config::{
        ExhaustionPolicy, PoolConfig, POOL_BLOCK_ALIGNMENT, POOL_MAX_SIZE_CLASS_POWER,
        POOL_MIN_SIZE_CLASS_POWER,
    },
    error::AllocError,
};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A slot handed out by [`PoolAllocator::allocate`].
///
/// The memory is uninitialised; the caller constructs its payload in place
/// and gives the block back with [`PoolAllocator::release`].
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    size: usize,
    power: u32,
    slot: usize,
    pool_id: u64,
}

// SAFETY: a block is exclusive access to its slot; the owning pool is Sync.
unsafe impl Send for Block {}

impl Block {
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size requested at allocation.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Usable bytes behind the pointer (the slot size).
    pub fn capacity(&self) -> usize {
        1 << self.power
    }
}

struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Chunk {
    fn reserve(bytes: usize) -> Result<Self, AllocError> {
        let layout = Layout::from_size_align(bytes, POOL_BLOCK_ALIGNMENT).map_err(|_| {
            AllocError::TooLarge {
                requested: bytes,
                max: 1 << POOL_MAX_SIZE_CLASS_POWER,
            }
        })?;
        // SAFETY: `bytes` is at least one slot, so the layout is non-zero sized.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        Ok(Self { ptr, layout })
    }
}

struct SizeClass {
    power: u32,
    slots_per_chunk: usize,
    chunks: Vec<Chunk>,
    free: Vec<usize>,
    next_slot: usize,
    outstanding: usize,
}

impl SizeClass {
    fn new(power: u32, chunk_size: usize) -> Self {
        let slot_size = 1usize << power;
        Self {
            power,
            slots_per_chunk: (slot_size.max(chunk_size) / slot_size).max(1),
            chunks: Vec::new(),
            free: Vec::new(),
            next_slot: 0,
            outstanding: 0,
        }
    }

    fn slot_size(&self) -> usize {
        1 << self.power
    }

    fn chunk_bytes(&self) -> usize {
        self.slot_size() * self.slots_per_chunk
    }

    fn slot_ptr(&self, slot: usize) -> NonNull<u8> {
        let chunk = &self.chunks[slot / self.slots_per_chunk];
        let offset = (slot % self.slots_per_chunk) * self.slot_size();
        // SAFETY: offset + slot_size <= chunk_bytes, so the pointer stays inside the chunk.
        unsafe { NonNull::new_unchecked(chunk.ptr.as_ptr().add(offset)) }
    }
}

struct PoolState {
    classes: Vec<SizeClass>,
    reserved_bytes: usize,
    outstanding: usize,
    #[cfg(debug_assertions)]
    live: HashSet<(u32, usize)>,
}

// SAFETY: chunk pointers are owned by the state and only touched under the pool mutex.
unsafe impl Send for PoolState {}

impl Drop for PoolState {
    fn drop(&mut self) {
        for class in &mut self.classes {
            for chunk in class.chunks.drain(..) {
                // SAFETY: every chunk was obtained from `alloc::alloc` with this layout.
                unsafe { alloc::dealloc(chunk.ptr.as_ptr(), chunk.layout) };
            }
        }
    }
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub outstanding: usize,
    pub reserved_bytes: usize,
    pub free_slots: usize,
    pub chunks: usize,
}

/// World-scoped pooled allocator.
pub struct PoolAllocator {
    id: u64,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl PoolAllocator {
    pub fn new(config: PoolConfig) -> Self {
        let classes = (POOL_MIN_SIZE_CLASS_POWER..=POOL_MAX_SIZE_CLASS_POWER)
            .map(|power| SizeClass::new(power, config.chunk_size))
            .collect();
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state: Mutex::new(PoolState {
                classes,
                reserved_bytes: 0,
                outstanding: 0,
                #[cfg(debug_assertions)]
                live: HashSet::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns a block of at least `size` bytes, aligned to the slot size (up to
    /// [`POOL_BLOCK_ALIGNMENT`]).
    pub fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        let power = size_class_power(size)?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let class = &mut state.classes[(power - POOL_MIN_SIZE_CLASS_POWER) as usize];

        let slot = match class.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = class.next_slot;
                if slot / class.slots_per_chunk >= class.chunks.len() {
                    let bytes = class.chunk_bytes();
                    if self.config.exhaustion == ExhaustionPolicy::Fail
                        && state.reserved_bytes.saturating_add(bytes) > self.config.capacity_bytes
                    {
                        log::warn!(
                            "pool {} exhausted: {size} bytes requested with {} of {} bytes reserved",
                            self.id,
                            state.reserved_bytes,
                            self.config.capacity_bytes
                        );
                        return Err(AllocError::Exhausted {
                            requested: size,
                            reserved: state.reserved_bytes,
                            capacity: self.config.capacity_bytes,
                        });
                    }
                    class.chunks.push(Chunk::reserve(bytes)?);
                    state.reserved_bytes += bytes;
                }
                class.next_slot += 1;
                slot
            }
        };

        class.outstanding += 1;
        state.outstanding += 1;
        #[cfg(debug_assertions)]
        state.live.insert((power, slot));

        Ok(Block {
            ptr: class.slot_ptr(slot),
            size,
            power,
            slot,
            pool_id: self.id,
        })
    }

    /// Gives a block back. `size` must be the size passed to [`Self::allocate`].
    ///
    /// A rejected block stays reserved; it is never handed out again.
    pub fn release(&self, block: Block, size: usize) -> Result<(), AllocError> {
        if block.pool_id != self.id {
            return Err(AllocError::ForeignBlock {
                owner: block.pool_id,
                pool: self.id,
            });
        }
        if block.size != size {
            return Err(AllocError::SizeMismatch {
                expected: block.size,
                actual: size,
            });
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        #[cfg(debug_assertions)]
        debug_assert!(
            state.live.remove(&(block.power, block.slot)),
            "block was not outstanding in this pool"
        );
        let class = &mut state.classes[(block.power - POOL_MIN_SIZE_CLASS_POWER) as usize];
        class.free.push(block.slot);
        class.outstanding -= 1;
        state.outstanding -= 1;
        Ok(())
    }

    /// Moves `value` into a pooled block that is released when the box drops.
    pub fn alloc_value<T>(&self, value: T) -> Result<PoolBox<'_, T>, AllocError> {
        let align = mem::align_of::<T>();
        if align > POOL_BLOCK_ALIGNMENT {
            return Err(AllocError::UnsupportedAlignment {
                align,
                max: POOL_BLOCK_ALIGNMENT,
            });
        }
        // Slots are aligned to their own size, so asking for `align` bytes
        // covers zero-sized payloads with large alignment.
        let block = self.allocate(mem::size_of::<T>().max(align))?;
        let ptr = block.as_ptr().cast::<T>();
        // SAFETY: the slot is at least size_of::<T>() bytes, suitably aligned and unused.
        unsafe { ptr.as_ptr().write(value) };
        Ok(PoolBox {
            ptr,
            block: Some(block),
            pool: self,
            _marker: PhantomData,
        })
    }

    /// Blocks handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    pub fn reserved_bytes(&self) -> usize {
        self.state.lock().reserved_bytes
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            outstanding: state.outstanding,
            reserved_bytes: state.reserved_bytes,
            free_slots: state.classes.iter().map(|c| c.free.len()).sum(),
            chunks: state.classes.iter().map(|c| c.chunks.len()).sum(),
        }
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.outstanding > 0 {
            let leaked: Vec<(usize, usize)> = state
                .classes
                .iter()
                .filter(|c| c.outstanding > 0)
                .map(|c| (c.slot_size(), c.outstanding))
                .collect();
            log::warn!(
                "pool {} dropped with {} outstanding blocks (slot size, count): {leaked:?}",
                self.id,
                state.outstanding
            );
        }
    }
}

fn size_class_power(size: usize) -> Result<u32, AllocError> {
    let max = 1usize << POOL_MAX_SIZE_CLASS_POWER;
    let rounded = size
        .max(1)
        .checked_next_power_of_two()
        .filter(|&rounded| rounded <= max)
        .ok_or(AllocError::TooLarge {
            requested: size,
            max,
        })?;
    Ok(rounded.trailing_zeros().max(POOL_MIN_SIZE_CLASS_POWER))
}

/// Owning handle to a value stored in a pooled block.
///
/// Dropping the box drops the value in place and releases the block to the
/// pool it came from.
pub struct PoolBox<'pool, T> {
    ptr: NonNull<T>,
    block: Option<Block>,
    pool: &'pool PoolAllocator,
    _marker: PhantomData<T>,
}

impl<T> PoolBox<'_, T> {
    pub fn pool_id(&self) -> u64 {
        self.pool.id
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value was written in `alloc_value` and lives until drop.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; `&mut self` guarantees exclusivity.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PoolBox").field(&**self).finish()
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the value is initialised and is not used again after this.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        if let Some(block) = self.block.take() {
            let size = block.len();
            if let Err(err) = self.pool.release(block, size) {
                log::error!("failed to release pooled value: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn sizes_round_up_to_classes() {
        assert_eq!(size_class_power(0).unwrap(), POOL_MIN_SIZE_CLASS_POWER);
        assert_eq!(size_class_power(16).unwrap(), 4);
        assert_eq!(size_class_power(17).unwrap(), 5);
        assert_eq!(size_class_power(1000).unwrap(), 10);
        assert!(matches!(
            size_class_power((1 << POOL_MAX_SIZE_CLASS_POWER) + 1),
            Err(AllocError::TooLarge { .. })
        ));
    }

    #[test]
    fn blocks_are_never_undersized_and_are_reused() {
        let pool = PoolAllocator::default();
        let block = pool.allocate(40).unwrap();
        assert!(block.capacity() >= 40);
        let first = block.as_ptr();
        pool.release(block, 40).unwrap();
        let again = pool.allocate(33).unwrap();
        assert_eq!(again.as_ptr(), first, "freed slot should be reused");
        pool.release(again, 33).unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let pool = PoolAllocator::default();
        let block = pool.allocate(24).unwrap();
        assert_eq!(
            pool.release(block, 16),
            Err(AllocError::SizeMismatch {
                expected: 24,
                actual: 16
            })
        );
    }

    #[test]
    fn foreign_block_is_reported() {
        let a = PoolAllocator::default();
        let b = PoolAllocator::default();
        let block = a.allocate(8).unwrap();
        assert!(matches!(
            b.release(block, 8),
            Err(AllocError::ForeignBlock { .. })
        ));
        assert_eq!(b.outstanding(), 0);
    }

    #[test]
    fn bounded_pool_fails_instead_of_growing() {
        let pool = PoolAllocator::new(PoolConfig {
            chunk_size: 64,
            ..PoolConfig::bounded(64)
        });
        let blocks: Vec<Block> = (0..4).map(|_| pool.allocate(16).unwrap()).collect();
        assert!(matches!(
            pool.allocate(16),
            Err(AllocError::Exhausted { capacity: 64, .. })
        ));
        for block in blocks {
            pool.release(block, 16).unwrap();
        }
        assert!(pool.allocate(16).is_ok());
    }

    #[test]
    fn pool_box_drops_value_and_releases_block() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let pool = PoolAllocator::default();
        {
            let boxed = pool.alloc_value(Tracked(drops.clone())).unwrap();
            assert_eq!(boxed.pool_id(), pool.id());
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn pool_box_gives_mutable_access() {
        let pool = PoolAllocator::default();
        let mut value = pool.alloc_value([1u64, 2, 3]).unwrap();
        value[1] = 20;
        assert_eq!(*value, [1, 20, 3]);
    }

    #[test]
    fn over_aligned_payloads_are_rejected() {
        #[repr(align(128))]
        struct Wide(#[allow(dead_code)] u8);
        let pool = PoolAllocator::default();
        assert!(matches!(
            pool.alloc_value(Wide(0)),
            Err(AllocError::UnsupportedAlignment { align: 128, .. })
        ));
    }
}
