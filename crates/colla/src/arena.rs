// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocation engine.
//!
//! An [`Arena`] manages a caller-supplied byte buffer. It:
//!
//! 1. Keeps every free span on an address-ordered free list stored inside
//!    the buffer itself, so it never needs memory of its own.
//! 2. Serves requests first-fit, splitting off the unused tail of a block
//!    when the tail can hold a free-list node.
//! 3. Prefixes each allocation with a 1–4 byte size header, which is all
//!    `free` needs to give the block back.
//! 4. Optionally shadows every live allocation (diagnostics mode) so that
//!    bad frees are caught and the whole heap can be verified.
//!
//! # Block Layout
//! ```text
//!   offset                 payload
//!   │                      │
//!   ▼                      ▼
//!   ┌──────────────────────┬──────────────────────────────┐
//!   │ size header (1–4 B)  │ user bytes                   │
//!   └──────────────────────┴──────────────────────────────┘
//!   ◄──────────────────────── span ────────────────────────►
//! ```
//!
//! # Thread Safety
//! None. Every mutating call takes `&mut self`; wrap the arena in a mutex
//! to share it.

use crate::codec::{self, SizeHeader};
use crate::config::default_diagnostics;
use crate::free_list::{FreeBlock, FreeBlocks, FreeList, MIN_BLOCK_SIZE};
use crate::shadow::{AllocationRecord, ShadowTable};
use crate::{AllocationStats, ArenaConfig, ArenaError};
use std::io::{self, Write};

/// Handle to an allocation: the arena offset of its first user byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Payload(usize);

impl Payload {
    /// Wraps a raw payload offset. The arena validates it on use.
    pub fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Offset of the first user byte within the arena.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// A live block found by decoding backwards from a payload.
#[derive(Debug, Clone, Copy)]
struct LiveBlock {
    offset: usize,
    header: SizeHeader,
    /// Span recorded in the shadow table, when diagnostics are on.
    recorded: Option<usize>,
}

/// A first-fit allocator over a borrowed, fixed-size buffer.
///
/// # Example
/// ```
/// use colla::Arena;
///
/// let mut heap = [0u8; 64];
/// let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();
///
/// let p = arena.alloc(10).unwrap();
/// arena.payload_mut(p).unwrap().copy_from_slice(b"0123456789");
/// assert_eq!(arena.empty_blocks(), 1);
///
/// arena.free(p).unwrap();
/// assert!(arena.verify());
/// ```
pub struct Arena<'heap> {
    pub(crate) heap: &'heap mut [u8],
    pub(crate) free_list: FreeList,
    pub(crate) stats: AllocationStats,
    pub(crate) shadow: Option<ShadowTable>,
}

impl<'heap> Arena<'heap> {
    /// Takes over `heap` as a single free block. Diagnostics follow the
    /// `diagnostics` cargo feature.
    pub fn init(heap: &'heap mut [u8]) -> Result<Self, ArenaError> {
        Self::with_diagnostics(heap, default_diagnostics())
    }

    /// Takes over `heap` with diagnostics mode switched explicitly.
    pub fn with_diagnostics(heap: &'heap mut [u8], diagnostics: bool) -> Result<Self, ArenaError> {
        if heap.len() < MIN_BLOCK_SIZE {
            return Err(ArenaError::InvalidArena(format!(
                "{} bytes cannot hold a {MIN_BLOCK_SIZE}-byte free block",
                heap.len()
            )));
        }
        if heap.len() > u32::MAX as usize {
            return Err(ArenaError::InvalidArena(format!(
                "{} bytes exceeds the {} byte offset range",
                heap.len(),
                u32::MAX
            )));
        }

        let free_list = FreeList::new(heap);
        tracing::debug!("arena initialised: {} bytes, diagnostics {}", heap.len(), diagnostics);

        Ok(Self {
            heap,
            free_list,
            stats: AllocationStats::default(),
            shadow: diagnostics.then(ShadowTable::default),
        })
    }

    /// Takes over `heap` using the diagnostics setting of `config`.
    ///
    /// `config.heap_size` is not consulted; the buffer length is the size.
    pub fn from_config(heap: &'heap mut [u8], config: &ArenaConfig) -> Result<Self, ArenaError> {
        Self::with_diagnostics(heap, config.diagnostics)
    }

    /// Discards all bookkeeping and makes the whole buffer one free block
    /// again. Outstanding handles become invalid.
    pub fn reset(&mut self) {
        self.free_list = FreeList::new(self.heap);
        self.stats = AllocationStats::default();
        if let Some(shadow) = self.shadow.as_mut() {
            *shadow = ShadowTable::default();
        }
        tracing::debug!("arena reset: {} bytes", self.heap.len());
    }

    /// Ends the arena and hands the buffer back. Contents are untouched.
    pub fn deinit(self) -> &'heap mut [u8] {
        tracing::debug!(
            "arena released: {} bytes, {} live blocks",
            self.heap.len(),
            self.stats.allocated_blocks
        );
        self.heap
    }

    /// Allocates a block with room for at least `size` user bytes.
    ///
    /// The block may be larger than requested: tiny requests are padded to
    /// the minimum block size, and a free block whose leftover could not
    /// hold a free-list node is handed out whole. [`Arena::usable_size`]
    /// reports the real size.
    pub fn alloc(&mut self, size: usize) -> Result<Payload, ArenaError> {
        let header_size = codec::header_size_for(size)?;
        let total = (header_size + size).max(MIN_BLOCK_SIZE);

        let Some(block) = self.free_list.extract(self.heap, total) else {
            self.stats.record_oom();
            let largest_free = self.largest_free_block();
            tracing::debug!("out of memory: requested {size} bytes, largest free block {largest_free}");
            return Err(ArenaError::OutOfMemory {
                requested: size,
                largest_free,
            });
        };

        let leftover = block.size - total;
        let split = leftover >= MIN_BLOCK_SIZE;
        let span = if split { total } else { block.size };

        let Some(header) = codec::header_for_span(span) else {
            self.free_list.insert(self.heap, block.offset, block.size)?;
            return Err(ArenaError::CapacityExceeded { requested: span });
        };
        if split {
            self.free_list
                .insert(self.heap, block.offset + total, leftover)?;
        }

        let payload = block.offset + header.header_size;
        codec::encode_with_width(self.heap, payload, header.user_size, header.header_size)?;

        self.stats.record_allocation(span);
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.record(AllocationRecord {
                payload: Payload(payload),
                offset: block.offset,
                size: span,
            });
        }
        tracing::debug!("allocated {size} bytes at {}, span {span}", block.offset);

        Ok(Payload(payload))
    }

    /// Returns a block to the free list, merging it with free neighbours.
    ///
    /// A handle that does not address a live allocation is reported as
    /// [`ArenaError::InvalidFree`] and leaves the arena untouched.
    pub fn free(&mut self, payload: Payload) -> Result<(), ArenaError> {
        let block = self.locate(payload)?;
        self.release(payload, block)
    }

    /// Moves an allocation into a new block of `new_size` bytes.
    ///
    /// The first `min(old size, new_size)` bytes are copied; anything past
    /// the old size is uninitialised. If the new block cannot be allocated
    /// the old one stays live and the error is returned.
    pub fn realloc(&mut self, payload: Payload, new_size: usize) -> Result<Payload, ArenaError> {
        let old = self.locate(payload)?;
        let moved = self.alloc(new_size)?;

        let count = old.header.user_size.min(new_size);
        self.heap
            .copy_within(payload.0..payload.0 + count, moved.0);

        if let Err(err) = self.release(payload, old) {
            self.free(moved)?;
            return Err(err);
        }
        self.stats.record_reallocation();
        tracing::debug!("reallocated {} -> {}, {count} bytes copied", payload.0, moved.0);

        Ok(moved)
    }

    /// Decodes and validates the block behind `payload` without side effects.
    fn inspect(&self, payload: Payload) -> Result<LiveBlock, &'static str> {
        let header = codec::decode(self.heap, payload.0).ok_or("no size header before payload")?;
        let offset = payload.0 - header.header_size;
        let end = offset + header.span();
        if end > self.heap.len() || header.span() < MIN_BLOCK_SIZE {
            return Err("block does not fit the arena");
        }

        let recorded = match &self.shadow {
            Some(shadow) => {
                let record = shadow
                    .get(offset)
                    .filter(|record| record.payload == payload)
                    .ok_or("not a live allocation")?;
                Some(record.size)
            }
            None => None,
        };
        Ok(LiveBlock {
            offset,
            header,
            recorded,
        })
    }

    /// Like [`Arena::inspect`], but reports rejections and size mismatches.
    fn locate(&mut self, payload: Payload) -> Result<LiveBlock, ArenaError> {
        let block = match self.inspect(payload) {
            Ok(block) => block,
            Err(reason) => return Err(self.reject_free(payload, reason)),
        };

        if let Some(recorded) = block.recorded {
            if recorded != block.header.span() {
                self.stats.record_size_mismatch();
                tracing::warn!(
                    "releasing block at {} with mismatched size: recorded {recorded}, decoded {}",
                    block.offset,
                    block.header.span()
                );
            }
        }
        Ok(block)
    }

    fn release(&mut self, payload: Payload, block: LiveBlock) -> Result<(), ArenaError> {
        let span = block.header.span();
        if self
            .free_list
            .insert(self.heap, block.offset, span)
            .is_err()
        {
            return Err(self.reject_free(payload, "block overlaps free memory"));
        }

        if let Some(shadow) = self.shadow.as_mut() {
            shadow.remove(block.offset);
        }
        self.stats.record_deallocation(span);
        tracing::debug!("freed block at {}, span {span}", block.offset);
        Ok(())
    }

    fn reject_free(&mut self, payload: Payload, reason: &'static str) -> ArenaError {
        self.stats.record_invalid_free();
        tracing::warn!("releasing invalid block at {}: {reason}", payload.0);
        ArenaError::InvalidFree { offset: payload.0 }
    }

    /// The user bytes of a live allocation.
    pub fn payload(&self, payload: Payload) -> Result<&[u8], ArenaError> {
        let block = self.live(payload)?;
        Ok(&self.heap[payload.0..payload.0 + block.header.user_size])
    }

    /// The user bytes of a live allocation, mutably.
    pub fn payload_mut(&mut self, payload: Payload) -> Result<&mut [u8], ArenaError> {
        let block = self.live(payload)?;
        Ok(&mut self.heap[payload.0..payload.0 + block.header.user_size])
    }

    /// Number of user bytes the allocation can hold, padding included.
    pub fn usable_size(&self, payload: Payload) -> Result<usize, ArenaError> {
        Ok(self.live(payload)?.header.user_size)
    }

    /// Raw pointer to the first user byte of a live allocation.
    pub fn as_ptr(&self, payload: Payload) -> Result<*const u8, ArenaError> {
        Ok(self.payload(payload)?.as_ptr())
    }

    /// Mutable raw pointer to the first user byte of a live allocation.
    pub fn as_mut_ptr(&mut self, payload: Payload) -> Result<*mut u8, ArenaError> {
        Ok(self.payload_mut(payload)?.as_mut_ptr())
    }

    /// Converts a pointer into the arena back into a handle.
    ///
    /// Returns `None` for pointers outside the buffer. The handle is not
    /// checked for liveness until it is used.
    pub fn payload_from_ptr(&self, ptr: *const u8) -> Option<Payload> {
        let base = self.heap.as_ptr() as usize;
        let offset = (ptr as usize).checked_sub(base)?;
        (offset < self.heap.len()).then_some(Payload(offset))
    }

    fn live(&self, payload: Payload) -> Result<LiveBlock, ArenaError> {
        self.inspect(payload)
            .map_err(|_| ArenaError::InvalidFree { offset: payload.0 })
    }

    /// Size of the managed buffer in bytes.
    pub fn heap_size(&self) -> usize {
        self.heap.len()
    }

    /// Whether diagnostics mode (shadow tracking) is on.
    pub fn diagnostics(&self) -> bool {
        self.shadow.is_some()
    }

    /// Current counters.
    pub fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    /// Number of free blocks. A direct measure of external fragmentation.
    pub fn empty_blocks(&self) -> usize {
        self.free_list.count(self.heap)
    }

    /// Alias of [`Arena::empty_blocks`].
    pub fn fragmentation_count(&self) -> usize {
        self.empty_blocks()
    }

    /// Free blocks in ascending address order.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            nodes: self.free_list.nodes(self.heap),
        }
    }

    /// Total bytes on the free list.
    pub fn free_bytes(&self) -> usize {
        self.free_blocks().map(|b| b.size).sum()
    }

    /// Size of the largest free block, or zero when the arena is full.
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks().map(|b| b.size).max().unwrap_or(0)
    }

    /// Live allocations in address order. Empty unless diagnostics are on.
    pub fn allocations(&self) -> impl Iterator<Item = &AllocationRecord> + '_ {
        self.shadow.iter().flat_map(|shadow| shadow.iter())
    }

    /// Writes the live block and byte counters.
    pub fn write_stats<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Total blocks: {}", self.stats.allocated_blocks)?;
        writeln!(out, "Total bytes: {}", self.stats.allocated_bytes)
    }

    /// Prints the live block and byte counters to stdout.
    pub fn print_stats(&self) {
        println!("Total blocks: {}", self.stats.allocated_blocks);
        println!("Total bytes: {}", self.stats.allocated_bytes);
    }
}

impl std::fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("heap_size", &self.heap_size())
            .field("allocated_blocks", &self.stats.allocated_blocks)
            .field("allocated_bytes", &self.stats.allocated_bytes)
            .field("empty_blocks", &self.empty_blocks())
            .field("diagnostics", &self.diagnostics())
            .finish()
    }
}
