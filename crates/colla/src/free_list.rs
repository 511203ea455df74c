// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Intrusive, address-ordered free list.
//!
//! Every free block stores its own list node in its first eight bytes:
//!
//! ```text
//!   offset          +4              +8
//!   ┌───────────────┬───────────────┬──────────────────────┐
//!   │  size: u32    │  next: u32    │   unused free bytes  │
//!   └───────────────┴───────────────┴──────────────────────┘
//! ```
//!
//! `next` is the offset of the following free block, or the heap size as
//! the end-of-list sentinel. The list is kept sorted by offset and no two
//! nodes are ever address-adjacent: insertion merges a block with its
//! immediate neighbours, so a single merge step on each side is enough.
//!
//! Extraction is first-fit *by address*: the lowest block that is large
//! enough wins, not the tightest one.

use crate::ArenaError;

/// Bytes needed to host a free-list node. No block is ever smaller.
pub const MIN_BLOCK_SIZE: usize = 8;

const SIZE_FIELD: usize = 0;
const NEXT_FIELD: usize = 4;

/// A free span of the arena, as seen by a walk over the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FreeBlock {
    /// Offset of the first byte of the block.
    pub offset: usize,
    /// Size of the block in bytes, node included.
    pub size: usize,
}

impl FreeBlock {
    /// Offset one past the last byte of the block.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    size: u32,
    next: u32,
}

fn read_u32(heap: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&heap[at..at + 4]);
    u32::from_ne_bytes(bytes)
}

fn write_u32(heap: &mut [u8], at: usize, value: u32) {
    heap[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

fn read_node(heap: &[u8], offset: u32) -> Node {
    let at = offset as usize;
    Node {
        size: read_u32(heap, at + SIZE_FIELD),
        next: read_u32(heap, at + NEXT_FIELD),
    }
}

fn write_node(heap: &mut [u8], offset: u32, node: Node) {
    let at = offset as usize;
    write_u32(heap, at + SIZE_FIELD, node.size);
    write_u32(heap, at + NEXT_FIELD, node.next);
}

fn set_next(heap: &mut [u8], offset: u32, next: u32) {
    write_u32(heap, offset as usize + NEXT_FIELD, next);
}

/// Head of the free list plus the end-of-list sentinel.
///
/// The nodes themselves live in the heap, so every operation takes the
/// heap slice it threads through. The caller guarantees the heap is at
/// least [`MIN_BLOCK_SIZE`] and at most `u32::MAX` bytes long.
#[derive(Debug, Clone)]
pub(crate) struct FreeList {
    head: u32,
    end: u32,
}

impl FreeList {
    /// Makes the whole heap a single free block.
    pub(crate) fn new(heap: &mut [u8]) -> Self {
        let end = heap.len() as u32;
        write_node(
            heap,
            0,
            Node {
                size: end,
                next: end,
            },
        );
        Self { head: 0, end }
    }

    /// Puts `[offset, offset + size)` back on the list, merging it with
    /// address-adjacent neighbours.
    ///
    /// The span is checked against the arena bounds and against both
    /// neighbouring free blocks before anything is written. A span that
    /// overlaps free memory (a double free) is rejected with
    /// [`ArenaError::InvalidFree`] and leaves the list untouched.
    pub(crate) fn insert(
        &mut self,
        heap: &mut [u8],
        offset: usize,
        size: usize,
    ) -> Result<(), ArenaError> {
        let rejected = ArenaError::InvalidFree { offset };
        let end = offset.checked_add(size).ok_or_else(|| rejected.clone())?;
        if size < MIN_BLOCK_SIZE || end > self.end as usize {
            return Err(rejected);
        }

        // Walk to the last node that starts before `offset`.
        let mut prev: Option<u32> = None;
        let mut cur = self.head;
        while cur < self.end && (cur as usize) < offset {
            prev = Some(cur);
            cur = read_node(heap, cur).next;
        }

        if cur < self.end && (cur as usize) < end {
            return Err(rejected);
        }
        if let Some(p) = prev {
            if p as usize + read_node(heap, p).size as usize > offset {
                return Err(rejected);
            }
        }

        let offset = offset as u32;
        write_node(
            heap,
            offset,
            Node {
                size: size as u32,
                next: cur,
            },
        );
        match prev {
            None => self.head = offset,
            Some(p) => set_next(heap, p, offset),
        }

        self.unite(heap, offset);
        if let Some(p) = prev {
            self.unite(heap, p);
        }
        Ok(())
    }

    /// Merges the node at `offset` with its successor when they touch.
    fn unite(&self, heap: &mut [u8], offset: u32) {
        let node = read_node(heap, offset);
        if node.next < self.end && offset + node.size == node.next {
            let absorbed = read_node(heap, node.next);
            write_node(
                heap,
                offset,
                Node {
                    size: node.size + absorbed.size,
                    next: absorbed.next,
                },
            );
        }
    }

    /// Detaches the first block, in address order, of at least `min_size`
    /// bytes. `None` means the arena is out of memory for this request.
    pub(crate) fn extract(&mut self, heap: &mut [u8], min_size: usize) -> Option<FreeBlock> {
        let mut prev: Option<u32> = None;
        let mut cur = self.head;
        while cur < self.end {
            let node = read_node(heap, cur);
            if node.size as usize >= min_size {
                match prev {
                    None => self.head = node.next,
                    Some(p) => set_next(heap, p, node.next),
                }
                return Some(FreeBlock {
                    offset: cur as usize,
                    size: node.size as usize,
                });
            }
            prev = Some(cur);
            cur = node.next;
        }
        None
    }

    /// Number of free blocks. More blocks for the same free bytes means
    /// more fragmentation.
    pub(crate) fn count(&self, heap: &[u8]) -> usize {
        self.nodes(heap).count()
    }

    /// Walks the list, yielding each block with its raw `next` link.
    pub(crate) fn nodes<'h>(&self, heap: &'h [u8]) -> Nodes<'h> {
        Nodes {
            heap,
            cur: self.head,
            end: self.end,
        }
    }
}

/// Iterator over free-list nodes. A backward or self link ends the walk
/// after the offending node is yielded, so a corrupted list cannot loop.
pub(crate) struct Nodes<'h> {
    heap: &'h [u8],
    cur: u32,
    end: u32,
}

impl Iterator for Nodes<'_> {
    /// The block and the offset its node links to.
    type Item = (FreeBlock, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur >= self.end || self.cur as usize + MIN_BLOCK_SIZE > self.heap.len() {
            return None;
        }
        let offset = self.cur;
        let node = read_node(self.heap, offset);
        self.cur = if node.next > offset { node.next } else { self.end };
        Some((
            FreeBlock {
                offset: offset as usize,
                size: node.size as usize,
            },
            node.next as usize,
        ))
    }
}

/// Iterator over the free blocks of an arena, in ascending address order.
pub struct FreeBlocks<'h> {
    pub(crate) nodes: Nodes<'h>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        self.nodes.next().map(|(block, _)| block)
    }
}
