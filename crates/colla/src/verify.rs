// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Whole-heap consistency check.
//!
//! With diagnostics on, every byte of the arena must belong to exactly one
//! live allocation (from the shadow table) or one free block (from the
//! free list). The check paints both sets onto a scratch byte map the size
//! of the heap, so it costs `O(heap_size)` and is meant for tests and
//! fuzzing, not hot paths.

use crate::codec;
use crate::{Arena, ArenaError};

impl Arena<'_> {
    /// Returns `true` if the arena is consistent.
    ///
    /// Always `true` when diagnostics are off. Failures are logged at
    /// `error` level; use [`Arena::check`] to get the reason.
    pub fn verify(&self) -> bool {
        match self.check() {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("arena verification failed: {err}");
                false
            }
        }
    }

    /// Runs the consistency check and reports the first violation.
    pub fn check(&self) -> Result<(), ArenaError> {
        let Some(shadow) = &self.shadow else {
            return Ok(());
        };

        let heap_size = self.heap.len();
        let mut map = vec![0u8; heap_size];
        let mut marked = 0usize;
        let mut mark = |offset: usize, size: usize, what: &str| -> Result<(), ArenaError> {
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= heap_size)
                .ok_or_else(|| {
                    ArenaError::Corruption(format!(
                        "{what} at {offset} of {size} bytes leaves the {heap_size} byte arena"
                    ))
                })?;
            if let Some(i) = (offset..end).find(|&i| map[i] != 0) {
                return Err(ArenaError::Corruption(format!(
                    "{what} at {offset} overlaps byte {i}, which is already accounted for"
                )));
            }
            map[offset..end].fill(1);
            marked += size;
            Ok(())
        };

        let mut live_bytes = 0usize;
        for record in shadow.iter() {
            mark(record.offset, record.size, "allocation")?;
            let header = codec::decode(self.heap, record.payload.offset());
            let intact = header.is_some_and(|h| {
                record.payload.offset() - h.header_size == record.offset && h.span() == record.size
            });
            if !intact {
                return Err(ArenaError::Corruption(format!(
                    "allocation at {} no longer decodes to its {} byte span",
                    record.offset, record.size
                )));
            }
            live_bytes += record.size;
        }

        let mut prev_end: Option<usize> = None;
        for (block, next) in self.free_list.nodes(self.heap) {
            if next < heap_size && next <= block.offset {
                return Err(ArenaError::Corruption(format!(
                    "free block at {} links backwards to {next}",
                    block.offset
                )));
            }
            if prev_end == Some(block.offset) {
                return Err(ArenaError::Corruption(format!(
                    "free block at {} is adjacent to its predecessor and was not coalesced",
                    block.offset
                )));
            }
            mark(block.offset, block.size, "free block")?;
            prev_end = Some(block.end());
        }

        if marked < heap_size {
            return Err(ArenaError::Corruption(format!(
                "{} of {heap_size} bytes are unaccounted for",
                heap_size - marked
            )));
        }
        if let Some(i) = map.iter().position(|&b| b == 0) {
            return Err(ArenaError::Corruption(format!(
                "byte {i} is neither free nor allocated"
            )));
        }

        if shadow.len() != self.stats.allocated_blocks || live_bytes != self.stats.allocated_bytes
        {
            return Err(ArenaError::Corruption(format!(
                "counters report {} blocks / {} bytes, shadow table holds {} / {live_bytes}",
                self.stats.allocated_blocks,
                self.stats.allocated_bytes,
                shadow.len()
            )));
        }

        Ok(())
    }
}
