// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shadow record of live allocations, kept only in diagnostics mode.
//!
//! The arena itself never needs to know where its allocated blocks are:
//! they are simply the gaps between free blocks. The shadow table keeps an
//! independent copy of that knowledge so that `free` can reject handles
//! that were never handed out and the verifier can prove the heap is
//! exactly tiled.

use crate::Payload;
use std::collections::BTreeMap;

/// One live allocation as recorded at `alloc` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Handle returned to the caller.
    pub payload: Payload,
    /// Offset of the first header byte.
    pub offset: usize,
    /// Full storage span: header plus payload.
    pub size: usize,
}

/// Live allocations keyed by block offset.
#[derive(Debug, Default, Clone)]
pub(crate) struct ShadowTable {
    records: BTreeMap<usize, AllocationRecord>,
}

impl ShadowTable {
    pub(crate) fn record(&mut self, record: AllocationRecord) {
        self.records.insert(record.offset, record);
    }

    pub(crate) fn get(&self, offset: usize) -> Option<&AllocationRecord> {
        self.records.get(&offset)
    }

    pub(crate) fn remove(&mut self, offset: usize) -> Option<AllocationRecord> {
        self.records.remove(&offset)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.records.values()
    }
}
