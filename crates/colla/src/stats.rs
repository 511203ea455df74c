// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation counters for profiling and diagnostics.
//!
//! [`AllocationStats`] holds the live-allocation counters the arena keeps
//! on every call, plus cumulative event counts (OOMs, rejected frees, size
//! mismatches) that are useful when sizing an arena for a workload.

/// Counters describing how an arena is being used.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Number of live allocated blocks.
    pub allocated_blocks: usize,
    /// Bytes held by live blocks, headers and padding included.
    pub allocated_bytes: usize,
    /// High-water mark of `allocated_bytes`.
    pub peak_allocated_bytes: usize,
    /// Successful allocations, including those made by `realloc`.
    pub total_allocations: u64,
    /// Successful frees, including those made by `realloc`.
    pub total_deallocations: u64,
    /// Successful reallocations.
    pub total_reallocations: u64,
    /// Allocation requests that found no large enough free block.
    pub oom_count: u64,
    /// Rejected frees (handles that did not address a live block).
    pub invalid_frees: u64,
    /// Frees whose decoded size disagreed with the shadow record.
    pub size_mismatches: u64,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, span: usize) {
        self.allocated_blocks += 1;
        self.allocated_bytes += span;
        self.total_allocations += 1;
        if self.allocated_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = self.allocated_bytes;
        }
    }

    pub(crate) fn record_deallocation(&mut self, span: usize) {
        self.allocated_blocks = self.allocated_blocks.saturating_sub(1);
        self.allocated_bytes = self.allocated_bytes.saturating_sub(span);
        self.total_deallocations += 1;
    }

    pub(crate) fn record_reallocation(&mut self) {
        self.total_reallocations += 1;
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_invalid_free(&mut self) {
        self.invalid_frees += 1;
    }

    pub(crate) fn record_size_mismatch(&mut self) {
        self.size_mismatches += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Total blocks: {}\nTotal bytes: {}\n\
             Peak bytes: {}, {} allocations, {} frees, {} reallocations, \
             {} OOMs, {} invalid frees, {} size mismatches",
            self.allocated_blocks,
            self.allocated_bytes,
            self.peak_allocated_bytes,
            self.total_allocations,
            self.total_deallocations,
            self.total_reallocations,
            self.oom_count,
            self.invalid_frees,
            self.size_mismatches,
        )
    }
}
