// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for arena allocation.

/// Errors that can occur while allocating from, or releasing into, an arena.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// No free block is large enough for the request.
    #[error("out of memory: requested {requested} bytes, largest free block is {largest_free} bytes")]
    OutOfMemory {
        requested: usize,
        largest_free: usize,
    },

    /// The handle does not address a live allocation in this arena.
    #[error("invalid free: payload offset {offset} does not address a live allocation")]
    InvalidFree { offset: usize },

    /// The requested size cannot be encoded in a 4-byte size header.
    #[error("capacity exceeded: {requested} bytes is beyond the 2^28 - 1 byte header limit")]
    CapacityExceeded { requested: usize },

    /// The caller-supplied buffer cannot host an arena.
    #[error("invalid arena: {0}")]
    InvalidArena(String),

    /// The consistency check found a broken invariant.
    #[error("arena integrity error: {0}")]
    Corruption(String),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}
