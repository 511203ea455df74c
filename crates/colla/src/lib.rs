// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # colla
//!
//! A freestanding allocator for memory-constrained targets. It manages a
//! single caller-supplied buffer and never asks the host for memory.
//!
//! # Key Components
//!
//! - [`Arena`]: first-fit allocation, coalescing free and
//!   move-based reallocation over a borrowed `&mut [u8]`.
//! - [`codec`]: the 1–4 byte variable-length size header stored in
//!   front of every allocation.
//! - [`FreeBlock`] / [`FreeBlocks`]: read-only view of the address-ordered
//!   free list that lives inside the buffer.
//! - [`AllocationStats`]: live block/byte counters and event counts.
//! - [`ArenaConfig`] / [`ArenaSize`]: TOML configuration and
//!   human-readable sizes (`"64K"`, `"8M"`).
//!
//! # Diagnostics Mode
//!
//! With diagnostics on (per arena, or by default through the
//! `diagnostics` cargo feature) the arena keeps a shadow table of live
//! allocations. `free` then rejects handles it never handed out,
//! [`Arena::verify`] proves that free and live blocks tile the buffer
//! exactly, and anomalies are logged through `tracing`.
//!
//! # Example
//! ```
//! use colla::{Arena, ArenaError};
//!
//! let mut heap = [0u8; 64];
//! let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();
//!
//! let p = arena.alloc(10).unwrap();
//! assert_eq!(arena.free_blocks().next().unwrap().offset, 11);
//!
//! // Requests that no free block can satisfy fail without side effects.
//! assert!(matches!(arena.alloc(100), Err(ArenaError::OutOfMemory { .. })));
//!
//! arena.free(p).unwrap();
//! assert_eq!(arena.empty_blocks(), 1);
//! assert!(arena.verify());
//! ```

mod arena;
pub mod codec;
mod config;
mod error;
mod free_list;
mod shadow;
mod size;
mod stats;
mod verify;

pub use arena::{Arena, Payload};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use free_list::{FreeBlock, FreeBlocks, MIN_BLOCK_SIZE};
pub use shadow::AllocationRecord;
pub use size::ArenaSize;
pub use stats::AllocationStats;
