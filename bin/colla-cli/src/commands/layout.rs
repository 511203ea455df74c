// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `colla layout` command: show how a sequence of calls carves up an arena.
//!
//! Allocates each size in order, frees the requested indices, then prints
//! the live blocks, the free list and a one-line map of the heap where `#`
//! is allocated and `.` is free.

use anyhow::Context;
use colla::{Arena, ArenaConfig, ArenaError, Payload};

/// Width of the heap map, in characters.
const MAP_WIDTH: usize = 64;

pub fn execute(
    config: Option<ArenaConfig>,
    heap_size: String,
    sizes: String,
    free: Option<String>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              colla · Arena Layout                   ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let size = super::resolve_heap_size(config.as_ref(), &heap_size)?;
    let diagnostics = config.as_ref().map_or(true, |c| c.diagnostics);
    let sizes = parse_list(&sizes).context("invalid --sizes")?;
    let to_free = match free {
        Some(list) => parse_list(&list).context("invalid --free")?,
        None => Vec::new(),
    };

    let mut heap = vec![0u8; size.as_bytes()];
    let mut arena = Arena::with_diagnostics(&mut heap, diagnostics)?;

    // ── Allocate ───────────────────────────────────────────────
    println!("  Allocations ({size} arena)");
    let mut handles: Vec<Option<Payload>> = Vec::with_capacity(sizes.len());
    for (index, &request) in sizes.iter().enumerate() {
        match arena.alloc(request) {
            Ok(p) => {
                println!(
                    "   [{index}] alloc({request:>6}) → payload {:>8}, usable {}",
                    p.offset(),
                    arena.usable_size(p)?
                );
                handles.push(Some(p));
            }
            Err(err @ ArenaError::OutOfMemory { .. }) => {
                println!("   [{index}] alloc({request:>6}) → {err}");
                handles.push(None);
            }
            Err(err) => return Err(err.into()),
        }
    }
    println!();

    // ── Free ───────────────────────────────────────────────────
    if !to_free.is_empty() {
        println!("  Frees");
        for index in to_free {
            match handles.get_mut(index).and_then(Option::take) {
                Some(p) => {
                    arena.free(p)?;
                    println!("   [{index}] freed payload {}", p.offset());
                }
                None => println!("   [{index}] skipped: no live allocation at this index"),
            }
        }
        println!();
    }

    // ── Free List ──────────────────────────────────────────────
    println!("  Free list");
    for block in arena.free_blocks() {
        println!(
            "   [{:>8}, {:>8})  {} bytes",
            block.offset,
            block.end(),
            block.size
        );
    }
    println!();
    println!("   Map: {}", heap_map(&arena, MAP_WIDTH));
    println!("   Fragmentation: {} free blocks", arena.fragmentation_count());
    println!("   Largest free:  {} bytes", arena.largest_free_block());
    if arena.diagnostics() {
        println!("   Verified:      {}", arena.verify());
    }
    println!();
    println!("{}", arena.stats().summary());

    Ok(())
}

/// Parses a comma-separated list of non-negative integers.
fn parse_list(list: &str) -> anyhow::Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| anyhow::anyhow!("'{s}' is not a size: {e}"))
        })
        .collect()
}

/// Renders the heap as `width` cells: `.` if the cell is entirely free,
/// `#` otherwise.
fn heap_map(arena: &Arena<'_>, width: usize) -> String {
    let heap_size = arena.heap_size();
    let width = width.min(heap_size).max(1);
    let mut free = vec![0usize; width];

    for block in arena.free_blocks() {
        for (cell, bytes) in free.iter_mut().enumerate() {
            let start = cell * heap_size / width;
            let end = (cell + 1) * heap_size / width;
            let lo = start.max(block.offset);
            let hi = end.min(block.end());
            if lo < hi {
                *bytes += hi - lo;
            }
        }
    }

    free.iter()
        .enumerate()
        .map(|(cell, &bytes)| {
            let cell_size = (cell + 1) * heap_size / width - cell * heap_size / width;
            if bytes == cell_size {
                '.'
            } else {
                '#'
            }
        })
        .collect()
}
