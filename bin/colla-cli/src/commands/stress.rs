// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `colla stress` command: randomized allocator workload.
//!
//! Each round picks one of four actions at random:
//! ```text
//! 0 → alloc  (size < max_size)
//! 1 → realloc a random live block (size < max_size)
//! 2 → free a random live block
//! 3 → alloc  (size < 64)
//! ```
//! The arena runs with diagnostics on and is verified before every round.
//! Every block is stamped with a fill byte, which must survive any move.
//! At the end all survivors are freed and the arena must collapse back into
//! a single free block.

use anyhow::{bail, Context};
use colla::{AllocationStats, Arena, ArenaConfig, ArenaError, Payload};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Size bound for the small-allocation action.
const SMALL_ALLOC_LIMIT: usize = 64;

/// Outcome of a stress run.
#[derive(Debug, Clone)]
pub struct StressReport {
    pub rounds: usize,
    pub peak_live_blocks: usize,
    /// Free blocks after every survivor has been released.
    pub empty_blocks: usize,
    pub stats: AllocationStats,
}

struct Live {
    payload: Payload,
    len: usize,
    stamp: u8,
}

pub fn execute(
    config: Option<ArenaConfig>,
    heap_size: String,
    iterations: usize,
    max_size: usize,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              colla · Stress Driver                  ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let size = super::resolve_heap_size(config.as_ref(), &heap_size)?;
    let seed = seed.unwrap_or_else(rand::random);

    println!("  Heap:       {size}");
    println!("  Iterations: {iterations}");
    println!("  Max size:   {max_size}");
    println!("  Seed:       {seed}");
    println!();

    let mut heap = vec![0u8; size.as_bytes()];
    let report = run(&mut heap, iterations, max_size, seed)?;

    println!("  Rounds:       {}", report.rounds);
    println!("  Peak live:    {} blocks", report.peak_live_blocks);
    println!("  Empty blocks: {}", report.empty_blocks);
    println!();
    println!("{}", report.stats.summary());

    Ok(())
}

/// Runs the workload over `heap` and returns what happened.
///
/// Fails on the first inconsistency: a verifier error, a lost fill byte,
/// an unexpected allocator error, or an arena that does not collapse back
/// into one block once everything is freed.
pub fn run(
    heap: &mut [u8],
    iterations: usize,
    max_size: usize,
    seed: u64,
) -> anyhow::Result<StressReport> {
    anyhow::ensure!(max_size > 0, "--max-size must be positive");

    let heap_size = heap.len();
    let mut arena = Arena::with_diagnostics(heap, true)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut live: Vec<Live> = Vec::new();
    let mut peak_live_blocks = 0;

    for round in 0..iterations {
        arena
            .check()
            .with_context(|| format!("verification failed before round {round}"))?;

        match rng.gen_range(0..4) {
            0 => allocate(&mut arena, &mut live, rng.gen_range(0..max_size), rng.gen())?,
            3 => allocate(&mut arena, &mut live, rng.gen_range(0..SMALL_ALLOC_LIMIT), rng.gen())?,
            1 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                reallocate(&mut arena, &mut live[index], rng.gen_range(0..max_size))?;
            }
            2 if !live.is_empty() => {
                let block = live.swap_remove(rng.gen_range(0..live.len()));
                ensure_stamped(&arena, &block)?;
                arena.free(block.payload)?;
            }
            _ => tracing::trace!("round {round}: no live block to act on"),
        }
        peak_live_blocks = peak_live_blocks.max(live.len());
    }

    arena.check().context("verification failed after the last round")?;

    for block in live.drain(..) {
        ensure_stamped(&arena, &block)?;
        arena.free(block.payload)?;
    }
    arena.check().context("verification failed after freeing survivors")?;

    let empty_blocks = arena.empty_blocks();
    if empty_blocks != 1 || arena.largest_free_block() != heap_size {
        bail!("arena did not coalesce back into one block: {empty_blocks} free blocks remain");
    }

    tracing::info!("stress run passed: {iterations} rounds, seed {seed}");
    Ok(StressReport {
        rounds: iterations,
        peak_live_blocks,
        empty_blocks,
        stats: arena.stats().clone(),
    })
}

fn allocate(arena: &mut Arena<'_>, live: &mut Vec<Live>, len: usize, stamp: u8) -> anyhow::Result<()> {
    match arena.alloc(len) {
        Ok(payload) => {
            arena.payload_mut(payload)?[..len].fill(stamp);
            live.push(Live {
                payload,
                len,
                stamp,
            });
            Ok(())
        }
        Err(ArenaError::OutOfMemory { .. }) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn reallocate(arena: &mut Arena<'_>, block: &mut Live, new_len: usize) -> anyhow::Result<()> {
    ensure_stamped(arena, block)?;
    match arena.realloc(block.payload, new_len) {
        Ok(payload) => {
            let kept = block.len.min(new_len);
            block.payload = payload;
            block.len = kept;
            ensure_stamped(arena, block)?;

            arena.payload_mut(payload)?[..new_len].fill(block.stamp);
            block.len = new_len;
            Ok(())
        }
        Err(ArenaError::OutOfMemory { .. }) => ensure_stamped(arena, block),
        Err(err) => Err(err.into()),
    }
}

fn ensure_stamped(arena: &Arena<'_>, block: &Live) -> anyhow::Result<()> {
    let bytes = &arena.payload(block.payload)?[..block.len];
    if let Some(i) = bytes.iter().position(|&b| b != block.stamp) {
        bail!(
            "block at {} was corrupted: byte {i} is {:#04x}, expected {:#04x}",
            block.payload.offset(),
            bytes[i],
            block.stamp
        );
    }
    Ok(())
}
