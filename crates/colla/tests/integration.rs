// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: randomized workloads against the public API.
//!
//! These tests drive an arena through long seeded sequences of
//! alloc/free/realloc calls and check, after every step, that free and
//! live blocks still tile the buffer, that the free list stays ordered and
//! coalesced, and that user data survives reallocation.

use colla::{Arena, ArenaConfig, ArenaError, FreeBlock, Payload, MIN_BLOCK_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ────────────────────────────────────────────────────

/// A live allocation and the byte pattern written into it.
struct Tracked {
    payload: Payload,
    fill: u8,
    len: usize,
}

fn fill(arena: &mut Arena<'_>, t: &Tracked) {
    arena.payload_mut(t.payload).unwrap()[..t.len].fill(t.fill);
}

fn assert_intact(arena: &Arena<'_>, t: &Tracked) {
    let bytes = &arena.payload(t.payload).unwrap()[..t.len];
    assert!(
        bytes.iter().all(|&b| b == t.fill),
        "allocation at {} lost its contents",
        t.payload.offset()
    );
}

/// Free list is strictly ascending with a gap between every pair.
fn assert_ordered(arena: &Arena<'_>) {
    let blocks: Vec<FreeBlock> = arena.free_blocks().collect();
    for pair in blocks.windows(2) {
        assert!(
            pair[0].end() < pair[1].offset,
            "free blocks {:?} and {:?} are out of order or adjacent",
            pair[0],
            pair[1]
        );
    }
}

/// Live bytes plus free bytes cover the whole heap.
fn assert_tiled(arena: &Arena<'_>) {
    let live: usize = arena.allocations().map(|r| r.size).sum();
    assert_eq!(live, arena.stats().allocated_bytes);
    assert_eq!(live + arena.free_bytes(), arena.heap_size());
}

fn run_workload(seed: u64, heap_size: usize, steps: usize, max_size: usize) {
    let mut heap = vec![0u8; heap_size];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut live: Vec<Tracked> = Vec::new();

    for step in 0..steps {
        match rng.gen_range(0..4) {
            0 | 3 => {
                let len = if step % 2 == 0 {
                    rng.gen_range(0..max_size)
                } else {
                    rng.gen_range(0..64)
                };
                match arena.alloc(len) {
                    Ok(payload) => {
                        assert!(arena.usable_size(payload).unwrap() >= len);
                        let t = Tracked {
                            payload,
                            fill: rng.gen(),
                            len,
                        };
                        fill(&mut arena, &t);
                        live.push(t);
                    }
                    Err(ArenaError::OutOfMemory { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            1 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let new_len = rng.gen_range(0..max_size);
                let old = &live[index];
                match arena.realloc(old.payload, new_len) {
                    Ok(payload) => {
                        let kept = old.len.min(new_len);
                        let bytes = &arena.payload(payload).unwrap()[..kept];
                        assert!(bytes.iter().all(|&b| b == old.fill));
                        let t = Tracked {
                            payload,
                            fill: old.fill,
                            len: new_len,
                        };
                        fill(&mut arena, &t);
                        live[index] = t;
                    }
                    Err(ArenaError::OutOfMemory { .. }) => assert_intact(&arena, old),
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            2 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let t = live.swap_remove(index);
                arena.free(t.payload).unwrap();
            }
            _ => {}
        }

        assert!(arena.check().is_ok(), "step {step}: {:?}", arena.check());
        assert_ordered(&arena);
        assert_tiled(&arena);
        assert_eq!(arena.stats().allocated_blocks, live.len());
    }

    for t in &live {
        assert_intact(&arena, t);
    }
    for t in live.drain(..) {
        arena.free(t.payload).unwrap();
    }

    assert!(arena.verify());
    assert_eq!(arena.stats().allocated_blocks, 0);
    assert_eq!(arena.stats().allocated_bytes, 0);
    assert_eq!(arena.empty_blocks(), 1);
    assert_eq!(arena.largest_free_block(), heap_size);
}

// ── Randomized workloads ───────────────────────────────────────

#[test]
fn test_small_arena_workload() {
    for seed in 0..8 {
        run_workload(seed, 4096, 400, 256);
    }
}

#[test]
fn test_large_arena_workload() {
    run_workload(42, 1024 * 1024, 1000, 32768);
}

#[test]
fn test_pressure_workload() {
    // Tight arena: most large requests hit OOM, exercising the failure paths.
    run_workload(7, 1024, 600, 512);
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_split_then_full_coalesce() {
    let mut heap = [0u8; 64];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    let p = arena.alloc(10).unwrap();
    let blocks: Vec<FreeBlock> = arena.free_blocks().collect();
    assert_eq!(blocks, vec![FreeBlock { offset: 11, size: 53 }]);

    arena.free(p).unwrap();
    let blocks: Vec<FreeBlock> = arena.free_blocks().collect();
    assert_eq!(blocks, vec![FreeBlock { offset: 0, size: 64 }]);
    assert_eq!(arena.empty_blocks(), 1);
}

#[test]
fn test_out_of_memory() {
    let mut heap = [0u8; 16];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    assert!(matches!(
        arena.alloc(20),
        Err(ArenaError::OutOfMemory { requested: 20, .. })
    ));
    assert_eq!(arena.stats().allocated_blocks, 0);
    assert!(arena.verify());
}

#[test]
fn test_invalid_free_outside_arena() {
    let mut heap = [0u8; 16];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    assert!(matches!(
        arena.free(Payload::new(16 + 32)),
        Err(ArenaError::InvalidFree { .. })
    ));
    assert!(arena.verify());
    assert_eq!(arena.empty_blocks(), 1);
}

#[test]
fn test_reuse_after_free() {
    let mut heap = vec![0u8; 1024];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    // A request no larger than a freed block lands on the same block.
    for (x, y) in [(100, 100), (100, 50), (300, 1), (16, 16)] {
        let p = arena.alloc(x).unwrap();
        let first = block_offset(&arena, p);
        arena.free(p).unwrap();

        let q = arena.alloc(y).unwrap();
        assert_eq!(block_offset(&arena, q), first, "alloc({x}) then alloc({y})");
        arena.free(q).unwrap();
    }
    assert!(arena.verify());
}

/// Offset of the block behind a live payload, from the shadow table.
fn block_offset(arena: &Arena<'_>, p: Payload) -> usize {
    arena
        .allocations()
        .find(|r| r.payload == p)
        .map(|r| r.offset)
        .expect("payload is live")
}

#[test]
fn test_interleaved_frees_coalesce() {
    let mut heap = vec![0u8; 512];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    let blocks: Vec<Payload> = (0..8).map(|_| arena.alloc(20).unwrap()).collect();

    // Free every other block: fragmentation grows.
    for p in blocks.iter().step_by(2) {
        arena.free(*p).unwrap();
    }
    assert_eq!(arena.empty_blocks(), 5);
    assert_ordered(&arena);

    // Free the rest: everything merges back.
    for p in blocks.iter().skip(1).step_by(2) {
        arena.free(*p).unwrap();
    }
    assert_eq!(arena.empty_blocks(), 1);
    assert!(arena.verify());
}

#[test]
fn test_header_widths_across_boundaries() {
    let mut heap = vec![0u8; 64 * 1024];
    let mut arena = Arena::with_diagnostics(&mut heap, true).unwrap();

    for size in [0, 1, 126, 127, 128, 129, 16383, 16384] {
        let p = arena.alloc(size).unwrap();
        let record = arena.allocations().find(|r| r.payload == p).unwrap();
        let header = p.offset() - record.offset;
        let expected = colla::codec::header_size_for(size).unwrap();
        assert_eq!(header, expected, "size {size}");
        assert_eq!(arena.usable_size(p).unwrap(), record.size - header);
        assert!(record.size >= MIN_BLOCK_SIZE);
    }
    assert!(arena.verify());
}

#[test]
fn test_without_diagnostics() {
    let mut heap = vec![0u8; 256];
    let mut arena = Arena::with_diagnostics(&mut heap, false).unwrap();

    let a = arena.alloc(30).unwrap();
    let b = arena.alloc(30).unwrap();
    arena.free(a).unwrap();
    arena.free(b).unwrap();

    assert_eq!(arena.allocations().count(), 0);
    assert_eq!(arena.empty_blocks(), 1);
    assert!(arena.verify());
}

#[test]
fn test_from_config() {
    let config = ArenaConfig::from_toml("heap_size = \"4K\"\ndiagnostics = true").unwrap();
    let mut heap = vec![0u8; config.parse_heap_size().unwrap().as_bytes()];
    let arena = Arena::from_config(&mut heap, &config).unwrap();
    assert!(arena.diagnostics());
    assert_eq!(arena.heap_size(), 4096);
}
