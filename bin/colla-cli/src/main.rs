// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # colla
//!
//! Command-line driver for the colla arena allocator.
//!
//! ## Usage
//! ```bash
//! # Randomized alloc/realloc/free workload, verified at every step
//! colla stress --heap-size 8M --iterations 1000 --seed 42
//!
//! # Allocate a few blocks, free some, and show the resulting free list
//! colla layout --heap-size 1K --sizes 10,200,30,64 --free 1,3
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "colla",
    about = "Freestanding first-fit arena allocator: stress driver and layout inspector",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (overrides CLI arguments).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a seeded random workload and verify the arena after every step.
    Stress {
        /// Arena size (e.g., "64K", "8M").
        #[arg(short = 's', long, default_value = "8M")]
        heap_size: String,

        /// Number of random actions to perform.
        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,

        /// Upper bound (exclusive) for large allocation and realloc sizes.
        #[arg(long, default_value_t = 32768)]
        max_size: usize,

        /// RNG seed; a random one is chosen and printed when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Allocate a list of sizes, free some of them, and print the layout.
    Layout {
        /// Arena size (e.g., "1K", "64K").
        #[arg(short = 's', long, default_value = "1K")]
        heap_size: String,

        /// Comma-separated allocation sizes in bytes (e.g., "10,200,30").
        #[arg(long)]
        sizes: String,

        /// Comma-separated indices into `--sizes` to free afterwards.
        #[arg(long)]
        free: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = cli
        .config
        .as_deref()
        .map(colla::ArenaConfig::from_file)
        .transpose()?;

    match cli.command {
        Commands::Stress {
            heap_size,
            iterations,
            max_size,
            seed,
        } => commands::stress::execute(config, heap_size, iterations, max_size, seed),
        Commands::Layout {
            heap_size,
            sizes,
            free,
        } => commands::layout::execute(config, heap_size, sizes, free),
    }
}
