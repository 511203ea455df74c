// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared helpers.

pub mod layout;
pub mod stress;

use colla::{ArenaConfig, ArenaSize};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves the arena size: the config file wins over the flag.
pub fn resolve_heap_size(config: Option<&ArenaConfig>, flag: &str) -> anyhow::Result<ArenaSize> {
    let size = match config {
        Some(config) => config.parse_heap_size(),
        None => ArenaSize::parse(flag),
    };
    size.map_err(|e| anyhow::anyhow!("invalid heap size: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_heap_size_from_flag() {
        assert_eq!(resolve_heap_size(None, "64K").unwrap().as_bytes(), 65536);
    }

    #[test]
    fn test_resolve_heap_size_prefers_config() {
        let config = ArenaConfig::from_toml("heap_size = \"1K\"").unwrap();
        let size = resolve_heap_size(Some(&config), "8M").unwrap();
        assert_eq!(size.as_bytes(), 1024);
    }

    #[test]
    fn test_resolve_heap_size_rejects_garbage() {
        assert!(resolve_heap_size(None, "lots").is_err());
    }
}
