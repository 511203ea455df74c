// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! heap_size = "8M"
//! diagnostics = true
//! ```

use crate::{ArenaError, ArenaSize};
use std::path::Path;

/// Configuration for an arena.
///
/// The arena never allocates its own buffer; `heap_size` tells a host
/// (such as the `colla` CLI) how large a buffer to hand over.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaConfig {
    /// Arena size (human-readable, e.g. `"64K"`, `"8M"`).
    #[serde(default = "default_heap_size")]
    pub heap_size: String,
    /// Track every live allocation and run full consistency checks.
    #[serde(default = "default_diagnostics")]
    pub diagnostics: bool,
}

fn default_heap_size() -> String {
    "8M".to_string()
}

/// Diagnostics default to on when the crate is built with the
/// `diagnostics` feature.
pub(crate) fn default_diagnostics() -> bool {
    cfg!(feature = "diagnostics")
}

impl ArenaConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ArenaError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArenaError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ArenaError> {
        toml::from_str(toml_str).map_err(|e| ArenaError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ArenaError> {
        toml::to_string_pretty(self)
            .map_err(|e| ArenaError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the heap size string into an [`ArenaSize`].
    pub fn parse_heap_size(&self) -> Result<ArenaSize, ArenaError> {
        ArenaSize::parse(&self.heap_size)
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            heap_size: default_heap_size(),
            diagnostics: default_diagnostics(),
        }
    }
}
