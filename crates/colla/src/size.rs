// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena size parsing.
//!
//! An [`ArenaSize`] is the byte length of the buffer handed to an arena.
//! It parses human-readable strings so configuration files and the CLI
//! can say `"64K"` instead of `65536`.

use crate::ArenaError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;
const GIB: usize = 1024 * 1024 * 1024;

/// Byte length of an arena buffer.
///
/// # Parsing
/// Supports binary suffixes, case-insensitive, with an optional `B`:
/// - `"64K"` or `"64KB"` → 64 × 1024 bytes
/// - `"8M"` or `"8MB"` → 8 × 1024² bytes
/// - `"1G"` or `"1GB"` → 1 × 1024³ bytes
/// - `"4096"` or `"4096B"` → raw byte count
///
/// # Examples
/// ```
/// use colla::ArenaSize;
///
/// let s = ArenaSize::parse("64K").unwrap();
/// assert_eq!(s.as_bytes(), 65536);
/// assert_eq!(s.to_string(), "64 KB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaSize {
    bytes: usize,
}

impl ArenaSize {
    /// Creates a size from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a size from kilobytes.
    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    /// Creates a size from megabytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    /// Returns the size in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable size string.
    pub fn parse(s: &str) -> Result<Self, ArenaError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ArenaError::Config("empty arena size".into()));
        }

        let upper = s.to_uppercase();
        let digits = upper.strip_suffix('B').unwrap_or(&upper);
        let (num_str, multiplier) = if let Some(n) = digits.strip_suffix('G') {
            (n, GIB)
        } else if let Some(n) = digits.strip_suffix('M') {
            (n, MIB)
        } else if let Some(n) = digits.strip_suffix('K') {
            (n, KIB)
        } else {
            (digits, 1)
        };

        let value: usize = num_str.trim().parse().map_err(|_| {
            ArenaError::Config(format!(
                "invalid arena size '{s}': expected a number followed by an optional K, M or G suffix"
            ))
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| ArenaError::Config(format!("arena size overflow: '{s}'")))?;

        if bytes == 0 {
            return Err(ArenaError::Config(format!("arena size '{s}' is zero")));
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for ArenaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GIB && self.bytes % GIB == 0 {
            write!(f, "{} GB", self.bytes / GIB)
        } else if self.bytes >= MIB && self.bytes % MIB == 0 {
            write!(f, "{} MB", self.bytes / MIB)
        } else if self.bytes >= KIB && self.bytes % KIB == 0 {
            write!(f, "{} KB", self.bytes / KIB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}

impl std::str::FromStr for ArenaSize {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
