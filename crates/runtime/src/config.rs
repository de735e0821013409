// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! allocator = "arena"
//! arena_capacity = "4M"
//! track_allocations = false
//! use_canary = false
//! validate_each_run = true
//! ```

use crate::RuntimeError;
use std::fmt;
use std::path::Path;

/// A byte capacity with human-readable string parsing.
///
/// # Parsing
/// Supports SI-style suffixes, case-insensitive:
/// - `"4M"` or `"4MB"` → 4 × 1024² bytes
/// - `"1G"` or `"1GB"` → 1 × 1024³ bytes
/// - `"512K"`, `"512KB"` → 512 × 1024 bytes
/// - `"65536"` → raw byte count
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Capacity {
    bytes: usize,
}

impl Capacity {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * 1024 }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self {
            bytes: mb * 1024 * 1024,
        }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable capacity string.
    ///
    /// The suffix is an optional unit letter (`G`, `M`, `K`) with an
    /// optional trailing `B`, so `"4M"`, `"4MB"`, and `"4mb"` are
    /// equivalent. Without a suffix the number is a raw byte count.
    pub fn parse(s: &str) -> Result<Self, RuntimeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RuntimeError::Config("empty capacity string".to_string()));
        }

        let upper = trimmed.to_uppercase();
        let without_b = upper.strip_suffix('B').unwrap_or(&upper);
        let (digits, multiplier) = UNITS
            .iter()
            .find_map(|&(letter, mult)| {
                without_b.strip_suffix(letter).map(|rest| (rest, mult))
            })
            .unwrap_or((without_b, 1));

        let value: usize = digits.trim().parse().map_err(|_| {
            RuntimeError::Config(format!(
                "invalid capacity '{s}': expected a number with an optional K/M/G suffix"
            ))
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| RuntimeError::Config(format!("capacity overflow: '{s}'")))?;
        if bytes == 0 {
            return Err(RuntimeError::Config(format!("capacity '{s}' is zero")));
        }

        Ok(Self { bytes })
    }
}

/// Unit letters and their byte multipliers, largest first. Parsing and
/// display both walk this table.
const UNITS: [(&str, usize); 3] = [
    ("G", 1024 * 1024 * 1024),
    ("M", 1024 * 1024),
    ("K", 1024),
];

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &(letter, mult) in &UNITS {
            if self.bytes >= mult && self.bytes % mult == 0 {
                return write!(f, "{} {letter}B", self.bytes / mult);
            }
        }
        write!(f, "{} B", self.bytes)
    }
}

/// Configuration for a runtime [`crate::Session`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Allocator backend: `"system"` or `"arena"`.
    #[serde(default = "default_allocator")]
    pub allocator: String,
    /// Arena capacity (ignored by the system backend).
    #[serde(default = "default_arena_capacity")]
    pub arena_capacity: String,
    /// Maintain allocator statistics. Leave off outside debugging.
    #[serde(default)]
    pub track_allocations: bool,
    /// Surround scratch buffers with canary guards.
    #[serde(default)]
    pub use_canary: bool,
    /// Re-validate the graph before every run.
    #[serde(default = "default_true")]
    pub validate_each_run: bool,
}

fn default_allocator() -> String {
    "system".to_string()
}

fn default_arena_capacity() -> String {
    "1M".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allocator: default_allocator(),
            arena_capacity: default_arena_capacity(),
            track_allocations: false,
            use_canary: false,
            validate_each_run: true,
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the arena capacity string.
    pub fn parse_arena_capacity(&self) -> Result<Capacity, RuntimeError> {
        Capacity::parse(&self.arena_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_parse() {
        assert_eq!(Capacity::parse("512K").unwrap().as_bytes(), 512 * 1024);
        assert_eq!(Capacity::parse("4M").unwrap().as_bytes(), 4 * 1024 * 1024);
        assert_eq!(Capacity::parse("4mb").unwrap().as_bytes(), 4 * 1024 * 1024);
        assert_eq!(
            Capacity::parse("1G").unwrap().as_bytes(),
            1024 * 1024 * 1024
        );
        assert_eq!(Capacity::parse("65536").unwrap().as_bytes(), 65536);
        assert_eq!(Capacity::parse(" 2M ").unwrap().as_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_capacity_parse_invalid() {
        assert!(Capacity::parse("").is_err());
        assert!(Capacity::parse("abc").is_err());
        assert!(Capacity::parse("0M").is_err());
    }

    #[test]
    fn test_capacity_display() {
        assert_eq!(format!("{}", Capacity::from_mb(4)), "4 MB");
        assert_eq!(format!("{}", Capacity::from_kb(512)), "512 KB");
        assert_eq!(format!("{}", Capacity::from_bytes(100)), "100 B");
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.allocator, "system");
        assert!(!config.track_allocations);
        assert!(config.validate_each_run);
        assert_eq!(
            config.parse_arena_capacity().unwrap().as_bytes(),
            1024 * 1024
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = RuntimeConfig {
            allocator: "arena".to_string(),
            arena_capacity: "4M".to_string(),
            track_allocations: true,
            use_canary: true,
            validate_each_run: false,
        };
        let toml_str = config.to_toml().unwrap();
        let back = RuntimeConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back.allocator, "arena");
        assert_eq!(back.arena_capacity, "4M");
        assert!(back.track_allocations);
        assert!(back.use_canary);
        assert!(!back.validate_each_run);
    }

    #[test]
    fn test_toml_defaults_fill_in() {
        let config = RuntimeConfig::from_toml("allocator = \"arena\"").unwrap();
        assert_eq!(config.allocator, "arena");
        assert_eq!(config.arena_capacity, "1M");
        assert!(config.validate_each_run);
    }

    #[test]
    fn test_toml_invalid() {
        assert!(RuntimeConfig::from_toml("allocator = 3").is_err());
    }
}
