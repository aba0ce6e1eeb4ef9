//! Relocation rule files.
//!
//! This module handles:
//! - TOML rule file parsing
//! - Validation of relocation entries
//! - `FROM=TO` command-line mappings

pub mod parser;
pub mod types;

pub use parser::{parse_config_file, parse_config_str, parse_mapping};
pub use types::{RelocationConfig, RelocationEntry};
