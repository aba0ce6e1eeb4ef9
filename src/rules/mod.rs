//! Relocation rules and name remapping.
//!
//! This module handles:
//! - ANT-style include/exclude glob matching
//! - Single prefix-to-prefix relocation rules
//! - Ordered, first-match-wins remapping of paths and class constants

pub mod matcher;
pub mod relocation;
pub mod rewriter;

pub use matcher::{GlobPattern, matches};
pub use relocation::Relocation;
pub use rewriter::Remapper;
