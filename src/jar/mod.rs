//! Archive rewriting.
//!
//! This module handles:
//! - Reading input archives entry by entry
//! - Rewriting class files and relocating resource paths
//! - Merging `META-INF/services` provider files across inputs
//! - Writing the output archive with synthesized directory entries

mod relocator;
pub mod services;
mod task;

pub use relocator::JarRelocator;
pub use services::{SERVICES_PATH, ServiceFile, ServiceRegistryMerger};
pub use task::RelocationSummary;
