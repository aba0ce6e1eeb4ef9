//! jar-relocator - move Java packages into a private namespace inside a jar.
//!
//! This library provides the core functionality for jar-relocator, including:
//! - Relocation rules with include/exclude filtering
//! - Remapping of internal names, descriptors, resource paths and string constants
//! - Class file rewriting with a rebuilt constant pool
//! - Archive rewriting with directory synthesis and service file merging
//!
//! # Example
//!
//! ```no_run
//! use jar_relocator::{JarRelocator, Relocation};
//!
//! let rules = vec![
//!     Relocation::with_filters(
//!         "com.google.common",
//!         "shaded.guava",
//!         &[] as &[&str],
//!         &["com.google.common.base.internal.**"],
//!     )?,
//! ];
//!
//! let summary = JarRelocator::with_relocations("app.jar", "app-shaded.jar", rules)
//!     .merge_input("guava.jar")
//!     .run()?;
//! println!("relocated {} classes", summary.classes);
//! # Ok::<(), jar_relocator::RelocatorError>(())
//! ```

pub mod classfile;
pub mod config;
pub mod error;
pub mod jar;
pub mod rules;

pub use error::{RelocatorError, Result};
pub use jar::{JarRelocator, RelocationSummary};
pub use rules::{Relocation, Remapper};
