//! Class file rewriting.
//!
//! This module handles:
//! - Constant pool parsing and re-serialization
//! - Descriptor and generic signature remapping
//! - Walking fields, methods and attributes to find every name reference

pub mod descriptor;
mod reader;
pub mod rewrite;

pub use descriptor::{map_descriptor, map_signature, map_type};
pub use rewrite::{rewrite_class, utf8_constants};

/// Name translation used while rewriting a class file.
pub trait ClassRemapper {
	/// Map an internal name such as `com/foo/Bar`.
	fn map(&self, internal_name: &str) -> String;

	/// Map a string literal.
	fn map_value(&self, value: &str) -> String {
		value.to_string()
	}

	/// Map the bare file name held by the `SourceFile` attribute.
	fn map_source_file(&self, source_file: &str) -> String {
		source_file.to_string()
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ClassFormatError {
	#[error("unexpected end of class file")]
	UnexpectedEof,
	#[error("invalid class file magic header")]
	InvalidMagic,
	#[error("unsupported constant pool tag {tag}")]
	UnsupportedConstant { tag: u8 },
	#[error("invalid constant pool index {index}")]
	InvalidConstantIndex { index: u16 },
	#[error("malformed descriptor: {0}")]
	InvalidDescriptor(String),
	#[error("malformed signature: {0}")]
	InvalidSignature(String),
	#[error("invalid annotation element tag {tag:#04x}")]
	InvalidElementTag { tag: u8 },
	#[error("invalid type annotation target {target_type:#04x}")]
	InvalidTypeAnnotationTarget { target_type: u8 },
	#[error("constant pool holds more than 65535 entries")]
	ConstantPoolOverflow,
	#[error("UTF-8 constant of {length} bytes exceeds 65535")]
	Utf8TooLong { length: usize },
}
