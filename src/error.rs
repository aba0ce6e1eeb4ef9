use std::path::PathBuf;

use crate::classfile::ClassFormatError;

/// Library-level structured errors for the relocator.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum RelocatorError {
	#[error("Relocation has already been run on this instance")]
	AlreadyRun,

	#[error("Invalid relocation pattern: {pattern:?} ({reason})")]
	InvalidPattern { pattern: String, reason: String },

	#[error("Invalid include/exclude pattern: {pattern}")]
	InvalidGlob {
		pattern: String,
		#[source]
		source: regex::Error,
	},

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to read archive: {path}")]
	ArchiveRead {
		path: PathBuf,
		#[source]
		source: zip::result::ZipError,
	},

	#[error("Failed to write archive: {path}")]
	ArchiveWrite {
		path: PathBuf,
		#[source]
		source: zip::result::ZipError,
	},

	#[error("I/O error on archive entry: {entry}")]
	EntryIo {
		entry: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Error processing class {entry}")]
	MalformedClass {
		entry: String,
		#[source]
		source: ClassFormatError,
	},
}

/// Result type alias using RelocatorError.
pub type Result<T> = std::result::Result<T, RelocatorError>;
