use crate::config::types::RelocationConfig;
use crate::error::{RelocatorError, Result};
use std::path::Path;

/// Parse a rules file from the given path.
pub fn parse_config_file(path: &Path) -> Result<RelocationConfig> {
	let content = std::fs::read_to_string(path).map_err(|source| RelocatorError::ConfigReadError {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse a rules file from a string (useful for testing).
pub fn parse_config_str(content: &str, path: &Path) -> Result<RelocationConfig> {
	let config: RelocationConfig =
		toml::from_str(content).map_err(|source| RelocatorError::ConfigParseError {
			path: path.to_path_buf(),
			source,
		})?;

	config.validate()?;

	Ok(config)
}

/// Parse a `FROM=TO` mapping as given on the command line.
pub fn parse_mapping(mapping: &str) -> std::result::Result<(String, String), String> {
	match mapping.split_once('=') {
		Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
			Ok((from.trim().to_string(), to.trim().to_string()))
		}
		_ => Err(format!("expected FROM=TO, got {mapping:?}")),
	}
}
