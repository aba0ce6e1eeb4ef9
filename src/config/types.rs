use serde::Deserialize;

use crate::error::{RelocatorError, Result};
use crate::rules::{Relocation, Remapper};

/// Top-level configuration from a relocation rules file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RelocationConfig {
	/// Relocations in priority order. First matching relocation wins.
	#[serde(default)]
	pub relocations: Vec<RelocationEntry>,
}

/// One `[[relocations]]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RelocationEntry {
	/// Dotted package or class prefix to move, e.g. `com.google.common`.
	pub pattern: String,

	/// Dotted prefix replacing `pattern`, e.g. `shaded.guava`.
	pub relocated_pattern: String,

	/// If non-empty, only names matching one of these globs are relocated.
	#[serde(default)]
	pub includes: Vec<String>,

	/// Names matching any of these globs are never relocated.
	#[serde(default)]
	pub excludes: Vec<String>,
}

impl RelocationEntry {
	/// Validate that both patterns are present.
	pub fn validate(&self) -> Result<()> {
		for (field, value) in [
			("pattern", &self.pattern),
			("relocated-pattern", &self.relocated_pattern),
		] {
			if value.trim().is_empty() {
				return Err(RelocatorError::InvalidPattern {
					pattern: value.clone(),
					reason: format!("`{field}` must not be empty"),
				});
			}
		}
		Ok(())
	}

	/// Compile this entry into a relocation rule.
	pub fn to_relocation(&self) -> Result<Relocation> {
		Relocation::with_filters(
			&self.pattern,
			&self.relocated_pattern,
			&self.includes,
			&self.excludes,
		)
	}
}

impl RelocationConfig {
	/// Validate all relocations in this config.
	pub fn validate(&self) -> Result<()> {
		for entry in &self.relocations {
			entry.validate()?;
		}
		Ok(())
	}

	/// Compile every relocation, preserving order.
	pub fn to_relocations(&self) -> Result<Vec<Relocation>> {
		self.relocations
			.iter()
			.map(RelocationEntry::to_relocation)
			.collect()
	}

	/// Build a remapper applying this config's relocations.
	pub fn to_remapper(&self) -> Result<Remapper> {
		Ok(Remapper::new(self.to_relocations()?))
	}
}
