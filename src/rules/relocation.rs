use crate::error::{RelocatorError, Result};
use crate::rules::matcher::GlobPattern;

const CLASS_SUFFIX: &str = ".class";

/// A single relocation rule: `pattern` is moved to `relocated_pattern`.
///
/// Both patterns are kept in dotted (class name) and slashed (path) form,
/// computed once at construction.
///
/// Matching is a plain string prefix test, so a rule for `com.foo` also
/// applies to `com.foobar`. Write `com.foo.` to restrict a rule to the
/// package itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
	pattern: String,
	relocated_pattern: String,
	path_pattern: String,
	relocated_path_pattern: String,
	rooted_path_pattern: String,
	includes: Vec<GlobPattern>,
	excludes: Vec<GlobPattern>,
}

impl Relocation {
	/// Create a relocation with no include or exclude filters.
	pub fn new(pattern: &str, relocated_pattern: &str) -> Result<Self> {
		Self::with_filters(pattern, relocated_pattern, &[] as &[&str], &[] as &[&str])
	}

	/// Create a relocation restricted by include and exclude globs.
	///
	/// Globs may be written in dotted or slashed form. A glob ending in `.*`
	/// or `/*` also covers the package path itself.
	pub fn with_filters<I, E>(
		pattern: &str,
		relocated_pattern: &str,
		includes: &[I],
		excludes: &[E],
	) -> Result<Self>
	where
		I: AsRef<str>,
		E: AsRef<str>,
	{
		validate_pattern(pattern)?;
		validate_pattern(relocated_pattern)?;

		let path_pattern = pattern.replace('.', "/");

		Ok(Relocation {
			pattern: pattern.replace('/', "."),
			relocated_pattern: relocated_pattern.replace('/', "."),
			rooted_path_pattern: format!("/{path_pattern}"),
			path_pattern,
			relocated_path_pattern: relocated_pattern.replace('.', "/"),
			includes: normalize_globs(includes)?,
			excludes: normalize_globs(excludes)?,
		})
	}

	/// The dotted source pattern.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// The dotted target pattern.
	pub fn relocated_pattern(&self) -> &str {
		&self.relocated_pattern
	}

	/// The slashed source pattern.
	pub fn path_pattern(&self) -> &str {
		&self.path_pattern
	}

	/// The slashed target pattern.
	pub fn relocated_path_pattern(&self) -> &str {
		&self.relocated_path_pattern
	}

	/// Normalized include globs.
	pub fn includes(&self) -> impl Iterator<Item = &str> {
		self.includes.iter().map(|g| g.glob.as_str())
	}

	/// Normalized exclude globs.
	pub fn excludes(&self) -> impl Iterator<Item = &str> {
		self.excludes.iter().map(|g| g.glob.as_str())
	}

	fn is_included(&self, path: &str) -> bool {
		self.includes.is_empty() || self.includes.iter().any(|g| g.matches(path))
	}

	fn is_excluded(&self, path: &str) -> bool {
		self.excludes.iter().any(|g| g.matches(path))
	}

	/// Check whether a slashed path (optionally ending in `.class`) is covered by this rule.
	pub fn can_relocate_path(&self, path: &str) -> bool {
		let path = path.strip_suffix(CLASS_SUFFIX).unwrap_or(path);

		if !self.is_included(path) || self.is_excluded(path) {
			return false;
		}

		// Resource lookups such as getResource("/a/b/c.properties") leave a leading separator.
		path.starts_with(&self.path_pattern) || path.starts_with(&self.rooted_path_pattern)
	}

	/// Check whether a dotted class name is covered by this rule.
	pub fn can_relocate_class(&self, class: &str) -> bool {
		!class.contains('/') && self.can_relocate_path(&class.replace('.', "/"))
	}

	/// Replace the first occurrence of the slashed source pattern.
	pub fn relocate_path(&self, path: &str) -> String {
		path.replacen(&self.path_pattern, &self.relocated_path_pattern, 1)
	}

	/// Replace the first occurrence of the dotted source pattern.
	pub fn relocate_class(&self, class: &str) -> String {
		class.replacen(&self.pattern, &self.relocated_pattern, 1)
	}
}

fn validate_pattern(pattern: &str) -> Result<()> {
	let reason = if pattern.is_empty() {
		"pattern is empty"
	} else if pattern.chars().any(char::is_whitespace) {
		"pattern contains whitespace"
	} else if pattern.contains(['*', '?']) {
		"pattern contains a wildcard; use includes/excludes instead"
	} else {
		return Ok(());
	};

	Err(RelocatorError::InvalidPattern {
		pattern: pattern.to_string(),
		reason: reason.to_string(),
	})
}

/// Convert globs to slashed form, adding the package path for `/*` globs.
///
/// The globs as written are kept too, so resource globs containing dots
/// (`META-INF/foo.properties`) still match.
fn normalize_globs<S: AsRef<str>>(globs: &[S]) -> Result<Vec<GlobPattern>> {
	let mut normalized: Vec<String> = Vec::new();
	let mut push = |glob: String| {
		if !normalized.contains(&glob) {
			normalized.push(glob);
		}
	};

	for glob in globs {
		let glob = glob.as_ref();
		let path_glob = glob.replace('.', "/");
		let package_glob = path_glob.strip_suffix("/*").map(str::to_string);

		push(path_glob);
		if let Some(package_glob) = package_glob {
			push(package_glob);
		}
		push(glob.to_string());
	}

	normalized.iter().map(|g| GlobPattern::compile(g)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_patterns_are_converted_once() {
		let rule = Relocation::new("com.google.common", "shaded/guava").unwrap();
		assert_eq!(rule.pattern(), "com.google.common");
		assert_eq!(rule.relocated_pattern(), "shaded.guava");
		assert_eq!(rule.path_pattern(), "com/google/common");
		assert_eq!(rule.relocated_path_pattern(), "shaded/guava");
	}

	#[test]
	fn test_can_relocate_path() {
		let rule = Relocation::new("com.google", "shaded.google").unwrap();
		assert!(rule.can_relocate_path("com/google/Foo"));
		assert!(rule.can_relocate_path("com/google/Foo.class"));
		assert!(rule.can_relocate_path("/com/google/foo.properties"));
		assert!(!rule.can_relocate_path("org/google/Foo"));
		assert!(!rule.can_relocate_path("com.google.Foo"));
	}

	#[test]
	fn test_prefix_match_ignores_segment_boundaries() {
		let rule = Relocation::new("com.foo", "shaded.foo").unwrap();
		assert!(rule.can_relocate_path("com/foobar/X"));
		assert_eq!(rule.relocate_path("com/foobar/X"), "shaded/foobar/X");

		let bounded = Relocation::new("com.foo.", "shaded.foo.").unwrap();
		assert!(!bounded.can_relocate_path("com/foobar/X"));
		assert!(bounded.can_relocate_path("com/foo/X"));
	}

	#[test]
	fn test_can_relocate_class() {
		let rule = Relocation::new("com.google", "shaded.google").unwrap();
		assert!(rule.can_relocate_class("com.google.Foo"));
		assert!(!rule.can_relocate_class("com/google/Foo"));
		assert!(!rule.can_relocate_class("org.google.Foo"));
	}

	#[test]
	fn test_relocate_replaces_first_occurrence_only() {
		let rule = Relocation::new("a.b", "x.y").unwrap();
		assert_eq!(rule.relocate_path("a/b/c/a/b/D"), "x/y/c/a/b/D");
		assert_eq!(rule.relocate_class("a.b.c.a.b.D"), "x.y.c.a.b.D");
	}

	#[test]
	fn test_relocate_class_treats_dots_literally() {
		let rule = Relocation::new("a.b", "x.y").unwrap();
		assert_eq!(rule.relocate_class("aXb.Foo"), "aXb.Foo");
	}

	#[test]
	fn test_excludes_win_over_prefix() {
		let rule = Relocation::with_filters(
			"com.google",
			"shaded.google",
			&[] as &[&str],
			&["com.google.internal.*"],
		)
		.unwrap();
		assert!(rule.can_relocate_path("com/google/Foo"));
		assert!(!rule.can_relocate_path("com/google/internal/Impl"));
		// The package path itself is excluded as a unit.
		assert!(!rule.can_relocate_path("com/google/internal"));
		// Deeper packages are not covered by a single `*`.
		assert!(rule.can_relocate_path("com/google/internal/deep/Impl"));
	}

	#[test]
	fn test_includes_restrict_matches() {
		let rule = Relocation::with_filters(
			"com.google",
			"shaded.google",
			&["com.google.common.**"],
			&[] as &[&str],
		)
		.unwrap();
		assert!(rule.can_relocate_path("com/google/common/collect/Lists"));
		assert!(!rule.can_relocate_path("com/google/gson/Gson"));
		assert!(rule.can_relocate_class("com.google.common.base.Strings"));
	}

	#[test]
	fn test_raw_globs_are_kept_for_resources() {
		let rule = Relocation::with_filters(
			"META-INF",
			"META-INF/shaded",
			&[] as &[&str],
			&["META-INF/foo.properties"],
		)
		.unwrap();
		let excludes: Vec<_> = rule.excludes().collect();
		assert_eq!(excludes, vec!["META-INF/foo/properties", "META-INF/foo.properties"]);
		assert!(!rule.can_relocate_path("META-INF/foo.properties"));
		assert!(rule.can_relocate_path("META-INF/bar.properties"));
	}

	#[test]
	fn test_invalid_patterns() {
		for bad in ["", "com google", "com.*", "com.fo?"] {
			match Relocation::new(bad, "shaded").unwrap_err() {
				RelocatorError::InvalidPattern { pattern, .. } => assert_eq!(pattern, bad),
				other => panic!("Expected InvalidPattern error, got {other:?}"),
			}
		}
		assert!(Relocation::new("com.foo", "").is_err());
	}
}
