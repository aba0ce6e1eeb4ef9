use crate::error::{RelocatorError, Result};
use regex::Regex;

/// An ANT-style path glob compiled to an anchored regex.
///
/// - `*` matches any run of characters within one path segment
/// - `?` matches a single character within one path segment
/// - `**` as a whole segment matches zero or more segments
///
/// Paths are always `/`-delimited and matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct GlobPattern {
	/// The glob as written.
	pub glob: String,

	regex: Regex,
}

impl GlobPattern {
	/// Compile a glob pattern.
	pub fn compile(glob: &str) -> Result<Self> {
		let regex =
			Regex::new(&glob_to_regex(glob)).map_err(|source| RelocatorError::InvalidGlob {
				pattern: glob.to_string(),
				source,
			})?;

		Ok(GlobPattern {
			glob: glob.to_string(),
			regex,
		})
	}

	/// Check whether the whole of `path` matches this glob.
	pub fn matches(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}
}

impl PartialEq for GlobPattern {
	fn eq(&self, other: &Self) -> bool {
		self.glob == other.glob
	}
}

impl Eq for GlobPattern {}

/// One-shot match of `path` against `glob`.
///
/// A glob that fails to compile matches nothing.
pub fn matches(glob: &str, path: &str) -> bool {
	GlobPattern::compile(glob).is_ok_and(|pattern| pattern.matches(path))
}

/// Translate an ANT-style glob into an anchored regex source string.
fn glob_to_regex(glob: &str) -> String {
	let segments: Vec<&str> = glob.split('/').collect();
	let last = segments.len() - 1;
	let mut out = String::from("^");

	for (i, segment) in segments.iter().enumerate() {
		if *segment == "**" {
			if i != last {
				out.push_str("(?:[^/]*/)*");
			} else if out.ends_with('/') {
				// "a/**" matches "a" itself as well as everything below it
				out.pop();
				out.push_str("(?:/.*)?");
			} else {
				out.push_str(".*");
			}
			continue;
		}

		let mut buf = [0u8; 4];
		for c in segment.chars() {
			match c {
				'*' => out.push_str("[^/]*"),
				'?' => out.push_str("[^/]"),
				c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
			}
		}

		if i != last {
			out.push('/');
		}
	}

	out.push('$');
	out
}
