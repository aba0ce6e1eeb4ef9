use crate::classfile::ClassRemapper;
use crate::error::Result;
use crate::rules::relocation::Relocation;

const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Applies an ordered list of relocation rules to names found in an archive.
///
/// Rules are tried in insertion order and the first applicable rule wins.
/// The remapper holds no state besides its rules, so one instance can be
/// shared by any number of concurrent archive rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remapper {
	rules: Vec<Relocation>,
}

impl Remapper {
	/// Create a remapper from rules in priority order.
	pub fn new(rules: Vec<Relocation>) -> Self {
		Remapper { rules }
	}

	/// Create a remapper from plain `(pattern, relocated_pattern)` pairs.
	pub fn from_mappings<I, K, V>(mappings: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let rules = mappings
			.into_iter()
			.map(|(from, to)| Relocation::new(from.as_ref(), to.as_ref()))
			.collect::<Result<Vec<_>>>()?;
		Ok(Remapper::new(rules))
	}

	/// The rules in priority order.
	pub fn rules(&self) -> &[Relocation] {
		&self.rules
	}

	/// Map an internal name or resource path.
	///
	/// Object descriptors (`[[Lcom/foo/Bar;`) and multi-release prefixes
	/// (`META-INF/versions/11/`) are unwrapped before matching and restored
	/// afterwards. Unmatched names are returned unchanged.
	pub fn map_path(&self, name: &str) -> String {
		self.relocate(name, false).unwrap_or_else(|| name.to_string())
	}

	/// Map a string constant that may name a class.
	///
	/// Dotted class names are tried before slashed paths for every rule.
	pub fn map_class_constant(&self, value: &str) -> String {
		self.relocate(value, true)
			.unwrap_or_else(|| value.to_string())
	}

	/// Map a dotted class name, leaving anything else unchanged.
	pub fn map_class_name(&self, class: &str) -> String {
		self.rules
			.iter()
			.find(|rule| rule.can_relocate_class(class))
			.map(|rule| rule.relocate_class(class))
			.unwrap_or_else(|| class.to_string())
	}

	fn relocate(&self, name: &str, is_string_value: bool) -> Option<String> {
		let (descriptor_prefix, name, suffix) = match split_object_descriptor(name) {
			Some((prefix, inner)) => (prefix, inner, ";"),
			None => ("", name, ""),
		};
		let (version_prefix, name) = split_version_prefix(name).unwrap_or(("", name));

		self.rules.iter().find_map(|rule| {
			let relocated = if is_string_value && rule.can_relocate_class(name) {
				rule.relocate_class(name)
			} else if rule.can_relocate_path(name) {
				rule.relocate_path(name)
			} else {
				return None;
			};
			Some(format!(
				"{descriptor_prefix}{version_prefix}{relocated}{suffix}"
			))
		})
	}
}

impl ClassRemapper for Remapper {
	fn map(&self, internal_name: &str) -> String {
		self.map_path(internal_name)
	}

	fn map_value(&self, value: &str) -> String {
		self.map_class_constant(value)
	}
}

/// Split `[[Lcom/foo/Bar;` into `("[[L", "com/foo/Bar")`.
fn split_object_descriptor(name: &str) -> Option<(&str, &str)> {
	let dims = name.len() - name.trim_start_matches('[').len();
	let inner = name[dims..].strip_prefix('L')?.strip_suffix(';')?;

	if inner.is_empty() || inner.contains(['\n', '\r']) {
		return None;
	}

	Some((&name[..=dims], inner))
}

/// Split `META-INF/versions/11/com/foo` into `("META-INF/versions/11/", "com/foo")`.
fn split_version_prefix(name: &str) -> Option<(&str, &str)> {
	let rest = name.strip_prefix(VERSIONS_PREFIX)?;
	let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();

	if digits == 0 || rest.as_bytes().get(digits) != Some(&b'/') {
		return None;
	}

	let split = VERSIONS_PREFIX.len() + digits + 1;
	Some((&name[..split], &name[split..]))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn remapper(mappings: &[(&str, &str)]) -> Remapper {
		Remapper::from_mappings(mappings.iter().copied()).unwrap()
	}

	#[test]
	fn test_map_path_relocates_prefix() {
		let remapper = remapper(&[("com.google.common", "shaded.guava")]);
		assert_eq!(
			remapper.map_path("com/google/common/collect/Lists"),
			"shaded/guava/collect/Lists"
		);
		assert_eq!(remapper.map_path("org/other/Thing"), "org/other/Thing");
	}

	#[test]
	fn test_map_path_is_noop_on_relocated_names() {
		let remapper = remapper(&[("com.google.common", "shaded.guava")]);
		let once = remapper.map_path("com/google/common/base/Strings");
		assert_eq!(remapper.map_path(&once), once);
	}

	#[test]
	fn test_first_matching_rule_wins() {
		let both = remapper(&[("com.google", "first"), ("com.google.common", "second")]);
		let first_only = remapper(&[("com.google", "first")]);
		let name = "com/google/common/base/Strings";
		assert_eq!(both.map_path(name), first_only.map_path(name));
		assert_eq!(both.map_path(name), "first/common/base/Strings");
	}

	#[test]
	fn test_map_path_keeps_descriptor_wrapping() {
		let remapper = remapper(&[("com.foo", "shaded.foo")]);
		assert_eq!(remapper.map_path("Lcom/foo/Bar;"), "Lshaded/foo/Bar;");
		assert_eq!(remapper.map_path("[[Lcom/foo/Bar;"), "[[Lshaded/foo/Bar;");
		assert_eq!(remapper.map_path("[[Lorg/Bar;"), "[[Lorg/Bar;");
	}

	#[test]
	fn test_map_path_keeps_multi_release_prefix() {
		let remapper = remapper(&[("com.foo", "shaded.foo")]);
		assert_eq!(
			remapper.map_path("META-INF/versions/11/com/foo/Bar"),
			"META-INF/versions/11/shaded/foo/Bar"
		);
		assert_eq!(
			remapper.map_path("META-INF/versions/x/com/foo/Bar"),
			"META-INF/versions/x/com/foo/Bar"
		);
	}

	#[test]
	fn test_map_class_constant_prefers_class_names() {
		let remapper = remapper(&[("com.foo", "shaded.foo")]);
		assert_eq!(
			remapper.map_class_constant("com.foo.Bar"),
			"shaded.foo.Bar"
		);
		assert_eq!(remapper.map_class_constant("com/foo/Bar"), "shaded/foo/Bar");
		assert_eq!(
			remapper.map_class_constant("Lcom/foo/Bar;"),
			"Lshaded/foo/Bar;"
		);
		assert_eq!(remapper.map_class_constant("hello world"), "hello world");
	}

	#[test]
	fn test_map_path_does_not_treat_dotted_names_as_classes() {
		let remapper = remapper(&[("com.foo", "shaded.foo")]);
		assert_eq!(remapper.map_path("com.foo.Bar"), "com.foo.Bar");
	}

	#[test]
	fn test_map_class_name() {
		let remapper = remapper(&[("a", "z")]);
		assert_eq!(remapper.map_class_name("a.B"), "z.B");
		assert_eq!(remapper.map_class_name("a/B"), "a/B");
	}

	#[test]
	fn test_split_helpers() {
		assert_eq!(split_object_descriptor("LFoo;"), Some(("L", "Foo")));
		assert_eq!(split_object_descriptor("[LFoo;"), Some(("[L", "Foo")));
		assert_eq!(split_object_descriptor("L;"), None);
		assert_eq!(split_object_descriptor("Foo"), None);
		assert_eq!(
			split_version_prefix("META-INF/versions/9/a/B"),
			Some(("META-INF/versions/9/", "a/B"))
		);
		assert_eq!(split_version_prefix("META-INF/versions/9"), None);
	}
}
