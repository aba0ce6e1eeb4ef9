use std::collections::{HashMap, HashSet};

use crate::rules::Remapper;

/// Directory holding `java.util.ServiceLoader` provider-configuration files.
pub const SERVICES_PATH: &str = "META-INF/services/";

/// A merged provider-configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFile {
	/// Entry name, including [`SERVICES_PATH`].
	pub name: String,

	/// Provider class names in first-seen order, without duplicates.
	pub providers: Vec<String>,
}

impl ServiceFile {
	/// File contents: one provider per line.
	pub fn contents(&self) -> String {
		self.providers
			.iter()
			.map(|provider| format!("{provider}\n"))
			.collect()
	}
}

/// Collects service files from every processed archive and merges them by name.
///
/// Both the service interface (the file name) and every provider line are
/// relocated as dotted class names.
#[derive(Debug, Default)]
pub struct ServiceRegistryMerger {
	files: Vec<ServiceFile>,
	by_name: HashMap<String, usize>,
	members: Vec<HashSet<String>>,
}

impl ServiceRegistryMerger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Check whether an entry is a provider-configuration file.
	pub fn handles(resource: &str) -> bool {
		resource.starts_with(SERVICES_PATH)
	}

	/// Accumulate the providers listed in `content` under the relocated service name.
	///
	/// `resource` is the entry's output name; the service interface it names is
	/// then relocated as a class name.
	pub fn process(&mut self, resource: &str, content: &[u8], remapper: &Remapper) {
		let service = resource.strip_prefix(SERVICES_PATH).unwrap_or(resource);
		let name = format!("{SERVICES_PATH}{}", remapper.map_class_name(service));

		let slot = match self.by_name.get(&name) {
			Some(&slot) => slot,
			None => {
				self.files.push(ServiceFile {
					name: name.clone(),
					providers: Vec::new(),
				});
				self.members.push(HashSet::new());
				self.by_name.insert(name, self.files.len() - 1);
				self.files.len() - 1
			}
		};
		let providers = &mut self.files[slot].providers;
		let members = &mut self.members[slot];

		let text = String::from_utf8_lossy(content);
		for line in text.split(['\r', '\n']).map(str::trim) {
			if line.is_empty() {
				continue;
			}
			let provider = remapper.map_class_name(line);
			if members.insert(provider.clone()) {
				providers.push(provider);
			}
		}
	}

	/// Merged files with at least one provider, in first-seen order.
	pub fn into_files(self) -> impl Iterator<Item = ServiceFile> {
		self.files
			.into_iter()
			.filter(|file| !file.providers.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn remapper() -> Remapper {
		Remapper::from_mappings([("a", "z")]).unwrap()
	}

	#[test]
	fn test_handles_services_only() {
		assert!(ServiceRegistryMerger::handles("META-INF/services/x.Y"));
		assert!(!ServiceRegistryMerger::handles("META-INF/MANIFEST.MF"));
		assert!(!ServiceRegistryMerger::handles("x/META-INF/services/x.Y"));
	}

	#[test]
	fn test_merges_providers_in_first_seen_order() {
		let remapper = remapper();
		let mut merger = ServiceRegistryMerger::new();
		merger.process("META-INF/services/x.Y", b"a.B\n", &remapper);
		merger.process("META-INF/services/x.Y", b"a.C\r\na.B\n", &remapper);

		let files: Vec<_> = merger.into_files().collect();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].name, "META-INF/services/x.Y");
		assert_eq!(files[0].providers, vec!["z.B", "z.C"]);
		assert_eq!(files[0].contents(), "z.B\nz.C\n");
	}

	#[test]
	fn test_relocates_service_name() {
		let remapper = remapper();
		let mut merger = ServiceRegistryMerger::new();
		merger.process("META-INF/services/a.Service", b"a.Impl", &remapper);
		merger.process("META-INF/services/z.Service", b"other.Impl", &remapper);

		let files: Vec<_> = merger.into_files().collect();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].name, "META-INF/services/z.Service");
		assert_eq!(files[0].providers, vec!["z.Impl", "other.Impl"]);
	}

	#[test]
	fn test_many_repeated_providers() {
		let remapper = remapper();
		let mut merger = ServiceRegistryMerger::new();
		let content: String = (0..5000).map(|i| format!("a.Impl{}\n", i % 50)).collect();
		merger.process("META-INF/services/x.Y", content.as_bytes(), &remapper);
		merger.process("META-INF/services/x.Y", b"a.Impl49\na.Extra\n", &remapper);

		let files: Vec<_> = merger.into_files().collect();
		let providers = &files[0].providers;
		assert_eq!(providers.len(), 51);
		assert_eq!(providers[0], "z.Impl0");
		assert_eq!(providers[49], "z.Impl49");
		assert_eq!(providers[50], "z.Extra");
	}

	#[test]
	fn test_blank_lines_and_whitespace() {
		let remapper = remapper();
		let mut merger = ServiceRegistryMerger::new();
		merger.process("META-INF/services/x.Y", b"\n  a.B  \n\n\r\n", &remapper);
		merger.process("META-INF/services/empty", b"\n\n", &remapper);

		let files: Vec<_> = merger.into_files().collect();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].providers, vec!["z.B"]);
	}
}
