use std::collections::HashSet;
use std::io::{Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::classfile::{ClassRemapper, rewrite_class};
use crate::error::{RelocatorError, Result};
use crate::jar::services::ServiceRegistryMerger;
use crate::rules::Remapper;

const CLASS_SUFFIX: &str = ".class";
const INDEX_LIST: &str = "META-INF/INDEX.LIST";
const MAX_SIZE_HINT: u64 = 1 << 20;

/// Counters describing a finished relocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationSummary {
	/// Class files rewritten to the output.
	pub classes: usize,

	/// Plain resources copied to the output.
	pub resources: usize,

	/// Directory entries synthesized in the output.
	pub directories: usize,

	/// Merged service files written at the end.
	pub service_files: usize,

	/// Entries dropped because an entry with the same output name was already written.
	pub duplicates: usize,

	/// Directory and index entries skipped from the inputs.
	pub skipped: usize,
}

/// What to do with one input entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryAction {
	Skip,
	Class { mapped: String },
	Service { mapped: String },
	Resource { mapped: String },
}

impl EntryAction {
	pub(crate) fn classify(name: &str, is_dir: bool, remapper: &Remapper) -> Self {
		if is_dir || name == INDEX_LIST {
			return Self::Skip;
		}

		if let Some(class) = name.strip_suffix(CLASS_SUFFIX) {
			return Self::Class {
				mapped: format!("{}{CLASS_SUFFIX}", remapper.map_path(class)),
			};
		}

		let mapped = remapper.map_path(name);
		if ServiceRegistryMerger::handles(&mapped) {
			Self::Service { mapped }
		} else {
			Self::Resource { mapped }
		}
	}
}

/// Relocates the `SourceFile` attribute relative to the class's original package.
struct SourceFileRemapper<'a> {
	remapper: &'a Remapper,
	package: &'a str,
}

impl ClassRemapper for SourceFileRemapper<'_> {
	fn map(&self, internal_name: &str) -> String {
		self.remapper.map_path(internal_name)
	}

	fn map_value(&self, value: &str) -> String {
		self.remapper.map_class_constant(value)
	}

	fn map_source_file(&self, source_file: &str) -> String {
		let mapped = self
			.remapper
			.map_path(&format!("{}{source_file}", self.package));
		match mapped.rfind('/') {
			Some(i) => mapped[i + 1..].to_string(),
			None => mapped,
		}
	}
}

/// Streams the entries of one or more input archives into an output archive.
///
/// Output names are written at most once. Directories are synthesized for every
/// written entry, shallowest first, and service files are written last.
pub(crate) struct RelocationTask<'a, W: Write + Seek> {
	remapper: &'a Remapper,
	writer: &'a mut ZipWriter<W>,
	output: &'a Path,
	seen: HashSet<String>,
	services: ServiceRegistryMerger,
	summary: RelocationSummary,
}

impl<'a, W: Write + Seek> RelocationTask<'a, W> {
	pub(crate) fn new(
		remapper: &'a Remapper,
		writer: &'a mut ZipWriter<W>,
		output: &'a Path,
	) -> Self {
		Self {
			remapper,
			writer,
			output,
			seen: HashSet::new(),
			services: ServiceRegistryMerger::new(),
			summary: RelocationSummary::default(),
		}
	}

	/// Process every entry of `archive`, in archive order.
	pub(crate) fn process_archive<R: Read + Seek>(
		&mut self,
		archive: &mut ZipArchive<R>,
		input: &Path,
	) -> Result<()> {
		debug!(input = %input.display(), entries = archive.len(), "processing archive");

		for index in 0..archive.len() {
			let mut file = archive
				.by_index(index)
				.map_err(|source| RelocatorError::ArchiveRead {
					path: input.to_path_buf(),
					source,
				})?;
			let name = file.name().to_string();

			let action = EntryAction::classify(&name, file.is_dir(), self.remapper);
			if action == EntryAction::Skip {
				debug!(entry = %name, "skipping entry");
				self.summary.skipped += 1;
				continue;
			}

			let modified: Option<DateTime> = file.last_modified().into();
			// The declared size is untrusted; cap the hint and let the read grow the buffer.
			let mut content = Vec::with_capacity(file.size().min(MAX_SIZE_HINT) as usize);
			file.read_to_end(&mut content)
				.map_err(|source| RelocatorError::EntryIo {
					entry: name.clone(),
					source,
				})?;

			match action {
				EntryAction::Skip => {}
				EntryAction::Class { mapped } => {
					self.process_class(&name, &mapped, &content, modified)?
				}
				EntryAction::Service { mapped } => {
					self.services.process(&mapped, &content, self.remapper)
				}
				EntryAction::Resource { mapped } => {
					self.process_resource(&name, &mapped, &content, modified)?
				}
			}
		}

		Ok(())
	}

	fn process_class(
		&mut self,
		name: &str,
		mapped: &str,
		content: &[u8],
		modified: Option<DateTime>,
	) -> Result<()> {
		if self.seen.contains(mapped) {
			warn!(entry = %name, output = %mapped, "dropping duplicate class");
			self.summary.duplicates += 1;
			return Ok(());
		}

		let package = name.rfind('/').map_or("", |i| &name[..=i]);
		let remapper = SourceFileRemapper {
			remapper: self.remapper,
			package,
		};
		let rewritten = rewrite_class(content, &remapper).map_err(|source| {
			RelocatorError::MalformedClass {
				entry: name.to_string(),
				source,
			}
		})?;

		if name != mapped {
			debug!(entry = %name, output = %mapped, "relocating class");
		}
		self.write_entry(mapped, &rewritten, modified)?;
		self.summary.classes += 1;
		Ok(())
	}

	fn process_resource(
		&mut self,
		name: &str,
		mapped: &str,
		content: &[u8],
		modified: Option<DateTime>,
	) -> Result<()> {
		if self.seen.contains(mapped) {
			debug!(entry = %name, output = %mapped, "resource already written, keeping first");
			self.summary.duplicates += 1;
			return Ok(());
		}

		self.write_entry(mapped, content, modified)?;
		self.summary.resources += 1;
		Ok(())
	}

	/// Write the merged service files and return the summary.
	pub(crate) fn finish(mut self) -> Result<RelocationSummary> {
		let services = std::mem::take(&mut self.services);
		for file in services.into_files() {
			debug!(service = %file.name, providers = file.providers.len(), "writing service file");
			self.write_entry(&file.name, file.contents().as_bytes(), None)?;
			self.summary.service_files += 1;
		}

		Ok(self.summary)
	}

	fn write_entry(
		&mut self,
		name: &str,
		content: &[u8],
		modified: Option<DateTime>,
	) -> Result<()> {
		self.ensure_parents(name, modified)?;

		self.writer
			.start_file(name, Self::options(modified))
			.map_err(|source| self.write_error(source))?;
		self.writer
			.write_all(content)
			.map_err(|source| RelocatorError::EntryIo {
				entry: name.to_string(),
				source,
			})?;
		self.seen.insert(name.to_string());
		Ok(())
	}

	/// Write a directory entry for every ancestor of `name` not yet written.
	fn ensure_parents(&mut self, name: &str, modified: Option<DateTime>) -> Result<()> {
		for (i, _) in name.match_indices('/') {
			let directory = &name[..=i];
			if self.seen.contains(directory) {
				continue;
			}

			self.writer
				.add_directory(directory, Self::options(modified))
				.map_err(|source| self.write_error(source))?;
			self.seen.insert(directory.to_string());
			self.summary.directories += 1;
		}
		Ok(())
	}

	fn options(modified: Option<DateTime>) -> SimpleFileOptions {
		let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
		match modified {
			Some(time) => options.last_modified_time(time),
			None => options,
		}
	}

	fn write_error(&self, source: zip::result::ZipError) -> RelocatorError {
		RelocatorError::ArchiveWrite {
			path: self.output.to_path_buf(),
			source,
		}
	}
}
