use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use zip::{ZipArchive, ZipWriter};

use crate::error::{RelocatorError, Result};
use crate::jar::task::{RelocationSummary, RelocationTask};
use crate::rules::{Relocation, Remapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
	Ready,
	Consumed,
}

/// Rewrites one or more input archives into a single relocated output archive.
///
/// A relocator runs once. The output file is created (or truncated) when
/// [`run`](Self::run) starts and is not removed if the run fails.
#[derive(Debug)]
pub struct JarRelocator {
	inputs: Vec<PathBuf>,
	output: PathBuf,
	remapper: Arc<Remapper>,
	state: RunState,
}

impl JarRelocator {
	/// Create a relocator sharing an existing remapper.
	pub fn new(
		input: impl Into<PathBuf>,
		output: impl Into<PathBuf>,
		remapper: impl Into<Arc<Remapper>>,
	) -> Self {
		Self {
			inputs: vec![input.into()],
			output: output.into(),
			remapper: remapper.into(),
			state: RunState::Ready,
		}
	}

	/// Create a relocator applying `relocations` in order.
	pub fn with_relocations(
		input: impl Into<PathBuf>,
		output: impl Into<PathBuf>,
		relocations: Vec<Relocation>,
	) -> Self {
		Self::new(input, output, Remapper::new(relocations))
	}

	/// Create a relocator from plain `pattern -> relocated pattern` pairs.
	pub fn from_mappings<I, K, V>(
		input: impl Into<PathBuf>,
		output: impl Into<PathBuf>,
		mappings: I,
	) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		Ok(Self::new(input, output, Remapper::from_mappings(mappings)?))
	}

	/// Add another input archive; its entries are processed after earlier inputs.
	pub fn merge_input(mut self, input: impl Into<PathBuf>) -> Self {
		self.inputs.push(input.into());
		self
	}

	pub fn inputs(&self) -> &[PathBuf] {
		&self.inputs
	}

	pub fn output(&self) -> &Path {
		&self.output
	}

	pub fn remapper(&self) -> &Remapper {
		&self.remapper
	}

	/// Run the relocation.
	///
	/// Fails with [`RelocatorError::AlreadyRun`] when called a second time,
	/// whether or not the first run succeeded.
	pub fn run(&mut self) -> Result<RelocationSummary> {
		if self.state == RunState::Consumed {
			return Err(RelocatorError::AlreadyRun);
		}
		self.state = RunState::Consumed;

		info!(
			inputs = self.inputs.len(),
			output = %self.output.display(),
			rules = self.remapper.rules().len(),
			"relocating"
		);

		let write_error = |source: zip::result::ZipError| RelocatorError::ArchiveWrite {
			path: self.output.clone(),
			source,
		};

		let file = File::create(&self.output).map_err(|e| write_error(e.into()))?;
		let mut writer = ZipWriter::new(BufWriter::new(file));

		let mut task = RelocationTask::new(&self.remapper, &mut writer, &self.output);
		for input in &self.inputs {
			let read_error = |source: zip::result::ZipError| RelocatorError::ArchiveRead {
				path: input.clone(),
				source,
			};
			let file = File::open(input).map_err(|e| read_error(e.into()))?;
			let mut archive = ZipArchive::new(BufReader::new(file)).map_err(read_error)?;
			task.process_archive(&mut archive, input)?;
		}
		let summary = task.finish()?;

		let mut out = writer.finish().map_err(write_error)?;
		out.flush().map_err(|e| write_error(e.into()))?;

		info!(
			classes = summary.classes,
			resources = summary.resources,
			service_files = summary.service_files,
			duplicates = summary.duplicates,
			"relocation complete"
		);
		Ok(summary)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
		let mut writer = ZipWriter::new(File::create(path).unwrap());
		for (name, content) in entries {
			writer
				.start_file(*name, zip::write::SimpleFileOptions::default())
				.unwrap();
			writer.write_all(content).unwrap();
		}
		writer.finish().unwrap();
	}

	#[test]
	fn test_run_twice_fails() {
		let temp = TempDir::new().unwrap();
		let input = temp.path().join("in.jar");
		write_jar(&input, &[("a.txt", b"a")]);

		let mut relocator =
			JarRelocator::from_mappings(&input, temp.path().join("out.jar"), [("a", "b")]).unwrap();
		assert!(relocator.run().is_ok());
		assert!(matches!(relocator.run(), Err(RelocatorError::AlreadyRun)));
	}

	#[test]
	fn test_failed_run_is_consumed() {
		let temp = TempDir::new().unwrap();
		let mut relocator = JarRelocator::from_mappings(
			temp.path().join("missing.jar"),
			temp.path().join("out.jar"),
			[("a", "b")],
		)
		.unwrap();

		assert!(matches!(relocator.run(), Err(RelocatorError::ArchiveRead { .. })));
		assert!(matches!(relocator.run(), Err(RelocatorError::AlreadyRun)));
	}

	#[test]
	fn test_merge_input_order() {
		let relocator = JarRelocator::from_mappings("a.jar", "out.jar", [("a", "b")])
			.unwrap()
			.merge_input("b.jar")
			.merge_input("c.jar");
		assert_eq!(
			relocator.inputs(),
			&[PathBuf::from("a.jar"), PathBuf::from("b.jar"), PathBuf::from("c.jar")]
		);
	}

	#[test]
	fn test_shared_remapper() {
		let remapper = Arc::new(Remapper::from_mappings([("a", "b")]).unwrap());
		let first = JarRelocator::new("a.jar", "a-out.jar", Arc::clone(&remapper));
		let second = JarRelocator::new("b.jar", "b-out.jar", Arc::clone(&remapper));
		assert_eq!(first.remapper(), second.remapper());
		assert_eq!(Arc::strong_count(&remapper), 3);
	}
}
