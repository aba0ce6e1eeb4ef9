use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jar_relocator::config::{parse_config_file, parse_mapping};
use jar_relocator::{JarRelocator, Relocation, Remapper};

#[derive(Parser)]
#[command(name = "jar-relocator")]
#[command(
	author,
	version,
	about = "Relocate Java packages inside a jar into a private namespace"
)]
#[command(arg_required_else_help = true, subcommand_negates_reqs = true)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Archive to relocate
	#[arg(short, long, value_name = "JAR", required = true)]
	input: Option<PathBuf>,

	/// Archive to write (overwritten if present)
	#[arg(short, long, value_name = "JAR", required = true)]
	output: Option<PathBuf>,

	/// TOML file with [[relocations]] tables
	#[arg(short, long, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Relocate a package prefix, applied after rules from --config
	#[arg(short, long = "relocate", value_name = "FROM=TO", value_parser = parse_mapping)]
	relocate: Vec<(String, String)>,

	/// Additional archive merged into the output after the input
	#[arg(short, long, value_name = "JAR")]
	merge: Vec<PathBuf>,

	/// Log every entry decision
	#[arg(short, long, global = true)]
	verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Rule file commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Print the relocations defined in a rule file
	Show { file: PathBuf },
	/// Check a rule file for errors without relocating anything
	Validate { file: PathBuf },
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	if let Some(command) = cli.command {
		return match command {
			Commands::Config { action } => match action {
				ConfigAction::Show { file } => handle_config_show(&file),
				ConfigAction::Validate { file } => handle_config_validate(&file),
			},
		};
	}

	let (Some(input), Some(output)) = (cli.input, cli.output) else {
		anyhow::bail!("--input and --output are required");
	};

	handle_relocate(
		&input,
		&output,
		cli.config.as_deref(),
		&cli.relocate,
		cli.merge,
	)
}

fn init_logging(verbose: bool) {
	let default = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn load_rules(config: Option<&Path>, mappings: &[(String, String)]) -> Result<Vec<Relocation>> {
	let mut rules = Vec::new();

	if let Some(path) = config {
		let config = parse_config_file(path)
			.with_context(|| format!("Failed to load rules from {}", path.display()))?;
		rules.extend(
			config
				.to_relocations()
				.with_context(|| format!("Invalid relocation in {}", path.display()))?,
		);
	}

	for (from, to) in mappings {
		rules.push(
			Relocation::new(from, to)
				.with_context(|| format!("Invalid relocation: {from}={to}"))?,
		);
	}

	Ok(rules)
}

fn handle_relocate(
	input: &Path,
	output: &Path,
	config: Option<&Path>,
	mappings: &[(String, String)],
	merge: Vec<PathBuf>,
) -> Result<ExitCode> {
	let rules = load_rules(config, mappings)?;
	if rules.is_empty() {
		warn!("no relocations given, entries will be copied unchanged");
	}

	let mut relocator = JarRelocator::new(input, output, Remapper::new(rules));
	for extra in merge {
		relocator = relocator.merge_input(extra);
	}

	let summary = match relocator.run() {
		Ok(summary) => summary,
		Err(e) => {
			// Drop the partial archive.
			if output.exists()
				&& let Err(err) = std::fs::remove_file(output)
			{
				warn!(output = %output.display(), error = %err, "failed to remove partial archive");
			}
			return Err(e).with_context(|| format!("Failed to relocate {}", input.display()));
		}
	};

	info!(
		classes = summary.classes,
		resources = summary.resources,
		directories = summary.directories,
		service_files = summary.service_files,
		duplicates = summary.duplicates,
		"wrote {}",
		output.display()
	);
	Ok(ExitCode::SUCCESS)
}

fn handle_config_show(file: &Path) -> Result<ExitCode> {
	let config = parse_config_file(file)
		.with_context(|| format!("Failed to load rules from {}", file.display()))?;

	println!("# Source: {}", file.display());
	println!("# relocations: {}", config.relocations.len());
	println!();

	for (i, entry) in config.relocations.iter().enumerate() {
		println!("  Relocation {}:", i + 1);
		println!("    pattern: {}", entry.pattern);
		println!("    relocated-pattern: {}", entry.relocated_pattern);
		if !entry.includes.is_empty() {
			println!("    includes: {}", entry.includes.join(", "));
		}
		if !entry.excludes.is_empty() {
			println!("    excludes: {}", entry.excludes.join(", "));
		}
		println!();
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_validate(file: &Path) -> Result<ExitCode> {
	let result = parse_config_file(file).and_then(|config| {
		let count = config.to_relocations()?.len();
		Ok(count)
	});

	match result {
		Ok(count) => {
			println!("{} is valid ({} relocations)", file.display(), count);
			Ok(ExitCode::SUCCESS)
		}
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			Ok(ExitCode::FAILURE)
		}
	}
}
