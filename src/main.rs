use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use anvil::{ClassMetadata, FrameComputation};
use crate::archive::Kind;
use crate::rewrite::Rewriter;

mod archive;
mod rewrite;

#[derive(Debug, Parser)]
struct Cli {
	/// Be verbose.
	#[arg(short = 'v', long = "verbose")]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Reads every class of a class file, directory or jar, and writes it back
	Rewrite {
		input: PathBuf,
		/// Where to write the result, defaults to the input name with `-rewritten` appended
		#[arg(short = 'o', long = "output")]
		output: Option<PathBuf>,
		#[arg(long = "frames", value_enum, default_value_t)]
		frames: Frames,
		/// Only rewrite classes whose internal name starts with this, copy the others unchanged
		#[arg(long = "only")]
		only: Option<String>,
	},
	/// Prints what a class file declares
	Inspect {
		class: PathBuf,
	},
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Frames {
	#[default]
	/// Compute stack map frames for class files of version 51 and newer, keep unchanged methods as they are.
	Auto,
	/// Compute frames for every method.
	Always,
	/// Only compute the maximum stack size and number of locals of every method.
	Never,
}

impl Display for Frames {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(self, f)
	}
}

impl From<Frames> for FrameComputation {
	fn from(value: Frames) -> FrameComputation {
		match value {
			Frames::Auto => FrameComputation::Auto,
			Frames::Always => FrameComputation::Always,
			Frames::Never => FrameComputation::Never,
		}
	}
}

fn setup_logging(verbose: bool) -> Result<()> {
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(if verbose { LevelFilter::Debug } else { LevelFilter::Info })
		.chain(std::io::stderr())
		.apply()?;
	Ok(())
}

fn main() -> Result<()> {
	let cli: Cli = Cli::parse();

	setup_logging(cli.verbose)?;

	match cli.command {
		Command::Rewrite { input, output, frames, only } => rewrite(&input, output, frames, only),
		Command::Inspect { class } => inspect(&class),
	}
}

fn rewrite(input: &Path, output: Option<PathBuf>, frames: Frames, only: Option<String>) -> Result<()> {
	let kind = Kind::of(input)?;
	let output = match output {
		Some(output) => output,
		None => archive::default_output(input)?,
	};

	let entries = archive::read(input, kind)?;
	info!("rewriting {} entries of {input:?} with frames {frames}", entries.len());

	let rewriter = Rewriter::new(frames.into(), only);
	let entries = rewriter.rewrite_all(entries);

	archive::write(&output, kind, &entries)
		.with_context(|| anyhow!("failed to write the result to {output:?}"))?;
	info!("wrote {output:?}");
	Ok(())
}

fn inspect(path: &Path) -> Result<()> {
	let bytes = std::fs::read(path).with_context(|| anyhow!("failed to read class file {path:?}"))?;
	let class = ClassMetadata::read(&bytes).with_context(|| anyhow!("failed to read class file {path:?}"))?;

	println!("class {} (version {}.{}, access {:#06x})", class.name, class.major_version, class.minor_version, class.access);
	if let Some(super_class) = &class.super_class {
		println!("  extends {super_class}");
	}
	for interface in &class.interfaces {
		println!("  implements {interface}");
	}
	if let Some(signature) = &class.signature {
		println!("  signature {signature}");
	}
	for annotation in &class.annotations {
		println!("  @{annotation}");
	}

	for field in &class.fields {
		println!("  field {} {} (access {:#06x})", field.name, field.descriptor, field.access);
		for annotation in &field.annotations {
			println!("    @{annotation}");
		}
	}
	for method in &class.methods {
		println!("  method {}{} (access {:#06x})", method.name, method.descriptor, method.access);
		for annotation in &method.annotations {
			println!("    @{annotation}");
		}
		for exception in &method.exceptions {
			println!("    throws {exception}");
		}
		let names: Vec<String> = method.parameter_names.iter()
			.map(|name| name.as_ref().map_or_else(|| "?".to_owned(), |name| name.to_string()))
			.collect();
		if !names.is_empty() {
			println!("    parameters {}", names.join(", "));
		}
	}
	Ok(())
}
