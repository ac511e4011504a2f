//! Reading and writing the inputs of `anvil rewrite`: single class files, directories and jars.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// A file of the input, named by its path relative to the input, separated by `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
	pub(crate) name: String,
	pub(crate) data: Vec<u8>,
}

impl Entry {
	/// The name without the `.class` suffix, if this is a class file.
	pub(crate) fn class_key(&self) -> Option<&str> {
		self.name.strip_suffix(".class")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
	Class,
	Directory,
	Jar,
}

impl Kind {
	pub(crate) fn of(path: &Path) -> Result<Kind> {
		if path.is_dir() {
			return Ok(Kind::Directory);
		}
		match path.extension().and_then(|extension| extension.to_str()) {
			Some("class") => Ok(Kind::Class),
			Some("jar" | "zip") => Ok(Kind::Jar),
			_ => bail!("don't know how to rewrite {path:?}: expected a class file, a directory or a jar"),
		}
	}
}

pub(crate) fn read(path: &Path, kind: Kind) -> Result<Vec<Entry>> {
	match kind {
		Kind::Class => {
			let name = path.file_name()
				.and_then(|name| name.to_str())
				.with_context(|| anyhow!("file name of {path:?} isn't valid unicode"))?
				.to_owned();
			let data = std::fs::read(path).with_context(|| anyhow!("failed to read class file {path:?}"))?;
			Ok(vec![Entry { name, data }])
		},
		Kind::Directory => read_directory(path),
		Kind::Jar => read_jar(path),
	}
}

pub(crate) fn write(path: &Path, kind: Kind, entries: &[Entry]) -> Result<()> {
	match kind {
		Kind::Class => {
			let [entry] = entries else {
				bail!("expected exactly one class to write to {path:?}, got {}", entries.len());
			};
			std::fs::write(path, &entry.data).with_context(|| anyhow!("failed to write class file {path:?}"))
		},
		Kind::Directory => write_directory(path, entries),
		Kind::Jar => write_jar(path, entries),
	}
}

/// The default output: next to the input, with `-rewritten` appended to the file stem.
pub(crate) fn default_output(input: &Path) -> Result<PathBuf> {
	let stem = input.file_stem()
		.and_then(|stem| stem.to_str())
		.with_context(|| anyhow!("can't derive an output path from {input:?}, use `-o`"))?;
	let name = match input.extension().and_then(|extension| extension.to_str()) {
		Some(extension) if !input.is_dir() => format!("{stem}-rewritten.{extension}"),
		_ => format!("{stem}-rewritten"),
	};
	Ok(input.with_file_name(name))
}

fn read_directory(directory: &Path) -> Result<Vec<Entry>> {
	let paths: Vec<PathBuf> = WalkDir::new(directory)
		.follow_links(false)
		.sort_by_file_name()
		.into_iter()
		.filter(|res| res.as_ref().is_ok_and(|res| !res.file_type().is_dir()))
		.map(|res| res.map(|entry| entry.into_path()))
		.collect::<Result<_, walkdir::Error>>()
		.with_context(|| anyhow!("failed to get files (recursively) for directory {directory:?}"))?;

	paths.into_iter()
		.map(|path| -> Result<Entry> {
			let relative = path.strip_prefix(directory)?;
			let name = relative.components()
				.map(|component| component.as_os_str().to_str()
					.with_context(|| anyhow!("path {relative:?} isn't valid unicode")))
				.collect::<Result<Vec<_>>>()?
				.join("/");
			let data = std::fs::read(&path).with_context(|| anyhow!("failed to read {path:?}"))?;
			Ok(Entry { name, data })
		})
		.collect()
}

fn write_directory(directory: &Path, entries: &[Entry]) -> Result<()> {
	for entry in entries {
		let path = directory.join(&entry.name);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).with_context(|| anyhow!("failed to create directory {parent:?}"))?;
		}
		std::fs::write(&path, &entry.data).with_context(|| anyhow!("failed to write {path:?}"))?;
	}
	Ok(())
}

fn read_jar(path: &Path) -> Result<Vec<Entry>> {
	let file = File::open(path).with_context(|| anyhow!("failed to open jar {path:?}"))?;
	let mut zip = ZipArchive::new(BufReader::new(file)).with_context(|| anyhow!("failed to read jar {path:?}"))?;

	let mut entries = Vec::with_capacity(zip.len());
	for index in 0..zip.len() {
		let mut file = zip.by_index(index)?;
		if file.is_dir() {
			continue;
		}
		let name = file.name().to_owned();
		let mut data = Vec::new();
		file.read_to_end(&mut data).with_context(|| anyhow!("failed to read {name:?} from jar {path:?}"))?;
		entries.push(Entry { name, data });
	}
	debug!("read {} entries from {path:?}", entries.len());
	Ok(entries)
}

fn write_jar(path: &Path, entries: &[Entry]) -> Result<()> {
	let file = File::create(path).with_context(|| anyhow!("failed to create jar {path:?}"))?;
	let mut zip = ZipWriter::new(BufWriter::new(file));

	let mut directories = Vec::new();
	for entry in entries {
		let mut name = entry.name.as_str();
		while let Some((left, _)) = name.rsplit_once('/') {
			if !left.is_empty() && !directories.iter().any(|directory| directory == left) {
				directories.push(left.to_owned());
				zip.add_directory(left, FileOptions::<()>::default())?;
			}
			name = left;
		}

		zip.start_file(entry.name.as_str(), FileOptions::<()>::default())?;
		zip.write_all(&entry.data)?;
	}

	zip.finish()?.flush()?;
	Ok(())
}
