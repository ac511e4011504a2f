//! Running every class of an input through the reader and the writer.

use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};
use log::{debug, info, trace, warn};
use anvil::tree::annotation::Annotation;
use anvil::tree::{ClassHeader, EnclosingMethod, FieldHeader, InnerClass, MethodHeader};
use anvil::{completed, Abandoned, ClassReader, ClassVisitor, ClassWriter, FieldWriter, FrameComputation, MethodWriter, PendingClasses, ReadOptions, SuperClassMap, TypeHierarchy, Visit};
use crate::archive::Entry;

pub(crate) struct Rewriter {
	hierarchy: SuperClassMap,
	frames: FrameComputation,
	/// Only classes whose internal name starts with this get rewritten.
	only: Option<String>,
	/// The rewritten classes, under [`Entry::class_key`] of the entry they came from.
	pending: PendingClasses,
	failed: AtomicUsize,
}

impl Rewriter {
	pub(crate) fn new(frames: FrameComputation, only: Option<String>) -> Rewriter {
		Rewriter {
			hierarchy: SuperClassMap::with_platform_classes(),
			frames,
			only,
			pending: PendingClasses::new(),
			failed: AtomicUsize::new(0),
		}
	}

	/// Rewrites all class entries, and returns the entries with the rewritten classes in place. Classes that fail
	/// to be rewritten are kept as they are.
	pub(crate) fn rewrite_all(&self, entries: Vec<Entry>) -> Vec<Entry> {
		let classes: Vec<&Entry> = entries.iter()
			.filter(|entry| entry.class_key().is_some())
			.collect();

		// know all super classes of the input before computing any frames
		for class in &classes {
			if let Err(error) = self.register(class) {
				debug!("not registering the super class of {:?}: {error:#}", class.name);
			}
		}

		let threads = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
		let chunk_size = classes.len().div_ceil(threads).max(1);
		std::thread::scope(|scope| {
			for chunk in classes.chunks(chunk_size) {
				scope.spawn(move || {
					for class in chunk {
						self.process(class);
					}
				});
			}
		});

		info!("rewrote {} of {} classes, {} failed", self.pending.len(), classes.len(), self.failed.load(Ordering::Relaxed));

		entries.into_iter()
			.map(|entry| match entry.class_key().and_then(|key| self.pending.take(JavaStr::from_str(key))) {
				Some(data) => Entry { name: entry.name, data },
				None => entry,
			})
			.collect()
	}

	fn register(&self, entry: &Entry) -> Result<()> {
		let reader = ClassReader::new(&entry.data)?;
		self.hierarchy.register(reader.class_name()?, reader.super_class()?);
		Ok(())
	}

	fn process(&self, entry: &Entry) {
		let Some(key) = entry.class_key() else {
			return;
		};
		let mut session = self.pending.session();
		match self.rewrite(&entry.data) {
			Ok(Some(data)) => {
				session.offer(JavaString::from(key), data);
				session.commit();
			},
			Ok(None) => trace!("{:?} isn't matched by the prefix, copying it unchanged", entry.name),
			Err(error) => {
				self.failed.fetch_add(1, Ordering::Relaxed);
				warn!("failed to rewrite {:?}, copying it unchanged: {error:#}", entry.name);
			},
		}
	}

	/// Returns `None` if the class was abandoned.
	fn rewrite(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
		let reader = ClassReader::new(data)?;
		let name = reader.class_name()?.to_owned();

		// with an explicit choice, every method gets assembled again
		let mut writer = match self.frames {
			FrameComputation::Auto => ClassWriter::from_reader(&reader, &self.hierarchy, self.frames)?,
			frames => ClassWriter::new(&self.hierarchy, frames),
		};
		let mut filter = OnlyPrefix { writer: &mut writer, prefix: self.only.as_deref() };
		let options = ReadOptions { frames: true, ..ReadOptions::default() };

		let flow = reader.accept(&mut filter, options)
			.with_context(|| anyhow!("failed to read class {name:?}"))?;
		if completed(flow).is_none() {
			return Ok(None);
		}
		writer.to_bytes()
			.with_context(|| anyhow!("failed to write class {name:?}"))
			.map(Some)
	}
}

/// Passes everything on to a [`ClassWriter`], but abandons classes not starting with the prefix.
struct OnlyPrefix<'w, 'h, 'p> {
	writer: &'w mut ClassWriter<'h>,
	prefix: Option<&'p str>,
}

impl ClassVisitor for OnlyPrefix<'_, '_, '_> {
	type Field = FieldWriter;
	type Method = MethodWriter;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		if self.prefix.is_some_and(|prefix| !header.name.starts_with(prefix)) {
			return Ok(ControlFlow::Break(Abandoned));
		}
		self.writer.visit_class(header)
	}

	fn visit_source(&mut self, source_file: &JavaStr) -> Result<()> {
		self.writer.visit_source(source_file)
	}
	fn visit_outer_class(&mut self, enclosing_method: &EnclosingMethod) -> Result<()> {
		self.writer.visit_outer_class(enclosing_method)
	}
	fn visit_nest_host(&mut self, nest_host: &JavaStr) -> Result<()> {
		self.writer.visit_nest_host(nest_host)
	}
	fn visit_nest_member(&mut self, nest_member: &JavaStr) -> Result<()> {
		self.writer.visit_nest_member(nest_member)
	}
	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.writer.visit_annotation(annotation)
	}
	fn visit_inner_class(&mut self, inner_class: InnerClass) -> Result<()> {
		self.writer.visit_inner_class(inner_class)
	}

	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<FieldWriter>> {
		self.writer.visit_field(header)
	}
	fn finish_field(&mut self, field_visitor: FieldWriter) -> Result<()> {
		self.writer.finish_field(field_visitor)
	}

	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<MethodWriter>> {
		self.writer.visit_method(header)
	}
	fn finish_method(&mut self, method_visitor: MethodWriter) -> Result<()> {
		self.writer.finish_method(method_visitor)
	}

	fn visit_end(&mut self) -> Visit {
		self.writer.visit_end()
	}
}
