//! Writing class files, see [`ClassWriter`].

use std::ops::ControlFlow;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::bytes::ClassWrite;
use crate::class_constants::{self, attribute, version};
use crate::error::Visit;
use crate::hierarchy::TypeHierarchy;
use crate::pool::ConstantPool;
use crate::reader::ClassReader;
use crate::tree::annotation::Annotation;
use crate::tree::{ClassHeader, EnclosingMethod, FieldHeader, InnerClass, MethodHeader};
use crate::visitor::{ClassVisitor, FieldVisitor, SourceId};
use crate::writer::attributes::{write_annotations, write_attribute, write_attribute_fix_length};
use crate::writer::code::MethodContext;

pub use crate::writer::method::MethodWriter;

mod attributes;
mod code;
mod method;

/// Whether the writer computes stack map frames, or only the maximum stack size and number of locals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameComputation {
	/// Frames for class files of version 51 and newer, where the verifier requires them.
	#[default]
	Auto,
	Always,
	Never,
}

impl FrameComputation {
	fn frames_for(self, major_version: u16) -> bool {
		match self {
			FrameComputation::Auto => major_version >= version::V1_7,
			FrameComputation::Always => true,
			FrameComputation::Never => false,
		}
	}
}

/// Records a field until it's finished.
#[derive(Debug)]
pub struct FieldWriter {
	header: FieldHeader,
	annotations: Vec<Annotation>,
}

impl FieldVisitor for FieldWriter {
	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.annotations.push(annotation);
		Ok(())
	}
}

impl FieldWriter {
	fn write(self, writer: &mut Vec<u8>, pool: &mut ConstantPool) -> Result<()> {
		let field = &self.header;
		writer.write_u16(field.access);
		writer.write_u16(pool.put_utf8(&field.name));
		writer.write_u16(pool.put_utf8(&field.descriptor));

		let mut attribute_count = 0;
		let mut buffer = Vec::new();

		if let Some(constant_value) = &field.constant_value {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::CONSTANT_VALUE, 2)?;
			buffer.write_u16(pool.put_constant_value(constant_value));
		}
		if let Some(signature) = &field.signature {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
			buffer.write_u16(pool.put_utf8(signature));
		}
		if field.deprecated {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
		}
		if field.synthetic {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
		}
		if !self.annotations.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, |w, pool| {
				write_annotations(w, pool, &self.annotations)
			})?;
		}

		writer.write_usize_as_u16(attribute_count).context("too many attributes on field")?;
		writer.write_u8_slice(&buffer);
		Ok(())
	}
}

/// Turns visitor events back into a class file.
///
/// Fields and methods are encoded as soon as they're finished. A writer created with [`ClassWriter::from_reader`]
/// starts with the constant pool of the reader, which lets methods the visitors don't change be copied without
/// decoding them.
pub struct ClassWriter<'h> {
	hierarchy: &'h dyn TypeHierarchy,
	frames: FrameComputation,
	source: Option<SourceId>,
	pool: ConstantPool,

	header: Option<ClassHeader>,
	source_file: Option<JavaString>,
	enclosing_method: Option<EnclosingMethod>,
	nest_host: Option<JavaString>,
	nest_members: Vec<JavaString>,
	annotations: Vec<Annotation>,
	inner_classes: Vec<InnerClass>,

	field_count: usize,
	fields: Vec<u8>,
	method_count: usize,
	methods: Vec<u8>,
	ended: bool,
}

impl<'h> ClassWriter<'h> {
	pub fn new(hierarchy: &'h dyn TypeHierarchy, frames: FrameComputation) -> ClassWriter<'h> {
		ClassWriter::with_pool(hierarchy, frames, None, ConstantPool::new())
	}

	/// A writer sharing the constant pool of `reader`. Methods passed through unchanged are copied as they are.
	pub fn from_reader(reader: &ClassReader, hierarchy: &'h dyn TypeHierarchy, frames: FrameComputation) -> Result<ClassWriter<'h>> {
		let pool = ConstantPool::copy_from(reader.pool(), reader.pool_bytes(), reader.raw_bootstrap_methods())
			.context("failed to copy the constant pool")?;
		Ok(ClassWriter::with_pool(hierarchy, frames, Some(reader.source_id()), pool))
	}

	fn with_pool(hierarchy: &'h dyn TypeHierarchy, frames: FrameComputation, source: Option<SourceId>, pool: ConstantPool) -> ClassWriter<'h> {
		ClassWriter {
			hierarchy,
			frames,
			source,
			pool,
			header: None,
			source_file: None,
			enclosing_method: None,
			nest_host: None,
			nest_members: Vec::new(),
			annotations: Vec::new(),
			inner_classes: Vec::new(),
			field_count: 0,
			fields: Vec::new(),
			method_count: 0,
			methods: Vec::new(),
			ended: false,
		}
	}

	fn header(&self) -> Result<&ClassHeader> {
		self.header.as_ref().context("`visit_class` wasn't called")
	}

	/// Encodes the class. Fails if the class wasn't visited to its end, or if it exceeds the limits of the format.
	pub fn to_bytes(mut self) -> Result<Vec<u8>> {
		if !self.ended {
			bail!("`visit_end` wasn't called");
		}
		let header = self.header.take().context("`visit_class` wasn't called")?;
		let pool = &mut self.pool;

		let mut writer = Vec::new();
		writer.write_u16(header.access);
		writer.write_u16(pool.put_class(&header.name));
		writer.write_u16(header.super_class.as_deref().map_or(0, |class| pool.put_class(class)));
		writer.write_slice(&header.interfaces,
			|w, size| w.write_usize_as_u16(size).with_context(|| anyhow!("too many interfaces on class {:?}", header.name)),
			|w, interface| {
				w.write_u16(pool.put_class(interface));
				Ok(())
			},
		)?;

		writer.write_usize_as_u16(self.field_count).with_context(|| anyhow!("too many fields in class {:?}", header.name))?;
		writer.write_u8_slice(&self.fields);
		writer.write_usize_as_u16(self.method_count).with_context(|| anyhow!("too many methods in class {:?}", header.name))?;
		writer.write_u8_slice(&self.methods);

		let mut attribute_count = 0;
		let mut buffer = Vec::new();

		if let Some(source_file) = &self.source_file {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SOURCE_FILE, 2)?;
			buffer.write_u16(pool.put_utf8(source_file));
		}
		if let Some(enclosing_method) = &self.enclosing_method {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::ENCLOSING_METHOD, 4)?;
			buffer.write_u16(pool.put_class(&enclosing_method.class));
			buffer.write_u16(enclosing_method.method.as_ref().map_or(0, |(name, descriptor)| pool.put_name_and_type(name, descriptor)));
		}
		if let Some(signature) = &header.signature {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
			buffer.write_u16(pool.put_utf8(signature));
		}
		if header.deprecated {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
		}
		if header.synthetic {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
		}
		if let Some(nest_host) = &self.nest_host {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::NEST_HOST, 2)?;
			buffer.write_u16(pool.put_class(nest_host));
		}
		if !self.nest_members.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::NEST_MEMBERS, |w, pool| {
				w.write_slice(&self.nest_members,
					|w, len| w.write_usize_as_u16(len).context("too many nest members"),
					|w, member| {
						w.write_u16(pool.put_class(member));
						Ok(())
					},
				)
			})?;
		}
		if !self.annotations.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, |w, pool| {
				write_annotations(w, pool, &self.annotations)
			})?;
		}
		if !self.inner_classes.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::INNER_CLASSES, |w, pool| {
				w.write_slice(&self.inner_classes,
					|w, len| w.write_usize_as_u16(len).context("too many inner classes"),
					|w, inner_class| {
						w.write_u16(pool.put_class(&inner_class.inner_class));
						w.write_u16(inner_class.outer_class.as_deref().map_or(0, |class| pool.put_class(class)));
						w.write_u16(inner_class.inner_name.as_deref().map_or(0, |name| pool.put_utf8(name)));
						w.write_u16(inner_class.access);
						Ok(())
					},
				)
			})?;
		}

		// Last, as everything else may add bootstrap methods.
		if pool.has_bootstrap_methods() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::BOOTSTRAP_METHODS, |w, pool| pool.write_bootstrap_methods(w))?;
		}

		writer.write_usize_as_u16(attribute_count).context("too many attributes on class")?;
		writer.write_u8_slice(&buffer);

		// The pool goes last, as writing anything else may add entries to it.
		let mut class = Vec::with_capacity(10 + writer.len());
		class.write_u32(class_constants::MAGIC);
		class.write_u16(header.minor_version);
		class.write_u16(header.major_version);
		self.pool.write(&mut class)
			.with_context(|| anyhow!("failed to write the constant pool of class {:?}", header.name))?;
		class.write_u8_slice(&writer);

		// Only a class that made it this far is visible to others.
		self.hierarchy.register(&header.name, header.super_class.as_deref());
		Ok(class)
	}
}

/// Answers for the class being written from its header, and for everything else from the shared hierarchy.
struct WithOwnClass<'a> {
	header: &'a ClassHeader,
	hierarchy: &'a dyn TypeHierarchy,
}

impl TypeHierarchy for WithOwnClass<'_> {
	fn super_class(&self, name: &JavaStr) -> Option<JavaString> {
		if name == &*self.header.name {
			self.header.super_class.clone()
		} else {
			self.hierarchy.super_class(name)
		}
	}

	fn register(&self, name: &JavaStr, super_class: Option<&JavaStr>) {
		self.hierarchy.register(name, super_class);
	}
}

impl ClassVisitor for ClassWriter<'_> {
	type Field = FieldWriter;
	type Method = MethodWriter;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		self.header = Some(header.clone());
		Ok(ControlFlow::Continue(()))
	}

	fn visit_source(&mut self, source_file: &JavaStr) -> Result<()> {
		self.source_file = Some(source_file.to_owned());
		Ok(())
	}

	fn visit_outer_class(&mut self, enclosing_method: &EnclosingMethod) -> Result<()> {
		self.enclosing_method = Some(enclosing_method.clone());
		Ok(())
	}

	fn visit_nest_host(&mut self, nest_host: &JavaStr) -> Result<()> {
		self.nest_host = Some(nest_host.to_owned());
		Ok(())
	}

	fn visit_nest_member(&mut self, nest_member: &JavaStr) -> Result<()> {
		self.nest_members.push(nest_member.to_owned());
		Ok(())
	}

	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.annotations.push(annotation);
		Ok(())
	}

	fn visit_inner_class(&mut self, inner_class: InnerClass) -> Result<()> {
		self.inner_classes.push(inner_class);
		Ok(())
	}

	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<FieldWriter>> {
		Ok(ControlFlow::Continue(Some(FieldWriter { header: header.clone(), annotations: Vec::new() })))
	}

	fn finish_field(&mut self, field_visitor: FieldWriter) -> Result<()> {
		let name = field_visitor.header.name.clone();
		field_visitor.write(&mut self.fields, &mut self.pool)
			.with_context(|| anyhow!("failed to write field {name:?}"))?;
		self.field_count += 1;
		Ok(())
	}

	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<MethodWriter>> {
		Ok(ControlFlow::Continue(Some(MethodWriter::new(header.clone(), self.source))))
	}

	fn finish_method(&mut self, method_visitor: MethodWriter) -> Result<()> {
		let header = self.header.as_ref().context("`visit_class` wasn't called")?;
		let hierarchy = WithOwnClass { header, hierarchy: self.hierarchy };
		let context = MethodContext {
			class: &header.name,
			major_version: header.major_version,
			frames: self.frames.frames_for(header.major_version),
			hierarchy: &hierarchy,
		};
		method_visitor.write(&mut self.methods, &mut self.pool, &context)
			.with_context(|| anyhow!("failed to write method of class {:?}", header.name))?;
		self.method_count += 1;
		Ok(())
	}

	fn visit_end(&mut self) -> Visit {
		self.header()?;
		self.ended = true;
		Ok(ControlFlow::Continue(()))
	}
}
