//! Reading class files, see [`ClassReader`].

use std::ops::ControlFlow;
use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaStr;
use log::trace;
use crate::bytes::ByteReader;
use crate::class_constants::{self, attribute, version};
use crate::error::Visit;
use crate::macros::visit;
use crate::pool::read_bootstrap_methods;
use crate::reader::annotation::{read_annotations, read_parameter_annotations};
use crate::reader::code::{read_code, CodeContext};
use crate::reader::pool::{BootstrapMethodRead, PoolRead};
use crate::tree::{ClassHeader, EnclosingMethod, FieldHeader, InnerClass, MethodHeader};
use crate::visitor::{ClassVisitor, FieldVisitor, MethodVisitor, ReadOptions, SourceId};

mod annotation;
pub(crate) mod code;
mod labels;
pub(crate) mod pool;

/// Skips the `attributes_count` and `attributes` items of a field or method.
fn skip_attributes(reader: &mut ByteReader) -> Result<()> {
	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let _attribute_name_index = reader.read_u16()?;
		let attribute_length = reader.read_u32_as_usize()?;
		reader.skip(attribute_length)?;
	}
	Ok(())
}

/// Skips a `field_info` or `method_info`.
fn skip_member(reader: &mut ByteReader) -> Result<()> {
	// 2 bytes for the access flags, another 2 for the name, and another 2 for the descriptor
	reader.skip(2 + 2 + 2)?;
	skip_attributes(reader)
}

/// Reads the name and the contents of the next attribute.
fn read_attribute<'a>(reader: &mut ByteReader<'a>, pool: &PoolRead<'a>) -> Result<(&'a [u8], ByteReader<'a>)> {
	let name = pool.utf8_bytes(reader.read_u16()?)?;
	let length = reader.read_u32_as_usize()?;
	let contents = reader.read_slice(length)
		.with_context(|| anyhow!("attribute {:?} is truncated", String::from_utf8_lossy(name)))?;
	Ok((name, ByteReader::new(contents)))
}

fn is(name: &[u8], attribute: &str) -> bool {
	name == attribute.as_bytes()
}

/// A parsed class file, ready to be visited.
///
/// Creating the reader checks the header and locates the constant pool and the bootstrap methods. Everything else
/// is only decoded by [`ClassReader::accept`].
pub struct ClassReader<'a> {
	data: &'a [u8],
	source: SourceId,
	pool: PoolRead<'a>,
	/// The offset of `access_flags`, directly after the constant pool.
	header_start: usize,
	minor_version: u16,
	major_version: u16,
	/// The `bootstrap_methods` array of the `BootstrapMethods` attribute without its count, and its entries.
	bootstrap_methods: Option<(&'a [u8], Vec<BootstrapMethodRead>)>,
}

impl<'a> ClassReader<'a> {
	pub fn new(data: &'a [u8]) -> Result<ClassReader<'a>> {
		let mut reader = ByteReader::new(data);

		let magic = reader.read_u32()?;
		if magic != class_constants::MAGIC {
			bail!("wrong magic: got {magic:#x}, expected 0xCAFEBABE");
		}

		let minor_version = reader.read_u16()?;
		let major_version = reader.read_u16()?;
		if major_version > version::NEWEST {
			bail!("unsupported class file version: {major_version}.{minor_version}");
		}

		let pool = PoolRead::read(&mut reader)?;
		let header_start = reader.position();

		// The bootstrap methods are needed for reading any loadable constant, so locate them up front.
		reader.skip(2 + 2 + 2)?;
		let interfaces_count = reader.read_u16_as_usize()?;
		reader.skip(interfaces_count * 2)?;
		for _ in 0..reader.read_u16()? {
			skip_member(&mut reader).context("failed to skip field")?;
		}
		for _ in 0..reader.read_u16()? {
			skip_member(&mut reader).context("failed to skip method")?;
		}

		let mut bootstrap_methods = None;
		for _ in 0..reader.read_u16()? {
			let (name, attribute) = read_attribute(&mut reader, &pool)?;
			if is(name, attribute::BOOTSTRAP_METHODS) {
				if bootstrap_methods.is_some() {
					bail!("only one `BootstrapMethods` attribute is allowed");
				}
				let contents = attribute.data();
				let methods = read_bootstrap_methods(contents)?;
				let raw = contents.get(2..).context("`BootstrapMethods` attribute without count")?;
				bootstrap_methods = Some((raw, methods));
			}
		}

		Ok(ClassReader {
			data,
			source: SourceId::next(),
			pool,
			header_start,
			minor_version,
			major_version,
			bootstrap_methods,
		})
	}

	/// Identifies this reader to writers created from it.
	pub fn source_id(&self) -> SourceId {
		self.source
	}

	pub fn major_version(&self) -> u16 {
		self.major_version
	}

	pub fn minor_version(&self) -> u16 {
		self.minor_version
	}

	pub fn access(&self) -> Result<u16> {
		ByteReader::at(self.data, self.header_start)?.read_u16()
	}

	/// The internal name of the class.
	pub fn class_name(&self) -> Result<&JavaStr> {
		let index = ByteReader::at(self.data, self.header_start + 2)?.read_u16()?;
		self.pool.class(index)
	}

	pub fn super_class(&self) -> Result<Option<&JavaStr>> {
		let index = ByteReader::at(self.data, self.header_start + 4)?.read_u16()?;
		self.pool.optional_class(index)
	}

	pub(crate) fn pool(&self) -> &PoolRead<'a> {
		&self.pool
	}

	/// The encoded constant pool entries, without `constant_pool_count`.
	pub(crate) fn pool_bytes(&self) -> &'a [u8] {
		// magic, minor_version, major_version and constant_pool_count
		&self.data[10..self.header_start]
	}

	pub(crate) fn raw_bootstrap_methods(&self) -> Option<(&'a [u8], &[BootstrapMethodRead])> {
		self.bootstrap_methods.as_ref().map(|(raw, methods)| (*raw, methods.as_slice()))
	}

	fn bootstrap_methods(&self) -> &[BootstrapMethodRead] {
		self.bootstrap_methods.as_ref().map_or(&[][..], |(_, methods)| methods.as_slice())
	}

	/// Visits the class. Returns [`ControlFlow::Break`] if the visitor abandoned the class, nothing is visited
	/// after that.
	pub fn accept<V: ClassVisitor>(&self, visitor: &mut V, options: ReadOptions) -> Visit {
		let pool = &self.pool;
		let mut reader = ByteReader::at(self.data, self.header_start)?;

		let access = reader.read_u16()?;
		let name = pool.class(reader.read_u16()?)?;
		let super_class = pool.optional_class(reader.read_u16()?)?.map(JavaStr::to_owned);
		let interfaces = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(pool.class(r.read_u16()?)?.to_owned()),
		)?;

		let mut header = ClassHeader::new(self.major_version, access, name, super_class);
		header.minor_version = self.minor_version;
		header.interfaces = interfaces;

		// We take a reference to the start of the fields and methods so that we can read them after the attributes
		// of the class itself.
		let fields_start = reader.position();
		for _ in 0..reader.read_u16()? {
			skip_member(&mut reader)?;
		}
		for _ in 0..reader.read_u16()? {
			skip_member(&mut reader)?;
		}

		let mut source_file = None;
		let mut enclosing_method = None;
		let mut nest_host = None;
		let mut nest_members = Vec::new();
		let mut annotations = Vec::new();
		let mut inner_classes = Vec::new();

		for _ in 0..reader.read_u16()? {
			let (attribute_name, mut r) = read_attribute(&mut reader, pool)?;
			match attribute_name {
				n if is(n, attribute::SOURCE_FILE) && !options.skip_debug => {
					source_file = Some(pool.utf8(r.read_u16()?)?);
				},
				n if is(n, attribute::ENCLOSING_METHOD) => {
					let class = pool.class(r.read_u16()?)?.to_owned();
					let method = match r.read_u16()? {
						0 => None,
						index => {
							let (name, descriptor) = pool.name_and_type(index)?;
							Some((name.to_owned(), descriptor.to_owned()))
						},
					};
					enclosing_method = Some(EnclosingMethod { class, method });
				},
				n if is(n, attribute::SIGNATURE) => {
					header.signature = Some(pool.utf8(r.read_u16()?)?.to_owned());
				},
				n if is(n, attribute::DEPRECATED) => header.deprecated = true,
				n if is(n, attribute::SYNTHETIC) => header.synthetic = true,
				n if is(n, attribute::INNER_CLASSES) && !options.skip_inner_classes => {
					inner_classes = r.read_vec(
						|r| r.read_u16_as_usize(),
						|r| Ok(InnerClass {
							inner_class: pool.class(r.read_u16()?)?.to_owned(),
							outer_class: pool.optional_class(r.read_u16()?)?.map(JavaStr::to_owned),
							inner_name: pool.optional_utf8(r.read_u16()?)?.map(JavaStr::to_owned),
							access: r.read_u16()?,
						}),
					)?;
				},
				n if is(n, attribute::NEST_HOST) => {
					nest_host = Some(pool.class(r.read_u16()?)?);
				},
				n if is(n, attribute::NEST_MEMBERS) => {
					nest_members = r.read_vec(
						|r| r.read_u16_as_usize(),
						|r| pool.class(r.read_u16()?),
					)?;
				},
				n if is(n, attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
					annotations = read_annotations(&mut r, pool)
						.with_context(|| anyhow!("failed to read annotations of class {name:?}"))?;
				},
				_ => {},
			}
		}

		visit!(visitor.visit_class(&header));
		if let Some(source_file) = source_file {
			visitor.visit_source(source_file)?;
		}
		if let Some(enclosing_method) = &enclosing_method {
			visitor.visit_outer_class(enclosing_method)?;
		}
		if let Some(nest_host) = nest_host {
			visitor.visit_nest_host(nest_host)?;
		}
		for nest_member in nest_members {
			visitor.visit_nest_member(nest_member)?;
		}
		for annotation in annotations {
			visitor.visit_annotation(annotation)?;
		}
		for inner_class in inner_classes {
			visitor.visit_inner_class(inner_class)?;
		}

		let mut reader = ByteReader::at(self.data, fields_start)?;
		for _ in 0..reader.read_u16()? {
			visit!(self.read_field(&mut reader, visitor)
				.with_context(|| anyhow!("failed to read field of class {name:?}")));
		}
		let context = CodeContext {
			pool,
			bootstrap_methods: self.bootstrap_methods(),
			class: name,
			options,
		};
		for _ in 0..reader.read_u16()? {
			visit!(self.read_method(&mut reader, visitor, &context)
				.with_context(|| anyhow!("failed to read method of class {name:?}")));
		}

		visitor.visit_end()
	}

	fn read_field<V: ClassVisitor>(&self, reader: &mut ByteReader<'a>, visitor: &mut V) -> Visit {
		let pool = &self.pool;

		let access = reader.read_u16()?;
		let name = pool.utf8(reader.read_u16()?)?;
		let descriptor = pool.utf8(reader.read_u16()?)?;
		let mut header = FieldHeader::new(access, name, descriptor);
		let mut annotations = Vec::new();

		for _ in 0..reader.read_u16()? {
			let (attribute_name, mut r) = read_attribute(reader, pool)?;
			match attribute_name {
				n if is(n, attribute::CONSTANT_VALUE) => {
					header.constant_value = Some(pool.constant_value(r.read_u16()?)?);
				},
				n if is(n, attribute::SIGNATURE) => {
					header.signature = Some(pool.utf8(r.read_u16()?)?.to_owned());
				},
				n if is(n, attribute::DEPRECATED) => header.deprecated = true,
				n if is(n, attribute::SYNTHETIC) => header.synthetic = true,
				n if is(n, attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
					annotations = read_annotations(&mut r, pool)?;
				},
				_ => {},
			}
		}

		if let Some(mut field_visitor) = visit!(visitor.visit_field(&header)) {
			for annotation in annotations {
				field_visitor.visit_annotation(annotation)?;
			}
			visitor.finish_field(field_visitor)?;
		}
		Ok(ControlFlow::Continue(()))
	}

	fn read_method<V: ClassVisitor>(&self, reader: &mut ByteReader<'a>, visitor: &mut V, context: &CodeContext) -> Visit {
		let pool = &self.pool;
		let start = reader.position();

		let access = reader.read_u16()?;
		let name = pool.utf8(reader.read_u16()?)?;
		let descriptor = pool.utf8(reader.read_u16()?)?;
		let mut header = MethodHeader::new(access, name, descriptor);
		let mut code = None;
		let mut annotations = Vec::new();
		let mut parameter_annotations = None;

		for _ in 0..reader.read_u16()? {
			let (attribute_name, mut r) = read_attribute(reader, pool)?;
			match attribute_name {
				n if is(n, attribute::CODE) => {
					if code.is_some() {
						bail!("only one `Code` attribute is allowed");
					}
					code = Some(r);
				},
				n if is(n, attribute::EXCEPTIONS) => {
					header.exceptions = r.read_vec(
						|r| r.read_u16_as_usize(),
						|r| Ok(pool.class(r.read_u16()?)?.to_owned()),
					)?;
				},
				n if is(n, attribute::SIGNATURE) => {
					header.signature = Some(pool.utf8(r.read_u16()?)?.to_owned());
				},
				n if is(n, attribute::DEPRECATED) => header.deprecated = true,
				n if is(n, attribute::SYNTHETIC) => header.synthetic = true,
				n if is(n, attribute::RUNTIME_VISIBLE_ANNOTATIONS) => {
					annotations = read_annotations(&mut r, pool)?;
				},
				n if is(n, attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS) => {
					parameter_annotations = Some(read_parameter_annotations(&mut r, pool)?);
				},
				_ => {},
			}
		}
		let raw = &self.data[start..reader.position()];

		let Some(mut method_visitor) = visit!(visitor.visit_method(&header)) else {
			return Ok(ControlFlow::Continue(()));
		};

		if method_visitor.copy_verbatim(self.source, &header, raw) {
			trace!("copying method {name:?} {descriptor:?} verbatim");
			visitor.finish_method(method_visitor)?;
			return Ok(ControlFlow::Continue(()));
		}

		for annotation in annotations {
			method_visitor.visit_annotation(annotation)?;
		}
		if let Some(parameter_annotations) = parameter_annotations {
			method_visitor.visit_parameter_annotations(parameter_annotations)?;
		}
		if let Some(mut code) = code.filter(|_| !context.options.skip_code) {
			read_code(&mut code, context, &header, &mut method_visitor)
				.with_context(|| anyhow!("failed to read code of method {name:?} {descriptor:?}"))?;
		}

		visitor.finish_method(method_visitor)?;
		Ok(ControlFlow::Continue(()))
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::reader::ClassReader;

	#[test]
	fn wrong_magic() {
		let error = ClassReader::new(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).err().map(|e| e.to_string());
		assert_eq!(error.as_deref(), Some("wrong magic: got 0xcafebabf, expected 0xCAFEBABE"));
	}

	#[test]
	fn unsupported_version() {
		assert!(ClassReader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 99, 0, 1]).is_err());
	}

	#[test]
	fn truncated_class() {
		// the pool claims two entries, but there's nothing after the count
		assert!(ClassReader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 2]).is_err());
	}

	#[test]
	fn minimal_class() -> Result<()> {
		let bytes = [
			0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52,
			0, 5,
			1, 0, 3, b'a', b'/', b'B',
			7, 0, 1,
			1, 0, 16, b'j', b'a', b'v', b'a', b'/', b'l', b'a', b'n', b'g', b'/', b'O', b'b', b'j', b'e', b'c', b't',
			7, 0, 3,
			0, 0x21, 0, 2, 0, 4,
			0, 0,
			0, 0,
			0, 0,
			0, 0,
		];
		let reader = ClassReader::new(&bytes)?;
		assert_eq!(reader.major_version(), 52);
		assert_eq!(reader.class_name()?, JavaStr::from_str("a/B"));
		assert_eq!(reader.super_class()?.map(|s| s.to_owned()), Some("java/lang/Object".into()));
		assert_eq!(reader.access()?, 0x21);
		Ok(())
	}
}
