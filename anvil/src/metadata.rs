//! A summary of a class file: its header, and the signatures and annotations of its members.

use std::collections::HashMap;
use std::ops::ControlFlow;
use anyhow::{bail, Result};
use java_string::JavaString;
use crate::descriptor::parse_method;
use crate::error::Visit;
use crate::reader::ClassReader;
use crate::tree::annotation::Annotation;
use crate::tree::code::LocalVariable;
use crate::tree::{ClassHeader, FieldHeader, MethodHeader};
use crate::visitor::{ClassVisitor, FieldVisitor, MethodVisitor, ReadOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
	pub minor_version: u16,
	pub major_version: u16,
	pub access: u16,
	pub name: JavaString,
	pub super_class: Option<JavaString>,
	pub interfaces: Vec<JavaString>,
	pub signature: Option<JavaString>,
	/// The descriptors of the annotations on the class.
	pub annotations: Vec<JavaString>,
	pub fields: Vec<FieldMetadata>,
	pub methods: Vec<MethodMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
	pub access: u16,
	pub name: JavaString,
	pub descriptor: JavaString,
	pub signature: Option<JavaString>,
	pub annotations: Vec<JavaString>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
	pub access: u16,
	pub name: JavaString,
	pub descriptor: JavaString,
	pub signature: Option<JavaString>,
	pub exceptions: Vec<JavaString>,
	pub annotations: Vec<JavaString>,
	/// One entry per parameter, from the local variable table. `None` if the table doesn't name it.
	pub parameter_names: Vec<Option<JavaString>>,
}

impl ClassMetadata {
	pub fn read(bytes: &[u8]) -> Result<ClassMetadata> {
		let reader = ClassReader::new(bytes)?;
		let mut collector = Collector { class: None };
		let options = ReadOptions { skip_inner_classes: true, ..ReadOptions::default() };
		if reader.accept(&mut collector, options)?.is_break() {
			bail!("reading the class metadata was abandoned");
		}
		match collector.class {
			Some(class) => Ok(class),
			None => bail!("class wasn't visited"),
		}
	}
}

struct Collector {
	class: Option<ClassMetadata>,
}

impl Collector {
	fn class(&mut self) -> Result<&mut ClassMetadata> {
		match &mut self.class {
			Some(class) => Ok(class),
			None => bail!("member visited before the class"),
		}
	}
}

struct MethodCollector {
	method: MethodMetadata,
	/// The local variable index of each parameter.
	slots: Vec<u16>,
	names: HashMap<u16, JavaString>,
}

impl ClassVisitor for Collector {
	type Field = FieldMetadata;
	type Method = MethodCollector;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		self.class = Some(ClassMetadata {
			minor_version: header.minor_version,
			major_version: header.major_version,
			access: header.access,
			name: header.name.clone(),
			super_class: header.super_class.clone(),
			interfaces: header.interfaces.clone(),
			signature: header.signature.clone(),
			annotations: Vec::new(),
			fields: Vec::new(),
			methods: Vec::new(),
		});
		Ok(ControlFlow::Continue(()))
	}

	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.class()?.annotations.push(annotation.annotation_type);
		Ok(())
	}

	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<FieldMetadata>> {
		Ok(ControlFlow::Continue(Some(FieldMetadata {
			access: header.access,
			name: header.name.clone(),
			descriptor: header.descriptor.clone(),
			signature: header.signature.clone(),
			annotations: Vec::new(),
		})))
	}

	fn finish_field(&mut self, field_visitor: FieldMetadata) -> Result<()> {
		self.class()?.fields.push(field_visitor);
		Ok(())
	}

	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<MethodCollector>> {
		let mut slot = if header.is_static() { 0 } else { 1 };
		let mut slots = Vec::new();
		for parameter in parse_method(&header.descriptor)?.parameters {
			slots.push(slot);
			slot += parameter.size();
		}

		Ok(ControlFlow::Continue(Some(MethodCollector {
			method: MethodMetadata {
				access: header.access,
				name: header.name.clone(),
				descriptor: header.descriptor.clone(),
				signature: header.signature.clone(),
				exceptions: header.exceptions.clone(),
				annotations: Vec::new(),
				parameter_names: Vec::new(),
			},
			slots,
			names: HashMap::new(),
		})))
	}

	fn finish_method(&mut self, method_visitor: MethodCollector) -> Result<()> {
		let MethodCollector { mut method, slots, mut names } = method_visitor;
		method.parameter_names = slots.iter()
			.map(|slot| names.remove(slot))
			.collect();
		self.class()?.methods.push(method);
		Ok(())
	}

	fn visit_end(&mut self) -> Visit {
		Ok(ControlFlow::Continue(()))
	}
}

impl FieldVisitor for FieldMetadata {
	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.annotations.push(annotation.annotation_type);
		Ok(())
	}
}

impl MethodVisitor for MethodCollector {
	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.method.annotations.push(annotation.annotation_type);
		Ok(())
	}

	fn visit_local_variable(&mut self, local_variable: LocalVariable) -> Result<()> {
		// the first entry for a slot is the one starting with the method
		if self.slots.contains(&local_variable.index) {
			self.names.entry(local_variable.index).or_insert(local_variable.name);
		}
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use std::ops::ControlFlow;
	use anyhow::{bail, Result};
	use java_string::JavaString;
	use pretty_assertions::assert_eq;
	use crate::class_constants::{access, opcode, version};
	use crate::hierarchy::SuperClassMap;
	use crate::metadata::ClassMetadata;
	use crate::tree::annotation::Annotation;
	use crate::tree::code::{Instruction, Label, LocalVariable};
	use crate::tree::{ClassHeader, MethodHeader};
	use crate::visitor::{ClassVisitor, MethodVisitor};
	use crate::writer::{ClassWriter, FrameComputation};

	#[test]
	fn parameter_names_skip_this() -> Result<()> {
		let hierarchy = SuperClassMap::with_platform_classes();
		let mut writer = ClassWriter::new(&hierarchy, FrameComputation::Auto);
		let header = ClassHeader::new(version::V1_8, access::PUBLIC, "a/Named", Some(JavaString::from("java/lang/Object")));
		if writer.visit_class(&header)?.is_break() {
			bail!("writer abandoned the class");
		}
		writer.visit_annotation(Annotation::new("La/Marker;"))?;

		let method = MethodHeader::new(access::PUBLIC, "add", "(JI)V");
		let ControlFlow::Continue(Some(mut m)) = writer.visit_method(&method)? else {
			bail!("writer skipped the method");
		};
		let (start, end) = (Label::new(), Label::new());
		m.visit_label(start)?;
		m.visit_instruction(Instruction::Simple(opcode::RETURN))?;
		m.visit_label(end)?;
		for (name, descriptor, index) in [("this", "La/Named;", 0), ("total", "J", 1), ("count", "I", 3)] {
			m.visit_local_variable(LocalVariable {
				name: name.into(),
				descriptor: descriptor.into(),
				signature: None,
				start,
				end,
				index,
			})?;
		}
		writer.finish_method(m)?;
		if writer.visit_end()?.is_break() {
			bail!("writer abandoned the class at its end");
		}

		let metadata = ClassMetadata::read(&writer.to_bytes()?)?;
		assert_eq!(metadata.name, JavaString::from("a/Named"));
		assert_eq!(metadata.annotations, vec![JavaString::from("La/Marker;")]);
		assert_eq!(metadata.methods.len(), 1);
		assert_eq!(metadata.methods[0].parameter_names, vec![Some(JavaString::from("total")), Some(JavaString::from("count"))]);
		Ok(())
	}
}
