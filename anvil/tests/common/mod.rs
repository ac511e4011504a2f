#![allow(dead_code)]

use std::ops::ControlFlow;
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use anvil::class_constants::{access, version};
use anvil::tree::code::{Instruction, StackMapFrame, TryCatch};
use anvil::tree::{ClassHeader, FieldHeader, MethodHeader};
use anvil::{ClassReader, ClassVisitor, ClassWriter, FrameComputation, MethodVisitor, MethodWriter, ReadOptions, TypeHierarchy, Visit};

pub fn object() -> Option<JavaString> {
	Some(JavaString::from("java/lang/Object"))
}

/// Writes a public class `name` with the methods written by `methods`.
pub fn write_class(
	hierarchy: &dyn TypeHierarchy,
	frames: FrameComputation,
	major_version: u16,
	name: &str,
	methods: impl FnOnce(&mut ClassWriter) -> Result<()>,
) -> Result<Vec<u8>> {
	let mut writer = ClassWriter::new(hierarchy, frames);
	if writer.visit_class(&ClassHeader::new(major_version, access::PUBLIC | access::SUPER, name, object()))?.is_break() {
		bail!("writer abandoned class {name:?}");
	}
	methods(&mut writer)?;
	if writer.visit_end()?.is_break() {
		bail!("writer abandoned class {name:?} at its end");
	}
	writer.to_bytes()
}

pub fn write_java_8_class(
	hierarchy: &dyn TypeHierarchy,
	name: &str,
	methods: impl FnOnce(&mut ClassWriter) -> Result<()>,
) -> Result<Vec<u8>> {
	write_class(hierarchy, FrameComputation::Auto, version::V1_8, name, methods)
}

/// Visits a method on the writer, lets `code` fill it and finishes it.
pub fn method(
	writer: &mut ClassWriter,
	header: MethodHeader,
	code: impl FnOnce(&mut MethodWriter) -> Result<()>,
) -> Result<()> {
	let ControlFlow::Continue(Some(mut method)) = writer.visit_method(&header)? else {
		bail!("writer skipped method {:?}", header.name);
	};
	code(&mut method)?;
	writer.finish_method(method)
}

/// What a reader reported about a method.
#[derive(Debug, Default)]
pub struct RecordedMethod {
	pub name: JavaString,
	pub descriptor: JavaString,
	pub instructions: Vec<Instruction>,
	pub frames: Vec<StackMapFrame>,
	pub try_catches: Vec<TryCatch>,
	pub max_stack: u16,
	pub max_locals: u16,
}

impl RecordedMethod {
	pub fn opcodes(&self) -> Vec<u8> {
		self.instructions.iter().map(Instruction::opcode).collect()
	}
}

impl MethodVisitor for RecordedMethod {
	fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<()> {
		self.try_catches.push(try_catch);
		Ok(())
	}

	fn visit_frame(&mut self, frame: StackMapFrame) -> Result<()> {
		self.frames.push(frame);
		Ok(())
	}

	fn visit_instruction(&mut self, instruction: Instruction) -> Result<()> {
		self.instructions.push(instruction);
		Ok(())
	}

	fn visit_max_stack(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
		self.max_stack = max_stack;
		self.max_locals = max_locals;
		Ok(())
	}
}

/// Collects the headers and method bodies of a class.
#[derive(Debug, Default)]
pub struct Recorder {
	pub header: Option<ClassHeader>,
	pub fields: Vec<FieldHeader>,
	pub methods: Vec<RecordedMethod>,
}

impl Recorder {
	pub fn read(bytes: &[u8]) -> Result<Recorder> {
		let mut recorder = Recorder::default();
		let flow = ClassReader::new(bytes)?.accept(&mut recorder, ReadOptions { frames: true, ..ReadOptions::default() })?;
		if flow.is_break() {
			bail!("the recorder never abandons");
		}
		Ok(recorder)
	}

	pub fn method(&self, name: &str) -> Result<&RecordedMethod> {
		match self.methods.iter().find(|method| method.name == JavaStr::from_str(name)) {
			Some(method) => Ok(method),
			None => bail!("no method {name:?}"),
		}
	}
}

impl ClassVisitor for Recorder {
	type Field = ();
	type Method = RecordedMethod;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		self.header = Some(header.clone());
		Ok(ControlFlow::Continue(()))
	}

	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<()>> {
		self.fields.push(header.clone());
		Ok(ControlFlow::Continue(Some(())))
	}

	fn finish_field(&mut self, _field_visitor: ()) -> Result<()> {
		Ok(())
	}

	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<RecordedMethod>> {
		Ok(ControlFlow::Continue(Some(RecordedMethod {
			name: header.name.clone(),
			descriptor: header.descriptor.clone(),
			..RecordedMethod::default()
		})))
	}

	fn finish_method(&mut self, method_visitor: RecordedMethod) -> Result<()> {
		self.methods.push(method_visitor);
		Ok(())
	}

	fn visit_end(&mut self) -> Visit {
		Ok(ControlFlow::Continue(()))
	}
}
