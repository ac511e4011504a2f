mod common;

use std::ops::ControlFlow;
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use pretty_assertions::assert_eq;
use anvil::class_constants::pool::method_handle_reference;
use anvil::class_constants::{access, opcode};
use anvil::tree::annotation::Annotation;
use anvil::tree::code::{Dynamic, Handle, Instruction, Label, Loadable, LocalVariable, MemberRef, StackMapFrame, TryCatch};
use anvil::tree::{ClassHeader, ConstantValue, FieldHeader, MethodHeader};
use anvil::{ClassReader, ClassVisitor, ClassWriter, FieldWriter, FrameComputation, MethodVisitor, MethodWriter, ReadOptions, SourceId, SuperClassMap, Visit};
use common::{method, write_java_8_class, Recorder};

const STATIC: u16 = access::PUBLIC | access::STATIC;

/// A class using most of what the writer supports.
fn sample(hierarchy: &SuperClassMap) -> Result<Vec<u8>> {
	write_java_8_class(hierarchy, "a/Sample", |writer| {
		writer.visit_source(JavaStr::from_str("Sample.java"))?;
		writer.visit_annotation(Annotation::new("La/Marker;"))?;

		let mut limit = FieldHeader::new(STATIC | access::FINAL, "LIMIT", "I");
		limit.constant_value = Some(ConstantValue::Integer(100_000));
		if let ControlFlow::Continue(Some(field)) = writer.visit_field(&limit)? {
			writer.finish_field(field)?;
		}

		method(writer, MethodHeader::new(STATIC, "classify", "(I)I"), |m| {
			let (low, high, fallback) = (Label::new(), Label::new(), Label::new());
			m.visit_line_number(3, low)?;
			m.visit_instruction(Instruction::Var { opcode: opcode::ILOAD, index: 0 })?;
			m.visit_instruction(Instruction::TableSwitch { default: fallback, low: 1, high: 2, targets: vec![low, high] })?;
			m.visit_label(low)?;
			m.visit_instruction(Instruction::Int { opcode: opcode::BIPUSH, operand: 10 })?;
			m.visit_instruction(Instruction::Simple(opcode::IRETURN))?;
			m.visit_label(high)?;
			m.visit_instruction(Instruction::Ldc(Loadable::Integer(100_000)))?;
			m.visit_instruction(Instruction::Simple(opcode::IRETURN))?;
			m.visit_label(fallback)?;
			m.visit_instruction(Instruction::Simple(opcode::ICONST_0))?;
			m.visit_instruction(Instruction::Simple(opcode::IRETURN))
		})?;

		method(writer, MethodHeader::new(STATIC, "greeter", "()Ljava/util/function/Supplier;"), |m| {
			let bootstrap = Handle {
				kind: method_handle_reference::INVOKE_STATIC,
				member: MemberRef::new(
					"java/lang/invoke/LambdaMetafactory",
					"metafactory",
					"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
				),
				interface: false,
			};
			let target = Handle {
				kind: method_handle_reference::INVOKE_STATIC,
				member: MemberRef::new("a/Sample", "greeting", "()Ljava/lang/Object;"),
				interface: false,
			};
			m.visit_instruction(Instruction::InvokeDynamic(Dynamic {
				name: "get".into(),
				descriptor: "()Ljava/util/function/Supplier;".into(),
				bootstrap,
				arguments: vec![
					Loadable::MethodType("()Ljava/lang/Object;".into()),
					Loadable::MethodHandle(target),
					Loadable::MethodType("()Ljava/lang/Object;".into()),
				],
			}))?;
			m.visit_instruction(Instruction::Simple(opcode::ARETURN))
		})?;

		method(writer, MethodHeader::new(STATIC, "greeting", "()Ljava/lang/Object;"), |m| {
			let (start, end, handler, done, last) = (Label::new(), Label::new(), Label::new(), Label::new(), Label::new());
			m.visit_try_catch(TryCatch { start, end, handler, catch_type: None })?;
			m.visit_label(start)?;
			m.visit_instruction(Instruction::Ldc(Loadable::String("hello".into())))?;
			m.visit_instruction(Instruction::Var { opcode: opcode::ASTORE, index: 0 })?;
			m.visit_label(end)?;
			m.visit_instruction(Instruction::Jump { opcode: opcode::GOTO, target: done })?;
			m.visit_label(handler)?;
			m.visit_instruction(Instruction::Simple(opcode::POP))?;
			m.visit_instruction(Instruction::Ldc(Loadable::Long(7)))?;
			m.visit_instruction(Instruction::Simple(opcode::L2I))?;
			m.visit_instruction(Instruction::Simple(opcode::POP))?;
			m.visit_instruction(Instruction::Ldc(Loadable::Class("a/Sample".into())))?;
			m.visit_instruction(Instruction::Var { opcode: opcode::ASTORE, index: 0 })?;
			m.visit_label(done)?;
			m.visit_instruction(Instruction::Var { opcode: opcode::ALOAD, index: 0 })?;
			m.visit_instruction(Instruction::Simple(opcode::ARETURN))?;
			m.visit_label(last)?;
			m.visit_local_variable(LocalVariable {
				name: "value".into(),
				descriptor: "Ljava/lang/Object;".into(),
				signature: None,
				start: done,
				end: last,
				index: 0,
			})
		})
	})
}

fn rewrite(bytes: &[u8], hierarchy: &SuperClassMap) -> Result<Vec<u8>> {
	let reader = ClassReader::new(bytes)?;
	let mut writer = ClassWriter::new(hierarchy, FrameComputation::Auto);
	if reader.accept(&mut writer, ReadOptions::default())?.is_break() {
		bail!("the writer never abandons");
	}
	writer.to_bytes()
}

#[test]
fn rewriting_reaches_a_fixed_point() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let original = sample(&hierarchy)?;

	let once = rewrite(&original, &hierarchy)?;
	let twice = rewrite(&once, &hierarchy)?;
	assert_eq!(once, twice);

	let (before, after) = (Recorder::read(&original)?, Recorder::read(&once)?);
	assert_eq!(before.fields, after.fields);
	for (a, b) in before.methods.iter().zip(&after.methods) {
		assert_eq!(a.name, b.name);
		assert_eq!(a.opcodes(), b.opcodes());
		assert_eq!(a.frames, b.frames);
		assert_eq!((a.max_stack, a.max_locals), (b.max_stack, b.max_locals));
	}
	Ok(())
}

#[test]
fn untouched_class_is_copied_byte_for_byte() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let original = sample(&hierarchy)?;

	let reader = ClassReader::new(&original)?;
	let mut writer = ClassWriter::from_reader(&reader, &hierarchy, FrameComputation::Auto)?;
	if reader.accept(&mut writer, ReadOptions::default())?.is_break() {
		bail!("the writer never abandons");
	}
	assert_eq!(writer.to_bytes()?, original);
	Ok(())
}

/// Forwards to a writer, replacing `iconst_0` by `iconst_1` in one method.
struct ChangeOne<'w, 'h> {
	writer: &'w mut ClassWriter<'h>,
	method: &'static str,
}

struct ChangeConstants {
	writer: MethodWriter,
	active: bool,
}

impl ClassVisitor for ChangeOne<'_, '_> {
	type Field = FieldWriter;
	type Method = ChangeConstants;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		self.writer.visit_class(header)
	}

	fn visit_source(&mut self, source_file: &JavaStr) -> Result<()> {
		self.writer.visit_source(source_file)
	}

	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.writer.visit_annotation(annotation)
	}

	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<FieldWriter>> {
		self.writer.visit_field(header)
	}

	fn finish_field(&mut self, field_visitor: FieldWriter) -> Result<()> {
		self.writer.finish_field(field_visitor)
	}

	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<ChangeConstants>> {
		let active = header.name == JavaStr::from_str(self.method);
		Ok(match self.writer.visit_method(header)? {
			ControlFlow::Continue(writer) => ControlFlow::Continue(writer.map(|writer| ChangeConstants { writer, active })),
			ControlFlow::Break(abandoned) => ControlFlow::Break(abandoned),
		})
	}

	fn finish_method(&mut self, method_visitor: ChangeConstants) -> Result<()> {
		self.writer.finish_method(method_visitor.writer)
	}

	fn visit_end(&mut self) -> Visit {
		self.writer.visit_end()
	}
}

impl MethodVisitor for ChangeConstants {
	fn copy_verbatim(&mut self, source: SourceId, header: &MethodHeader, raw: &[u8]) -> bool {
		!self.active && self.writer.copy_verbatim(source, header, raw)
	}
	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.writer.visit_annotation(annotation)
	}
	fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<()> {
		self.writer.visit_try_catch(try_catch)
	}
	fn visit_label(&mut self, label: Label) -> Result<()> {
		self.writer.visit_label(label)
	}
	fn visit_debug_label(&mut self, label: Label) -> Result<()> {
		self.writer.visit_debug_label(label)
	}
	fn visit_line_number(&mut self, line: u16, start: Label) -> Result<()> {
		self.writer.visit_line_number(line, start)
	}
	fn visit_frame(&mut self, frame: StackMapFrame) -> Result<()> {
		self.writer.visit_frame(frame)
	}
	fn visit_instruction(&mut self, instruction: Instruction) -> Result<()> {
		match instruction {
			Instruction::Simple(opcode::ICONST_0) if self.active => self.writer.visit_instruction(Instruction::Simple(opcode::ICONST_1)),
			instruction => self.writer.visit_instruction(instruction),
		}
	}
	fn visit_local_variable(&mut self, local_variable: LocalVariable) -> Result<()> {
		self.writer.visit_local_variable(local_variable)
	}
	fn visit_max_stack(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
		self.writer.visit_max_stack(max_stack, max_locals)
	}
}

#[test]
fn changed_method_is_reassembled_and_the_rest_copied() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let original = sample(&hierarchy)?;

	let reader = ClassReader::new(&original)?;
	let mut writer = ClassWriter::from_reader(&reader, &hierarchy, FrameComputation::Auto)?;
	let mut change = ChangeOne { writer: &mut writer, method: "classify" };
	if reader.accept(&mut change, ReadOptions::default())?.is_break() {
		bail!("nothing abandons here");
	}
	let changed = writer.to_bytes()?;
	assert_ne!(changed, original);

	let (before, after) = (Recorder::read(&original)?, Recorder::read(&changed)?);
	let classify = after.method("classify")?;
	assert_eq!(classify.instructions.iter().filter(|i| **i == Instruction::Simple(opcode::ICONST_1)).count(), 1);
	assert_eq!(classify.instructions.iter().filter(|i| **i == Instruction::Simple(opcode::ICONST_0)).count(), 0);
	assert_eq!(classify.frames, before.method("classify")?.frames);

	for name in ["greeter", "greeting"] {
		let (a, b) = (before.method(name)?, after.method(name)?);
		assert_eq!(a.instructions, b.instructions);
		assert_eq!(a.frames, b.frames);
	}
	Ok(())
}

#[test]
fn skipped_methods_are_dropped() -> Result<()> {
	struct DropGreeter<'w, 'h>(&'w mut ClassWriter<'h>);

	impl ClassVisitor for DropGreeter<'_, '_> {
		type Field = FieldWriter;
		type Method = MethodWriter;

		fn visit_class(&mut self, header: &ClassHeader) -> Visit {
			self.0.visit_class(header)
		}
		fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<FieldWriter>> {
			self.0.visit_field(header)
		}
		fn finish_field(&mut self, field_visitor: FieldWriter) -> Result<()> {
			self.0.finish_field(field_visitor)
		}
		fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<MethodWriter>> {
			if header.name == JavaStr::from_str("greeter") {
				return Ok(ControlFlow::Continue(None));
			}
			self.0.visit_method(header)
		}
		fn finish_method(&mut self, method_visitor: MethodWriter) -> Result<()> {
			self.0.finish_method(method_visitor)
		}
		fn visit_end(&mut self) -> Visit {
			self.0.visit_end()
		}
	}

	let hierarchy = SuperClassMap::with_platform_classes();
	let original = sample(&hierarchy)?;
	let reader = ClassReader::new(&original)?;
	let mut writer = ClassWriter::from_reader(&reader, &hierarchy, FrameComputation::Auto)?;
	if reader.accept(&mut DropGreeter(&mut writer), ReadOptions::default())?.is_break() {
		bail!("nothing abandons here");
	}

	let recorder = Recorder::read(&writer.to_bytes()?)?;
	let names: Vec<_> = recorder.methods.iter().map(|m| m.name.clone()).collect();
	assert_eq!(names, vec![JavaString::from("classify"), JavaString::from("greeting")]);
	Ok(())
}
