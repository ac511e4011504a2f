mod common;

use std::ops::ControlFlow;
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use pretty_assertions::assert_eq;
use anvil::class_constants::{access, opcode};
use anvil::tree::code::{Instruction, Label};
use anvil::tree::{ClassHeader, ConstantValue, FieldHeader, MethodHeader};
use anvil::{completed, Abandoned, ClassReader, ClassVisitor, ClassWriter, Failure, FieldWriter, FrameComputation, MethodVisitor, MethodWriter, PendingClasses, PendingSession, ReadOptions, SuperClassMap, TypeHierarchy, Visit};
use common::{method, write_java_8_class, Recorder};

fn error_of<T>(result: Result<T>) -> Result<anyhow::Error> {
	match result {
		Ok(_) => bail!("expected an error"),
		Err(error) => Ok(error),
	}
}

#[test]
fn pool_overflow_is_a_capacity_failure() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	// every field needs a name, a string and the string's utf8
	let result = write_java_8_class(&hierarchy, "a/Huge", |writer| {
		for i in 0..30_000 {
			let mut field = FieldHeader::new(access::STATIC | access::FINAL, format!("f{i}"), "Ljava/lang/String;");
			field.constant_value = Some(ConstantValue::String(format!("value {i}").into()));
			if let ControlFlow::Continue(Some(field)) = writer.visit_field(&field)? {
				writer.finish_field(field)?;
			}
		}
		Ok(())
	});
	assert_eq!(Failure::classify(&error_of(result)?), Failure::Capacity);
	Ok(())
}

#[test]
fn oversized_method_is_a_capacity_failure() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let result = write_java_8_class(&hierarchy, "a/Long", |writer| {
		method(writer, MethodHeader::new(access::STATIC, "f", "()V"), |m| {
			for _ in 0..70_000 {
				m.visit_instruction(Instruction::Simple(opcode::NOP))?;
			}
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	});
	assert_eq!(Failure::classify(&error_of(result)?), Failure::Capacity);
	Ok(())
}

#[test]
fn truncated_input_is_a_format_failure() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Short", |writer| {
		method(writer, MethodHeader::new(access::STATIC, "f", "()V"), |m| {
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	for length in [0, 9, bytes.len() - 3] {
		let result = ClassReader::new(&bytes[..length])
			.and_then(|reader| reader.accept(&mut Recorder::default(), ReadOptions::default()));
		assert_eq!(Failure::classify(&error_of(result)?), Failure::Format, "truncated to {length} bytes");
	}
	Ok(())
}

#[test]
fn jump_to_a_label_never_placed_fails() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let result = write_java_8_class(&hierarchy, "a/Lost", |writer| {
		method(writer, MethodHeader::new(access::STATIC, "f", "()V"), |m| {
			m.visit_instruction(Instruction::Jump { opcode: opcode::GOTO, target: Label::new() })
		})
	});
	assert_eq!(Failure::classify(&error_of(result)?), Failure::Format);
	Ok(())
}

/// Offers a helper class for every class it sees, and abandons classes whose name ends in `Skipped`.
struct Offering<'p> {
	session: Option<PendingSession<'p>>,
}

impl ClassVisitor for Offering<'_> {
	type Field = ();
	type Method = ();

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		if let Some(session) = &mut self.session {
			let mut helper = header.name.clone();
			helper.push_str("$Helper");
			session.offer(helper, vec![0xCA, 0xFE, 0xBA, 0xBE]);
		}
		if header.name.ends_with("Skipped") {
			return Ok(ControlFlow::Break(Abandoned));
		}
		Ok(ControlFlow::Continue(()))
	}

	fn visit_field(&mut self, _header: &FieldHeader) -> Visit<Option<()>> {
		Ok(ControlFlow::Continue(None))
	}

	fn finish_field(&mut self, _field_visitor: ()) -> Result<()> {
		Ok(())
	}

	fn visit_method(&mut self, _header: &MethodHeader) -> Visit<Option<()>> {
		Ok(ControlFlow::Continue(None))
	}

	fn finish_method(&mut self, _method_visitor: ()) -> Result<()> {
		Ok(())
	}

	fn visit_end(&mut self) -> Visit {
		Ok(ControlFlow::Continue(()))
	}
}

fn process(pending: &PendingClasses, bytes: &[u8]) -> Result<bool> {
	let reader = ClassReader::new(bytes)?;
	let mut offering = Offering { session: Some(pending.session()) };
	let flow = reader.accept(&mut offering, ReadOptions::default())?;
	match (completed(flow), offering.session.take()) {
		(Some(()), Some(session)) => {
			session.commit();
			Ok(true)
		},
		_ => Ok(false),
	}
}

#[test]
fn abandoned_classes_withdraw_their_offers() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let kept = write_java_8_class(&hierarchy, "a/Kept", |_| Ok(()))?;
	let skipped = write_java_8_class(&hierarchy, "a/Skipped", |_| Ok(()))?;

	let pending = PendingClasses::new();
	assert!(process(&pending, &kept)?);
	assert!(!process(&pending, &skipped)?);

	assert_eq!(pending.len(), 1);
	assert!(pending.contains(JavaStr::from_str("a/Kept$Helper")));
	assert!(!pending.contains(JavaStr::from_str("a/Skipped$Helper")));
	assert_eq!(pending.take(JavaStr::from_str("a/Kept$Helper")), Some(vec![0xCA, 0xFE, 0xBA, 0xBE]));
	assert!(pending.is_empty());
	Ok(())
}

/// Moves every class under `java/util/ArrayList` and abandons it at the end.
struct ReparentAndAbandon<'w, 'h> {
	writer: &'w mut ClassWriter<'h>,
}

impl ClassVisitor for ReparentAndAbandon<'_, '_> {
	type Field = FieldWriter;
	type Method = MethodWriter;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit {
		let mut header = header.clone();
		header.super_class = Some(JavaString::from("java/util/ArrayList"));
		self.writer.visit_class(&header)
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
		Ok(ControlFlow::Break(Abandoned))
	}
}

#[test]
fn abandoned_classes_stay_out_of_the_hierarchy() -> Result<()> {
	let bytes = write_java_8_class(&SuperClassMap::with_platform_classes(), "a/X", |writer| {
		method(writer, MethodHeader::new(access::STATIC, "f", "()V"), |m| {
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;
	let x = JavaStr::from_str("a/X");
	let linked_list = JavaStr::from_str("java/util/LinkedList");

	let hierarchy = SuperClassMap::with_platform_classes();
	let reader = ClassReader::new(&bytes)?;
	let mut writer = ClassWriter::new(&hierarchy, FrameComputation::Always);
	let flow = reader.accept(&mut ReparentAndAbandon { writer: &mut writer }, ReadOptions::default())?;
	assert_eq!(completed(flow), None);
	drop(writer);

	assert_eq!(hierarchy.super_class(x), None);
	assert_eq!(hierarchy.common_super_class(x, linked_list), JavaString::from("java/lang/Object"));

	// the same class, written to the end, is known afterwards
	let reader = ClassReader::new(&bytes)?;
	let mut writer = ClassWriter::new(&hierarchy, FrameComputation::Always);
	assert_eq!(completed(reader.accept(&mut writer, ReadOptions::default())?), Some(()));
	assert_eq!(hierarchy.super_class(x), None, "registered before the class was encoded");
	writer.to_bytes()?;
	assert_eq!(hierarchy.super_class(x), Some(JavaString::from("java/lang/Object")));
	Ok(())
}

#[test]
fn failing_classes_withdraw_their_offers() -> Result<()> {
	let pending = PendingClasses::new();
	{
		let mut session = pending.session();
		session.offer(JavaString::from("a/Broken$Helper"), Vec::new());
		assert_eq!(pending.len(), 1);
		// dropped here, as it would be when the error is propagated
	}
	assert!(pending.is_empty());
	Ok(())
}
