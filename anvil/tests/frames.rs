mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use anvil::class_constants::{access, opcode, version};
use anvil::tree::code::{Instruction, Label, Loadable, MemberRef, TryCatch, VerificationType};
use anvil::tree::MethodHeader;
use anvil::{FrameComputation, MethodVisitor, MethodWriter, SuperClassMap};
use common::{method, write_class, write_java_8_class, Recorder};

fn object(name: &str) -> VerificationType {
	VerificationType::Object(name.into())
}

fn var(opcode: u8, index: u16) -> Instruction {
	Instruction::Var { opcode, index }
}

fn jump(opcode: u8, target: Label) -> Instruction {
	Instruction::Jump { opcode, target }
}

const STATIC: u16 = access::PUBLIC | access::STATIC;

#[test]
fn branches_merge_to_common_super_class() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Lists", |writer| {
		let header = MethodHeader::new(STATIC, "pick", "(Ljava/util/ArrayList;Ljava/util/LinkedList;Z)Ljava/util/List;");
		method(writer, header, |m| {
			let (other, join) = (Label::new(), Label::new());
			m.visit_instruction(var(opcode::ILOAD, 2))?;
			m.visit_instruction(jump(opcode::IFEQ, other))?;
			m.visit_instruction(var(opcode::ALOAD, 0))?;
			m.visit_instruction(jump(opcode::GOTO, join))?;
			m.visit_label(other)?;
			m.visit_instruction(var(opcode::ALOAD, 1))?;
			m.visit_label(join)?;
			m.visit_instruction(Instruction::Simple(opcode::ARETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let pick = recorder.method("pick")?;
	let locals = vec![object("java/util/ArrayList"), object("java/util/LinkedList"), VerificationType::Integer];
	assert_eq!(pick.frames.len(), 2);
	assert_eq!(pick.frames[0].locals, locals);
	assert!(pick.frames[0].stack.is_empty());
	assert_eq!(pick.frames[1].locals, locals);
	assert_eq!(pick.frames[1].stack, vec![object("java/util/AbstractList")]);
	assert_eq!((pick.max_stack, pick.max_locals), (1, 3));
	Ok(())
}

#[test]
fn unrelated_types_merge_to_object() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Boxes", |writer| {
		method(writer, MethodHeader::new(STATIC, "pick", "(Z)Ljava/lang/Object;"), |m| {
			let (other, join) = (Label::new(), Label::new());
			m.visit_instruction(var(opcode::ILOAD, 0))?;
			m.visit_instruction(jump(opcode::IFEQ, other))?;
			m.visit_instruction(Instruction::Ldc(Loadable::String("s".into())))?;
			m.visit_instruction(jump(opcode::GOTO, join))?;
			m.visit_label(other)?;
			m.visit_instruction(Instruction::Simple(opcode::ICONST_1))?;
			m.visit_instruction(Instruction::Invoke {
				opcode: opcode::INVOKESTATIC,
				method: MemberRef::new("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;"),
				interface: false,
			})?;
			m.visit_label(join)?;
			m.visit_instruction(Instruction::Simple(opcode::ARETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let pick = recorder.method("pick")?;
	assert_eq!(pick.frames.len(), 2);
	assert_eq!(pick.frames[1].stack, vec![object("java/lang/Object")]);
	Ok(())
}

#[test]
fn unreachable_code_is_replaced() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Dead", |writer| {
		method(writer, MethodHeader::new(STATIC, "f", "()V"), |m| {
			let end = Label::new();
			m.visit_instruction(jump(opcode::GOTO, end))?;
			m.visit_instruction(Instruction::Simple(opcode::ICONST_0))?;
			m.visit_instruction(Instruction::Simple(opcode::POP))?;
			m.visit_label(end)?;
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let f = recorder.method("f")?;
	assert_eq!(f.opcodes(), vec![opcode::GOTO, opcode::NOP, opcode::ATHROW, opcode::RETURN]);
	assert_eq!(f.frames.len(), 2);
	assert!(f.frames[0].locals.is_empty());
	assert_eq!(f.frames[0].stack, vec![object("java/lang/Throwable")]);
	assert!(f.frames[1].stack.is_empty());
	assert_eq!(f.max_stack, 1);
	Ok(())
}

#[test]
fn handler_sees_exception_and_locals_before_the_store() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Catching", |writer| {
		method(writer, MethodHeader::new(STATIC, "parse", "(Ljava/lang/String;)I"), |m| {
			let (start, end, handler) = (Label::new(), Label::new(), Label::new());
			m.visit_try_catch(TryCatch { start, end, handler, catch_type: Some("java/lang/NumberFormatException".into()) })?;
			m.visit_label(start)?;
			m.visit_instruction(var(opcode::ALOAD, 0))?;
			m.visit_instruction(Instruction::Invoke {
				opcode: opcode::INVOKESTATIC,
				method: MemberRef::new("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
				interface: false,
			})?;
			m.visit_instruction(var(opcode::ISTORE, 1))?;
			m.visit_instruction(var(opcode::ILOAD, 1))?;
			m.visit_label(end)?;
			m.visit_instruction(Instruction::Simple(opcode::IRETURN))?;
			m.visit_label(handler)?;
			m.visit_instruction(var(opcode::ASTORE, 1))?;
			m.visit_instruction(Instruction::Simple(opcode::ICONST_0))?;
			m.visit_instruction(Instruction::Simple(opcode::IRETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let parse = recorder.method("parse")?;
	assert_eq!(parse.try_catches.len(), 1);
	let handler = parse.frames.last().map(|frame| (frame.locals.clone(), frame.stack.clone()));
	// the handler is reached both before and after local 1 is set, so only the parameter survives the merge
	assert_eq!(handler, Some((vec![object("java/lang/String")], vec![object("java/lang/NumberFormatException")])));
	assert_eq!((parse.max_stack, parse.max_locals), (1, 2));
	Ok(())
}

#[test]
fn old_classes_only_get_max_stack() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_class(&hierarchy, FrameComputation::Auto, version::V1_6, "a/Old", |writer| {
		method(writer, MethodHeader::new(STATIC, "loop", "(I)V"), |m| {
			let head = Label::new();
			m.visit_label(head)?;
			m.visit_instruction(Instruction::IInc { index: 0, increment: -1 })?;
			m.visit_instruction(var(opcode::ILOAD, 0))?;
			m.visit_instruction(Instruction::Simple(opcode::ICONST_1))?;
			m.visit_instruction(Instruction::Simple(opcode::IADD))?;
			m.visit_instruction(jump(opcode::IFEQ, head))?;
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let r#loop = recorder.method("loop")?;
	assert!(r#loop.frames.is_empty());
	assert_eq!((r#loop.max_stack, r#loop.max_locals), (2, 1));
	Ok(())
}

#[test]
fn frames_can_be_forced_for_old_classes() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_class(&hierarchy, FrameComputation::Always, version::V1_6, "a/Forced", |writer| {
		method(writer, MethodHeader::new(STATIC, "loop", "(I)V"), |m| {
			let head = Label::new();
			m.visit_label(head)?;
			m.visit_instruction(Instruction::IInc { index: 0, increment: -1 })?;
			m.visit_instruction(var(opcode::ILOAD, 0))?;
			m.visit_instruction(jump(opcode::IFEQ, head))?;
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let r#loop = recorder.method("loop")?;
	assert_eq!(r#loop.frames.len(), 1);
	assert_eq!(r#loop.frames[0].locals, vec![VerificationType::Integer]);
	Ok(())
}

#[test]
fn far_jumps_still_assemble() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Far", |writer| {
		method(writer, MethodHeader::new(STATIC, "far", "(I)V"), |m| {
			let end = Label::new();
			m.visit_instruction(var(opcode::ILOAD, 0))?;
			m.visit_instruction(jump(opcode::IFEQ, end))?;
			for _ in 0..40000 {
				m.visit_instruction(Instruction::Simple(opcode::NOP))?;
			}
			m.visit_label(end)?;
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let far = recorder.method("far")?;
	// ILOAD, the inverted IFNE, GOTO (read from goto_w), the nops, RETURN
	assert_eq!(far.instructions.len(), 40004);
	assert_eq!(&far.opcodes()[..3], &[opcode::ILOAD, opcode::IFNE, opcode::GOTO]);
	assert_eq!(far.frames.len(), 2);
	Ok(())
}

#[test]
fn far_backward_branch_is_inverted() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_java_8_class(&hierarchy, "a/Back", |writer| {
		method(writer, MethodHeader::new(STATIC, "spin", "(I)V"), |m| {
			let head = Label::new();
			m.visit_label(head)?;
			for _ in 0..40000 {
				m.visit_instruction(Instruction::Simple(opcode::NOP))?;
			}
			m.visit_instruction(var(opcode::ILOAD, 0))?;
			m.visit_instruction(jump(opcode::IFNE, head))?;
			m.visit_instruction(Instruction::Simple(opcode::RETURN))
		})
	})?;

	let recorder = Recorder::read(&bytes)?;
	let spin = recorder.method("spin")?;
	let opcodes = spin.opcodes();
	assert_eq!(opcodes.len(), 40004);
	assert_eq!(&opcodes[40000..], &[opcode::ILOAD, opcode::IFEQ, opcode::GOTO, opcode::RETURN]);
	// the loop head, and the return skipped to by the inverted branch
	assert_eq!(spin.frames.len(), 2);
	Ok(())
}

fn subroutine(m: &mut MethodWriter) -> Result<()> {
	let sub = Label::new();
	m.visit_instruction(jump(opcode::JSR, sub))?;
	m.visit_instruction(Instruction::Simple(opcode::RETURN))?;
	m.visit_label(sub)?;
	m.visit_instruction(var(opcode::ASTORE, 0))?;
	m.visit_instruction(var(opcode::RET, 0))
}

#[test]
fn subroutines_get_max_stack() -> Result<()> {
	let hierarchy = SuperClassMap::with_platform_classes();
	let bytes = write_class(&hierarchy, FrameComputation::Auto, version::V1_1, "a/Sub", |writer| {
		method(writer, MethodHeader::new(STATIC, "f", "()V"), subroutine)
	})?;

	let recorder = Recorder::read(&bytes)?;
	let f = recorder.method("f")?;
	assert_eq!(f.opcodes(), vec![opcode::JSR, opcode::RETURN, opcode::ASTORE, opcode::RET]);
	assert_eq!((f.max_stack, f.max_locals), (1, 1));
	assert!(f.frames.is_empty());
	Ok(())
}

#[test]
fn subroutines_have_no_frames() {
	let hierarchy = SuperClassMap::with_platform_classes();
	let result = write_class(&hierarchy, FrameComputation::Always, version::V1_1, "a/Sub", |writer| {
		method(writer, MethodHeader::new(STATIC, "f", "()V"), subroutine)
	});
	assert!(result.is_err());
}
