//! The structural event interface between the reader, collaborators and the writer.
//!
//! A [`crate::ClassReader`] calls these in class file order. A [`crate::ClassWriter`] implements them and
//! turns the events back into bytes. Collaborators either implement them directly, or wrap a writer and
//! forward (possibly changed) events to it.

use std::sync::atomic::{AtomicU64, Ordering};
use anyhow::Result;
use java_string::JavaStr;
use crate::error::Visit;
use crate::tree::annotation::Annotation;
use crate::tree::code::{Instruction, Label, LocalVariable, StackMapFrame, TryCatch};
use crate::tree::{ClassHeader, EnclosingMethod, FieldHeader, InnerClass, MethodHeader};

/// Identifies the bytes a reader was created from. A writer created from the same reader may copy
/// methods without decoding them, since it shares the constant pool with the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

static NEXT_SOURCE: AtomicU64 = AtomicU64::new(1);

impl SourceId {
	pub(crate) fn next() -> SourceId {
		SourceId(NEXT_SOURCE.fetch_add(1, Ordering::Relaxed))
	}
}

/// Which parts of a class the reader skips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
	/// Don't visit method bodies at all.
	pub skip_code: bool,
	/// Skip `SourceFile`, `LineNumberTable`, `LocalVariableTable` and `LocalVariableTypeTable`.
	pub skip_debug: bool,
	pub skip_inner_classes: bool,
	/// Decode `StackMapTable` frames and pass them to [`MethodVisitor::visit_frame`].
	pub frames: bool,
}

pub trait ClassVisitor {
	type Field: FieldVisitor;
	type Method: MethodVisitor;

	fn visit_class(&mut self, header: &ClassHeader) -> Visit;

	fn visit_source(&mut self, _source_file: &JavaStr) -> Result<()> {
		Ok(())
	}
	fn visit_outer_class(&mut self, _enclosing_method: &EnclosingMethod) -> Result<()> {
		Ok(())
	}
	fn visit_nest_host(&mut self, _nest_host: &JavaStr) -> Result<()> {
		Ok(())
	}
	fn visit_nest_member(&mut self, _nest_member: &JavaStr) -> Result<()> {
		Ok(())
	}
	fn visit_annotation(&mut self, _annotation: Annotation) -> Result<()> {
		Ok(())
	}
	fn visit_inner_class(&mut self, _inner_class: InnerClass) -> Result<()> {
		Ok(())
	}

	/// Returns `None` to skip the field.
	fn visit_field(&mut self, header: &FieldHeader) -> Visit<Option<Self::Field>>;
	fn finish_field(&mut self, field_visitor: Self::Field) -> Result<()>;

	/// Returns `None` to skip the method.
	fn visit_method(&mut self, header: &MethodHeader) -> Visit<Option<Self::Method>>;
	fn finish_method(&mut self, method_visitor: Self::Method) -> Result<()>;

	fn visit_end(&mut self) -> Visit;
}

pub trait FieldVisitor {
	fn visit_annotation(&mut self, _annotation: Annotation) -> Result<()> {
		Ok(())
	}
}

impl FieldVisitor for () {}

/// Receives the contents of a method.
///
/// The code related callbacks are called in this order: [`MethodVisitor::visit_try_catch`] for every handler,
/// then labels, line numbers, frames and instructions in bytecode order, then the local variables, and finally
/// [`MethodVisitor::visit_max_stack`].
pub trait MethodVisitor {
	/// Offered the raw `method_info` bytes before anything else is visited. Returning `true` takes the bytes
	/// as they are, the reader then doesn't visit anything else of the method.
	fn copy_verbatim(&mut self, _source: SourceId, _header: &MethodHeader, _raw: &[u8]) -> bool {
		false
	}

	fn visit_annotation(&mut self, _annotation: Annotation) -> Result<()> {
		Ok(())
	}
	/// The annotations of each parameter, from a `RuntimeVisibleParameterAnnotations` attribute.
	fn visit_parameter_annotations(&mut self, _parameters: Vec<Vec<Annotation>>) -> Result<()> {
		Ok(())
	}

	fn visit_try_catch(&mut self, _try_catch: TryCatch) -> Result<()> {
		Ok(())
	}
	fn visit_label(&mut self, _label: Label) -> Result<()> {
		Ok(())
	}
	/// A label only referenced by line numbers or local variables. It never starts a basic block.
	fn visit_debug_label(&mut self, label: Label) -> Result<()> {
		self.visit_label(label)
	}
	fn visit_line_number(&mut self, _line: u16, _start: Label) -> Result<()> {
		Ok(())
	}
	fn visit_frame(&mut self, _frame: StackMapFrame) -> Result<()> {
		Ok(())
	}
	fn visit_instruction(&mut self, _instruction: Instruction) -> Result<()> {
		Ok(())
	}
	fn visit_local_variable(&mut self, _local_variable: LocalVariable) -> Result<()> {
		Ok(())
	}
	fn visit_max_stack(&mut self, _max_stack: u16, _max_locals: u16) -> Result<()> {
		Ok(())
	}
}

impl MethodVisitor for () {}
