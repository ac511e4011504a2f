//! Instructions and the other contents of a `Code` attribute.

use std::sync::atomic::{AtomicU64, Ordering};
use java_string::JavaString;
use crate::class_constants::opcode;

/// A position in a method body.
///
/// Labels are handed out from a process wide counter, so labels made by a reader never collide with labels
/// a collaborator makes while rewriting the same method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
	id: u64,
}

static NEXT_LABEL: AtomicU64 = AtomicU64::new(0);

impl Label {
	#[allow(clippy::new_without_default)]
	pub fn new() -> Label {
		Label { id: NEXT_LABEL.fetch_add(1, Ordering::Relaxed) }
	}
}

/// A reference to a field or a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
	pub owner: JavaString,
	pub name: JavaString,
	pub descriptor: JavaString,
}

impl MemberRef {
	pub fn new(owner: impl Into<JavaString>, name: impl Into<JavaString>, descriptor: impl Into<JavaString>) -> MemberRef {
		MemberRef { owner: owner.into(), name: name.into(), descriptor: descriptor.into() }
	}
}

/// A `CONSTANT_MethodHandle_info`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
	/// One of [`crate::class_constants::pool::method_handle_reference`].
	pub kind: u8,
	pub member: MemberRef,
	/// Whether the member is referenced with an `InterfaceMethodref`.
	pub interface: bool,
}

/// A dynamically computed constant or call site: a name and descriptor plus a bootstrap method with its static arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamic {
	pub name: JavaString,
	pub descriptor: JavaString,
	pub bootstrap: Handle,
	pub arguments: Vec<Loadable>,
}

/// A value loadable with `ldc`, also the type of bootstrap method arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	/// An internal name, or an array descriptor.
	Class(JavaString),
	String(JavaString),
	MethodType(JavaString),
	MethodHandle(Handle),
	Dynamic(Box<Dynamic>),
}

impl Loadable {
	/// Whether loading this takes two stack slots.
	pub fn is_wide(&self) -> bool {
		match self {
			Loadable::Long(_) | Loadable::Double(_) => true,
			Loadable::Dynamic(dynamic) => {
				let d = &dynamic.descriptor;
				d.starts_with('J') || d.starts_with('D')
			},
			_ => false,
		}
	}
}

/// A single instruction.
///
/// Instructions with implicit operands like `iload_0` or `goto_w` don't have a form of their own, they're
/// represented by the general instruction. The writer picks the shortest encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	/// Any instruction without operands.
	Simple(u8),
	/// `bipush`, `sipush` and `newarray` (the operand being the `atype`).
	Int { opcode: u8, operand: i32 },
	/// Loads, stores and `ret`.
	Var { opcode: u8, index: u16 },
	/// `new`, `anewarray`, `checkcast` and `instanceof`, with an internal name or array descriptor.
	Type { opcode: u8, class: JavaString },
	Field { opcode: u8, field: MemberRef },
	Invoke { opcode: u8, method: MemberRef, interface: bool },
	InvokeDynamic(Dynamic),
	/// Conditional jumps, `goto` and `jsr`.
	Jump { opcode: u8, target: Label },
	Ldc(Loadable),
	IInc { index: u16, increment: i16 },
	TableSwitch { default: Label, low: i32, high: i32, targets: Vec<Label> },
	LookupSwitch { default: Label, pairs: Vec<(i32, Label)> },
	MultiANewArray { class: JavaString, dimensions: u8 },
}

impl Instruction {
	pub fn opcode(&self) -> u8 {
		match self {
			Instruction::Simple(opcode) => *opcode,
			Instruction::Int { opcode, .. } => *opcode,
			Instruction::Var { opcode, .. } => *opcode,
			Instruction::Type { opcode, .. } => *opcode,
			Instruction::Field { opcode, .. } => *opcode,
			Instruction::Invoke { opcode, .. } => *opcode,
			Instruction::InvokeDynamic(_) => opcode::INVOKEDYNAMIC,
			Instruction::Jump { opcode, .. } => *opcode,
			Instruction::Ldc(_) => opcode::LDC,
			Instruction::IInc { .. } => opcode::IINC,
			Instruction::TableSwitch { .. } => opcode::TABLESWITCH,
			Instruction::LookupSwitch { .. } => opcode::LOOKUPSWITCH,
			Instruction::MultiANewArray { .. } => opcode::MULTIANEWARRAY,
		}
	}
}

/// An entry of the exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatch {
	pub start: Label,
	pub end: Label,
	pub handler: Label,
	/// `None` catches everything.
	pub catch_type: Option<JavaString>,
}

/// An entry of the `LocalVariableTable`, together with the signature from the `LocalVariableTypeTable` if there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
	pub name: JavaString,
	pub descriptor: JavaString,
	pub signature: Option<JavaString>,
	pub start: Label,
	pub end: Label,
	pub index: u16,
}

/// A type in a stack map frame as read from a class file.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationType {
	Top,
	Integer,
	Float,
	Long,
	Double,
	Null,
	UninitializedThis,
	Object(JavaString),
	/// Created by the `new` instruction at the label.
	Uninitialized(Label),
}

/// A decoded frame of a `StackMapTable`, expanded to its full locals and stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackMapFrame {
	pub locals: Vec<VerificationType>,
	pub stack: Vec<VerificationType>,
}
