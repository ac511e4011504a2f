//! Abstract interpretation of basic blocks, and merging of the resulting types.
//!
//! While an instruction is written, its effect is applied to the frame of the current block. Nothing is known
//! about the input of the block at that point, so popped values and read locals are recorded relative to the
//! input: [`Kind::Stack`] and [`Kind::Local`]. Once the inputs of a block are known the outputs are resolved and
//! merged into the inputs of the successors, until nothing changes anymore.

use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::class_constants::atype;
use crate::class_constants::opcode::*;
use crate::descriptor::{parse_field, parse_method, BaseType, MethodType, Type};
use crate::flow::label::LabelId;
use crate::flow::types::TypeTable;
use crate::hierarchy::{TypeHierarchy, OBJECT};
use crate::tree::code::{Instruction, Loadable};
use crate::tree::MethodHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Base {
	Top,
	Integer,
	Float,
	Double,
	Long,
	Null,
	UninitializedThis,
	// only used as array elements, on their own they're an Integer
	Boolean,
	Byte,
	Char,
	Short,
	/// Index into the [`TypeTable`].
	Object(u32),
	/// Index into the [`TypeTable`].
	Uninitialized(u32),
}

impl Base {
	/// Types of the same kind at the same array dimension merge into an array of their common type.
	fn kind(self) -> u8 {
		match self {
			Base::Object(_) => 1,
			Base::Uninitialized(_) => 2,
			_ => 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
	Base(Base),
	/// The type of the local variable with the index at the start of the block.
	Local(u16),
	/// The type `n` slots down from the top of the stack at the start of the block, `1` being the top.
	Stack(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameType {
	/// Array dimensions. Relative types may have a negative dimension, meaning the element type.
	pub(crate) dim: i16,
	pub(crate) kind: Kind,
	/// The slot is the second half of whatever was there. If that resolves to a long or double, it's `Top`.
	pub(crate) top_if_long_or_double: bool,
}

impl FrameType {
	pub(crate) const TOP: FrameType = FrameType::of(Base::Top);
	pub(crate) const INTEGER: FrameType = FrameType::of(Base::Integer);
	pub(crate) const FLOAT: FrameType = FrameType::of(Base::Float);
	pub(crate) const LONG: FrameType = FrameType::of(Base::Long);
	pub(crate) const DOUBLE: FrameType = FrameType::of(Base::Double);
	pub(crate) const NULL: FrameType = FrameType::of(Base::Null);
	pub(crate) const UNINITIALIZED_THIS: FrameType = FrameType::of(Base::UninitializedThis);

	pub(crate) const fn of(base: Base) -> FrameType {
		FrameType::array(0, base)
	}

	pub(crate) const fn array(dim: i16, base: Base) -> FrameType {
		FrameType { dim, kind: Kind::Base(base), top_if_long_or_double: false }
	}

	pub(crate) const fn object(index: u32) -> FrameType {
		FrameType::of(Base::Object(index))
	}

	const fn relative(kind: Kind) -> FrameType {
		FrameType { dim: 0, kind, top_if_long_or_double: false }
	}

	pub(crate) fn from_type(t: &Type, types: &mut TypeTable) -> FrameType {
		let dim = t.array_dimension as i16;
		let base = match &t.base {
			BaseType::Boolean if dim > 0 => Base::Boolean,
			BaseType::Byte if dim > 0 => Base::Byte,
			BaseType::Char if dim > 0 => Base::Char,
			BaseType::Short if dim > 0 => Base::Short,
			BaseType::Boolean | BaseType::Byte | BaseType::Char | BaseType::Short | BaseType::Int => Base::Integer,
			BaseType::Float => Base::Float,
			BaseType::Long => Base::Long,
			BaseType::Double => Base::Double,
			BaseType::Object(name) => Base::Object(types.normal(name)),
		};
		FrameType::array(dim, base)
	}

	pub(crate) fn is_long_or_double(&self) -> bool {
		self.dim == 0 && matches!(self.kind, Kind::Base(Base::Long | Base::Double))
	}

	fn is_null(&self) -> bool {
		matches!(self.kind, Kind::Base(Base::Null))
	}

	fn is_object(&self) -> bool {
		matches!(self.kind, Kind::Base(Base::Object(_)))
	}

	fn is_reference(&self) -> bool {
		self.is_object() || self.dim != 0
	}

	fn base_kind(&self) -> Option<u8> {
		match self.kind {
			Kind::Base(base) => Some(base.kind()),
			_ => None,
		}
	}

	/// Adds array dimensions to an absolute type. Going below zero dimensions only happens for invalid code,
	/// that gives `Top`.
	fn with_dim_added(self, dim: i16) -> FrameType {
		if dim == 0 || self.is_null() {
			return self;
		}
		match self.dim.checked_add(dim) {
			Some(dim) if dim >= 0 => FrameType { dim, ..self },
			_ => FrameType::TOP,
		}
	}

	fn element(self) -> FrameType {
		if self.is_null() {
			self
		} else {
			FrameType { dim: self.dim - 1, ..self }
		}
	}
}

/// The resolved output of a block, ready to be merged into its successors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outgoing {
	locals: Vec<FrameType>,
	stack: Vec<FrameType>,
	/// Handlers see the locals at any point of the block, so they also get the input locals merged in.
	input_locals: Vec<FrameType>,
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
	/// The first label at the position of the block.
	pub(crate) owner: LabelId,
	input_locals: Option<Vec<FrameType>>,
	input_stack: Option<Vec<FrameType>>,
	output_locals: Vec<Option<FrameType>>,
	output_stack: Vec<FrameType>,
	/// How many values the block popped from its input stack.
	popped: usize,
	/// Highest stack size within the block, relative to the input stack size.
	pub(crate) output_stack_max: i32,
	/// Receivers of constructor calls, relative to the input.
	initializations: Vec<FrameType>,
}

impl Frame {
	pub(crate) fn new(owner: LabelId) -> Frame {
		Frame {
			owner,
			input_locals: None,
			input_stack: None,
			output_locals: Vec::new(),
			output_stack: Vec::new(),
			popped: 0,
			output_stack_max: 0,
			initializations: Vec::new(),
		}
	}

	/// The frame at the start of a method: `this` and the parameters, everything else `Top`.
	pub(crate) fn init_input(&mut self, class: &JavaStr, header: &MethodHeader, max_locals: usize, types: &mut TypeTable) -> Result<()> {
		let mut locals = Vec::with_capacity(max_locals);
		if !header.is_static() {
			if header.is_constructor() {
				locals.push(FrameType::UNINITIALIZED_THIS);
			} else {
				locals.push(FrameType::object(types.normal(class)));
			}
		}
		for parameter in parse_method(&header.descriptor)?.parameters {
			let t = FrameType::from_type(&parameter, types);
			locals.push(t);
			if t.is_long_or_double() {
				locals.push(FrameType::TOP);
			}
		}
		if locals.len() > max_locals {
			bail!("parameters of {:?} take {} slots, more than the {max_locals} local variables", header.descriptor, locals.len());
		}
		locals.resize(max_locals, FrameType::TOP);

		self.input_locals = Some(locals);
		self.input_stack = Some(Vec::new());
		Ok(())
	}

	/// The types at the start of the block, `None` if it's unreachable.
	pub(crate) fn input(&self) -> Option<(&[FrameType], &[FrameType])> {
		Some((self.input_locals.as_deref()?, self.input_stack.as_deref()?))
	}

	pub(crate) fn input_stack_len(&self) -> usize {
		self.input_stack.as_ref().map_or(0, Vec::len)
	}

	fn push(&mut self, t: FrameType) {
		self.output_stack.push(t);
		let size = self.output_stack.len() as i32 - self.popped as i32;
		self.output_stack_max = self.output_stack_max.max(size);
	}

	/// Pushes a value, and the `Top` after it if it's a long or double.
	fn push_value(&mut self, t: FrameType) {
		self.push(t);
		if t.is_long_or_double() {
			self.push(FrameType::TOP);
		}
	}

	fn push_descriptor(&mut self, descriptor: &JavaStr, types: &mut TypeTable) -> Result<()> {
		if descriptor.starts_with('(') {
			self.push_return(&parse_method(descriptor)?, types);
		} else {
			let t = parse_field(descriptor)?;
			self.push_value(FrameType::from_type(&t, types));
		}
		Ok(())
	}

	fn push_return(&mut self, method: &MethodType, types: &mut TypeTable) {
		if let Some(t) = &method.return_type {
			self.push_value(FrameType::from_type(t, types));
		}
	}

	fn pop(&mut self) -> FrameType {
		if let Some(t) = self.output_stack.pop() {
			t
		} else {
			self.popped += 1;
			FrameType::relative(Kind::Stack(self.popped as u16))
		}
	}

	fn pop_n(&mut self, n: usize) {
		if self.output_stack.len() >= n {
			self.output_stack.truncate(self.output_stack.len() - n);
		} else {
			self.popped += n - self.output_stack.len();
			self.output_stack.clear();
		}
	}

	fn pop_descriptor(&mut self, descriptor: &JavaStr) -> Result<()> {
		if descriptor.starts_with('(') {
			self.pop_n(parse_method(descriptor)?.parameters_size() as usize);
		} else {
			self.pop_n(parse_field(descriptor)?.size() as usize);
		}
		Ok(())
	}

	fn get(&mut self, local: u16) -> FrameType {
		let index = local as usize;
		if let Some(Some(t)) = self.output_locals.get(index) {
			return *t;
		}
		let t = FrameType::relative(Kind::Local(local));
		self.set(local, t);
		t
	}

	fn set(&mut self, local: u16, t: FrameType) {
		let index = local as usize;
		if self.output_locals.len() <= index {
			self.output_locals.resize(index + 1, None);
		}
		self.output_locals[index] = Some(t);
	}

	/// A store into `local` breaks a long or double starting one slot earlier.
	fn clobber_before(&mut self, local: u16) {
		let Some(before) = local.checked_sub(1) else {
			return;
		};
		match self.output_locals.get(before as usize).copied().flatten() {
			Some(t) if t.is_long_or_double() => self.set(before, FrameType::TOP),
			Some(FrameType { kind: Kind::Base(_), .. }) => {},
			Some(t) => self.set(before, FrameType { top_if_long_or_double: true, ..t }),
			None => self.set(before, FrameType {
				top_if_long_or_double: true,
				..FrameType::relative(Kind::Local(before))
			}),
		}
	}

	/// Applies the effect of the instruction. `offset` is the position of the instruction in the code.
	pub(crate) fn execute(&mut self, instruction: &Instruction, offset: usize, types: &mut TypeTable) -> Result<()> {
		match instruction {
			Instruction::Simple(opcode) => self.execute_simple(*opcode),
			Instruction::Int { opcode: BIPUSH | SIPUSH, .. } => {
				self.push(FrameType::INTEGER);
				Ok(())
			},
			Instruction::Int { opcode: NEWARRAY, operand } => {
				self.pop();
				let base = match u8::try_from(*operand).ok() {
					Some(atype::T_BOOLEAN) => Base::Boolean,
					Some(atype::T_CHAR) => Base::Char,
					Some(atype::T_BYTE) => Base::Byte,
					Some(atype::T_SHORT) => Base::Short,
					Some(atype::T_INT) => Base::Integer,
					Some(atype::T_FLOAT) => Base::Float,
					Some(atype::T_DOUBLE) => Base::Double,
					Some(atype::T_LONG) => Base::Long,
					_ => bail!("invalid array type {operand} for newarray"),
				};
				self.push(FrameType::array(1, base));
				Ok(())
			},
			Instruction::Var { opcode, index } => self.execute_var(*opcode, *index),
			Instruction::Type { opcode, class } => self.execute_type(*opcode, class, offset, types),
			Instruction::Field { opcode, field } => {
				match *opcode {
					GETSTATIC => self.push_descriptor(&field.descriptor, types)?,
					PUTSTATIC => self.pop_descriptor(&field.descriptor)?,
					GETFIELD => {
						self.pop_n(1);
						self.push_descriptor(&field.descriptor, types)?;
					},
					PUTFIELD => {
						self.pop_descriptor(&field.descriptor)?;
						self.pop();
					},
					opcode => bail!("not a field instruction: {opcode:#x}"),
				}
				Ok(())
			},
			Instruction::Invoke { opcode, method, .. } => {
				let method_type = parse_method(&method.descriptor)?;
				self.pop_n(method_type.parameters_size() as usize);
				if *opcode != INVOKESTATIC {
					let receiver = self.pop();
					if *opcode == INVOKESPECIAL && method.name.starts_with('<') {
						self.initializations.push(receiver);
					}
				}
				self.push_return(&method_type, types);
				Ok(())
			},
			Instruction::InvokeDynamic(dynamic) => {
				let method_type = parse_method(&dynamic.descriptor)?;
				self.pop_n(method_type.parameters_size() as usize);
				self.push_return(&method_type, types);
				Ok(())
			},
			Instruction::Jump { opcode, .. } => {
				match *opcode {
					IFEQ..=IFLE | IFNULL | IFNONNULL => self.pop_n(1),
					IF_ICMPEQ..=IF_ACMPNE => self.pop_n(2),
					GOTO | GOTO_W => {},
					JSR | JSR_W => bail!("jsr can't be used when computing frames"),
					opcode => bail!("not a jump instruction: {opcode:#x}"),
				}
				Ok(())
			},
			Instruction::Ldc(loadable) => self.execute_ldc(loadable, types),
			Instruction::IInc { index, .. } => {
				self.set(*index, FrameType::INTEGER);
				Ok(())
			},
			Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
				self.pop_n(1);
				Ok(())
			},
			Instruction::MultiANewArray { class, dimensions } => {
				self.pop_n(*dimensions as usize);
				self.push_descriptor(class, types)
			},
			Instruction::Int { opcode, .. } => bail!("not an int instruction: {opcode:#x}"),
		}
	}

	fn execute_simple(&mut self, opcode: u8) -> Result<()> {
		match opcode {
			NOP | INEG | LNEG | FNEG | DNEG | I2B | I2C | I2S | RETURN => {},
			ACONST_NULL => self.push(FrameType::NULL),
			ICONST_M1..=ICONST_5 => self.push(FrameType::INTEGER),
			LCONST_0 | LCONST_1 => self.push_value(FrameType::LONG),
			FCONST_0..=FCONST_2 => self.push(FrameType::FLOAT),
			DCONST_0 | DCONST_1 => self.push_value(FrameType::DOUBLE),
			ILOAD_0..=ALOAD_3 => {
				let n = opcode - ILOAD_0;
				return self.execute_var(ILOAD + n / 4, (n % 4) as u16);
			},
			ISTORE_0..=ASTORE_3 => {
				let n = opcode - ISTORE_0;
				return self.execute_var(ISTORE + n / 4, (n % 4) as u16);
			},
			IALOAD | BALOAD | CALOAD | SALOAD => {
				self.pop_n(2);
				self.push(FrameType::INTEGER);
			},
			LALOAD | D2L => {
				self.pop_n(2);
				self.push_value(FrameType::LONG);
			},
			FALOAD => {
				self.pop_n(2);
				self.push(FrameType::FLOAT);
			},
			DALOAD | L2D => {
				self.pop_n(2);
				self.push_value(FrameType::DOUBLE);
			},
			AALOAD => {
				self.pop_n(1);
				let array = self.pop();
				self.push(array.element());
			},
			IASTORE | BASTORE | CASTORE | SASTORE | FASTORE | AASTORE => self.pop_n(3),
			LASTORE | DASTORE => self.pop_n(4),
			POP | IRETURN | FRETURN | ARETURN | ATHROW | MONITORENTER | MONITOREXIT => self.pop_n(1),
			POP2 | LRETURN | DRETURN => self.pop_n(2),
			DUP => {
				let t1 = self.pop();
				self.push(t1);
				self.push(t1);
			},
			DUP_X1 => {
				let t1 = self.pop();
				let t2 = self.pop();
				self.push(t1);
				self.push(t2);
				self.push(t1);
			},
			DUP_X2 => {
				let t1 = self.pop();
				let t2 = self.pop();
				let t3 = self.pop();
				self.push(t1);
				self.push(t3);
				self.push(t2);
				self.push(t1);
			},
			DUP2 => {
				let t1 = self.pop();
				let t2 = self.pop();
				self.push(t2);
				self.push(t1);
				self.push(t2);
				self.push(t1);
			},
			DUP2_X1 => {
				let t1 = self.pop();
				let t2 = self.pop();
				let t3 = self.pop();
				self.push(t2);
				self.push(t1);
				self.push(t3);
				self.push(t2);
				self.push(t1);
			},
			DUP2_X2 => {
				let t1 = self.pop();
				let t2 = self.pop();
				let t3 = self.pop();
				let t4 = self.pop();
				self.push(t2);
				self.push(t1);
				self.push(t4);
				self.push(t3);
				self.push(t2);
				self.push(t1);
			},
			SWAP => {
				let t1 = self.pop();
				let t2 = self.pop();
				self.push(t1);
				self.push(t2);
			},
			IADD | ISUB | IMUL | IDIV | IREM | IAND | IOR | IXOR | ISHL | ISHR | IUSHR | L2I | D2I | FCMPL | FCMPG => {
				self.pop_n(2);
				self.push(FrameType::INTEGER);
			},
			LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => {
				self.pop_n(4);
				self.push_value(FrameType::LONG);
			},
			FADD | FSUB | FMUL | FDIV | FREM | L2F | D2F => {
				self.pop_n(2);
				self.push(FrameType::FLOAT);
			},
			DADD | DSUB | DMUL | DDIV | DREM => {
				self.pop_n(4);
				self.push_value(FrameType::DOUBLE);
			},
			LSHL | LSHR | LUSHR => {
				self.pop_n(3);
				self.push_value(FrameType::LONG);
			},
			I2L | F2L => {
				self.pop_n(1);
				self.push_value(FrameType::LONG);
			},
			I2F => {
				self.pop_n(1);
				self.push(FrameType::FLOAT);
			},
			I2D | F2D => {
				self.pop_n(1);
				self.push_value(FrameType::DOUBLE);
			},
			F2I | ARRAYLENGTH => {
				self.pop_n(1);
				self.push(FrameType::INTEGER);
			},
			LCMP | DCMPL | DCMPG => {
				self.pop_n(4);
				self.push(FrameType::INTEGER);
			},
			opcode => bail!("unknown or misplaced opcode {opcode:#x}"),
		}
		Ok(())
	}

	fn execute_var(&mut self, opcode: u8, index: u16) -> Result<()> {
		match opcode {
			ILOAD => self.push(FrameType::INTEGER),
			FLOAD => self.push(FrameType::FLOAT),
			LLOAD => self.push_value(FrameType::LONG),
			DLOAD => self.push_value(FrameType::DOUBLE),
			ALOAD => {
				let t = self.get(index);
				self.push(t);
			},
			ISTORE | FSTORE | ASTORE => {
				let t = self.pop();
				self.set(index, t);
				self.clobber_before(index);
			},
			LSTORE | DSTORE => {
				self.pop_n(1);
				let t = self.pop();
				self.set(index, t);
				let next = index.checked_add(1).context("local variable index overflow")?;
				self.set(next, FrameType::TOP);
				self.clobber_before(index);
			},
			RET => bail!("ret can't be used when computing frames"),
			opcode => bail!("not a local variable instruction: {opcode:#x}"),
		}
		Ok(())
	}

	fn execute_type(&mut self, opcode: u8, class: &JavaStr, offset: usize, types: &mut TypeTable) -> Result<()> {
		match opcode {
			NEW => self.push(FrameType::of(Base::Uninitialized(types.uninitialized(class, offset)))),
			ANEWARRAY => {
				self.pop();
				if class.starts_with('[') {
					let mut descriptor = JavaString::from("[");
					descriptor.push_java_str(class);
					self.push_descriptor(&descriptor, types)?;
				} else {
					self.push(FrameType::array(1, Base::Object(types.normal(class))));
				}
			},
			CHECKCAST => {
				self.pop();
				if class.starts_with('[') {
					self.push_descriptor(class, types)?;
				} else {
					self.push(FrameType::object(types.normal(class)));
				}
			},
			INSTANCEOF => {
				self.pop_n(1);
				self.push(FrameType::INTEGER);
			},
			opcode => bail!("not a type instruction: {opcode:#x}"),
		}
		Ok(())
	}

	fn execute_ldc(&mut self, loadable: &Loadable, types: &mut TypeTable) -> Result<()> {
		let class = match loadable {
			Loadable::Integer(_) => return Ok(self.push(FrameType::INTEGER)),
			Loadable::Float(_) => return Ok(self.push(FrameType::FLOAT)),
			Loadable::Long(_) => return Ok(self.push_value(FrameType::LONG)),
			Loadable::Double(_) => return Ok(self.push_value(FrameType::DOUBLE)),
			Loadable::Dynamic(dynamic) => return self.push_descriptor(&dynamic.descriptor, types),
			Loadable::Class(_) => "java/lang/Class",
			Loadable::String(_) => "java/lang/String",
			Loadable::MethodType(_) => "java/lang/invoke/MethodType",
			Loadable::MethodHandle(_) => "java/lang/invoke/MethodHandle",
		};
		self.push(FrameType::object(types.normal(JavaStr::from_str(class))));
		Ok(())
	}

	/// Turns a type relative to the block input into an absolute one.
	fn resolve(t: FrameType, input_locals: &[FrameType], input_stack: &[FrameType]) -> Result<FrameType> {
		let absolute = match t.kind {
			Kind::Base(_) => return Ok(t),
			Kind::Local(local) => *input_locals.get(local as usize)
				.with_context(|| anyhow!("local variable {local} used beyond the {} local variables", input_locals.len()))?,
			Kind::Stack(n) => *input_stack.len().checked_sub(n as usize)
				.and_then(|index| input_stack.get(index))
				.with_context(|| anyhow!("stack underflow: popped {n} values with {} on the stack", input_stack.len()))?,
		};
		let resolved = absolute.with_dim_added(t.dim);
		if t.top_if_long_or_double && resolved.is_long_or_double() {
			Ok(FrameType::TOP)
		} else {
			Ok(resolved)
		}
	}

	/// Replaces types that got initialized by a constructor call within the block.
	fn initialized(&self, class: &JavaStr, t: FrameType, input_locals: &[FrameType], input_stack: &[FrameType], types: &mut TypeTable) -> Result<FrameType> {
		if self.initializations.is_empty() || t.dim != 0 {
			return Ok(t);
		}
		let constructed = match t.kind {
			Kind::Base(Base::UninitializedThis) => FrameType::object(types.normal(class)),
			Kind::Base(Base::Uninitialized(index)) => {
				let name = types.get(index)?.name().to_owned();
				FrameType::object(types.normal(&name))
			},
			_ => return Ok(t),
		};
		for &initialization in &self.initializations {
			if Frame::resolve(initialization, input_locals, input_stack)? == t {
				return Ok(constructed);
			}
		}
		Ok(t)
	}

	/// Resolves the output of the block.
	pub(crate) fn outgoing(&self, class: &JavaStr, types: &mut TypeTable) -> Result<Outgoing> {
		let (input_locals, input_stack) = self.input()
			.context("can't compute the output of a block without input")?;

		let mut locals = Vec::with_capacity(input_locals.len());
		for (index, &input) in input_locals.iter().enumerate() {
			let t = match self.output_locals.get(index).copied().flatten() {
				Some(t) => Frame::resolve(t, input_locals, input_stack)?,
				None => input,
			};
			locals.push(self.initialized(class, t, input_locals, input_stack, types)?);
		}

		let kept = input_stack.len().checked_sub(self.popped)
			.with_context(|| anyhow!("stack underflow: popped {} values with {} on the stack", self.popped, input_stack.len()))?;
		let mut stack = Vec::with_capacity(kept + self.output_stack.len());
		for &t in &input_stack[..kept] {
			stack.push(self.initialized(class, t, input_locals, input_stack, types)?);
		}
		for &t in &self.output_stack {
			let t = Frame::resolve(t, input_locals, input_stack)?;
			stack.push(self.initialized(class, t, input_locals, input_stack, types)?);
		}

		Ok(Outgoing { locals, stack, input_locals: input_locals.to_vec() })
	}

	/// Merges the output of a predecessor into the input of this block. `handler` is the caught type if this
	/// block is an exception handler of the predecessor. Returns whether the input changed.
	pub(crate) fn merge(&mut self, outgoing: &Outgoing, handler: Option<FrameType>, types: &mut TypeTable, hierarchy: &dyn TypeHierarchy) -> Result<bool> {
		let mut changed = merge_into(&mut self.input_locals, &outgoing.locals, types, hierarchy)?;
		if let Some(caught) = handler {
			changed |= merge_into(&mut self.input_locals, &outgoing.input_locals, types, hierarchy)?;
			changed |= merge_into(&mut self.input_stack, &[caught], types, hierarchy)?;
		} else {
			changed |= merge_into(&mut self.input_stack, &outgoing.stack, types, hierarchy)?;
		}
		Ok(changed)
	}
}

fn merge_into(target: &mut Option<Vec<FrameType>>, incoming: &[FrameType], types: &mut TypeTable, hierarchy: &dyn TypeHierarchy) -> Result<bool> {
	let Some(existing) = target else {
		let normalized = incoming.iter()
			.map(|t| if t.is_null() { FrameType::NULL } else { *t })
			.collect();
		*target = Some(normalized);
		return Ok(true);
	};
	if existing.len() != incoming.len() {
		bail!("can't merge {} types into {}: inconsistent stack height", incoming.len(), existing.len());
	}
	let mut changed = false;
	for (slot, &t) in existing.iter_mut().zip(incoming) {
		changed |= merge_type(t, slot, types, hierarchy)?;
	}
	Ok(changed)
}

/// Merges `incoming` into `slot`, returning whether `slot` changed.
pub(crate) fn merge_type(incoming: FrameType, slot: &mut FrameType, types: &mut TypeTable, hierarchy: &dyn TypeHierarchy) -> Result<bool> {
	let existing = *slot;
	if existing == incoming {
		return Ok(false);
	}
	let incoming = if incoming.is_null() {
		if existing == FrameType::NULL {
			return Ok(false);
		}
		FrameType::NULL
	} else {
		incoming
	};

	let merged = if existing.is_reference() {
		if incoming == FrameType::NULL {
			return Ok(false);
		}
		if incoming.dim == existing.dim && incoming.base_kind() == existing.base_kind() {
			match (existing.kind, incoming.kind) {
				(Kind::Base(Base::Object(a)), Kind::Base(Base::Object(b))) => {
					FrameType::array(existing.dim, Base::Object(types.merged(b, a, hierarchy)?))
				},
				_ => FrameType::array(existing.dim - 1, Base::Object(types.normal(JavaStr::from_str(OBJECT)))),
			}
		} else if incoming.is_reference() {
			let dim = |t: FrameType| if t.dim == 0 || t.is_object() { t.dim } else { t.dim - 1 };
			let dim = dim(incoming).min(dim(existing));
			FrameType::array(dim, Base::Object(types.normal(JavaStr::from_str(OBJECT))))
		} else {
			FrameType::TOP
		}
	} else if existing == FrameType::NULL && incoming.is_reference() {
		incoming
	} else {
		FrameType::TOP
	};

	if merged == existing {
		Ok(false)
	} else {
		*slot = merged;
		Ok(true)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::class_constants::opcode::*;
	use crate::flow::frame::{Base, Frame, FrameType, merge_type};
	use crate::flow::label::Labels;
	use crate::flow::types::TypeTable;
	use crate::hierarchy::SuperClassMap;
	use crate::tree::code::{Instruction, MemberRef};
	use crate::tree::MethodHeader;

	fn class() -> &'static JavaStr {
		JavaStr::from_str("a/Test")
	}

	fn entry_frame(header: &MethodHeader, max_locals: usize, types: &mut TypeTable) -> Result<Frame> {
		let mut labels = Labels::new();
		let mut frame = Frame::new(labels.create());
		frame.init_input(class(), header, max_locals, types)?;
		Ok(frame)
	}

	#[test]
	fn arithmetic() -> Result<()> {
		let mut types = TypeTable::new();
		let header = MethodHeader::new(0x0008, "f", "()I");
		let mut frame = entry_frame(&header, 0, &mut types)?;
		for opcode in [ICONST_1, ICONST_2, IADD] {
			frame.execute(&Instruction::Simple(opcode), 0, &mut types)?;
		}
		assert_eq!(frame.output_stack_max, 2);
		let outgoing = frame.outgoing(class(), &mut types)?;
		assert_eq!(outgoing.stack, vec![FrameType::INTEGER]);
		Ok(())
	}

	#[test]
	fn parameters_and_long_stores() -> Result<()> {
		let mut types = TypeTable::new();
		let header = MethodHeader::new(0x0001, "f", "(JLjava/lang/String;)V");
		let mut frame = entry_frame(&header, 5, &mut types)?;
		let this = types.normal(class());
		let string = types.normal(JavaStr::from_str("java/lang/String"));

		// overwrite the upper half of the long in 1 and 2
		frame.execute(&Instruction::Simple(ICONST_0), 0, &mut types)?;
		frame.execute(&Instruction::Var { opcode: ISTORE, index: 2 }, 1, &mut types)?;
		// and put a long into 3 and 4
		frame.execute(&Instruction::Simple(LCONST_1), 2, &mut types)?;
		frame.execute(&Instruction::Var { opcode: LSTORE, index: 3 }, 3, &mut types)?;

		let outgoing = frame.outgoing(class(), &mut types)?;
		assert_eq!(outgoing.locals, vec![
			FrameType::object(this),
			FrameType::TOP,
			FrameType::INTEGER,
			FrameType::LONG,
			FrameType::TOP,
		]);
		assert_eq!(outgoing.input_locals[3], FrameType::object(string));
		Ok(())
	}

	#[test]
	fn constructor_call_initializes() -> Result<()> {
		let mut types = TypeTable::new();
		let header = MethodHeader::new(0x0008, "f", "()V");
		let mut frame = entry_frame(&header, 1, &mut types)?;
		let init = MemberRef::new("java/lang/Object", "<init>", "()V");

		frame.execute(&Instruction::Type { opcode: NEW, class: "java/lang/Object".into() }, 0, &mut types)?;
		frame.execute(&Instruction::Simple(DUP), 3, &mut types)?;
		frame.execute(&Instruction::Invoke { opcode: INVOKESPECIAL, method: init, interface: false }, 4, &mut types)?;
		frame.execute(&Instruction::Var { opcode: ASTORE, index: 0 }, 7, &mut types)?;

		let object = types.normal(JavaStr::from_str("java/lang/Object"));
		let outgoing = frame.outgoing(class(), &mut types)?;
		assert_eq!(outgoing.locals, vec![FrameType::object(object)]);
		assert_eq!(frame.output_stack_max, 2);
		Ok(())
	}

	#[test]
	fn merging_twice_changes_nothing() -> Result<()> {
		let hierarchy = SuperClassMap::with_platform_classes();
		let mut types = TypeTable::new();
		let header = MethodHeader::new(0x0008, "f", "(Ljava/lang/Integer;)V");
		let frame = entry_frame(&header, 1, &mut types)?;
		let outgoing = frame.outgoing(class(), &mut types)?;

		let mut labels = Labels::new();
		let mut target = Frame::new(labels.create());
		assert!(target.merge(&outgoing, None, &mut types, &hierarchy)?);
		assert!(!target.merge(&outgoing, None, &mut types, &hierarchy)?);

		let integer = types.normal(JavaStr::from_str("java/lang/Integer"));
		let empty: &[FrameType] = &[];
		assert_eq!(target.input(), Some((&[FrameType::object(integer)][..], empty)));
		Ok(())
	}

	#[test]
	fn merging_types() -> Result<()> {
		let hierarchy = SuperClassMap::with_platform_classes();
		let mut types = TypeTable::new();
		let integer = FrameType::object(types.normal(JavaStr::from_str("java/lang/Integer")));
		let long = FrameType::object(types.normal(JavaStr::from_str("java/lang/Long")));
		let number = FrameType::object(types.normal(JavaStr::from_str("java/lang/Number")));
		let object = types.normal(JavaStr::from_str("java/lang/Object"));

		let mut slot = integer;
		assert!(merge_type(long, &mut slot, &mut types, &hierarchy)?);
		assert_eq!(slot, number);
		assert!(!merge_type(FrameType::NULL, &mut slot, &mut types, &hierarchy)?);

		let mut slot = FrameType::NULL;
		assert!(merge_type(integer, &mut slot, &mut types, &hierarchy)?);
		assert_eq!(slot, integer);

		// int[] and float[] only have Object in common
		let mut slot = FrameType::array(1, Base::Integer);
		assert!(merge_type(FrameType::array(1, Base::Float), &mut slot, &mut types, &hierarchy)?);
		assert_eq!(slot, FrameType::object(object));

		// Integer[][] and int[] only have Object in common as well
		let mut slot = FrameType::array(2, Base::Object(0));
		assert!(merge_type(FrameType::array(1, Base::Integer), &mut slot, &mut types, &hierarchy)?);
		assert_eq!(slot, FrameType::array(0, Base::Object(object)));

		let mut slot = FrameType::INTEGER;
		assert!(merge_type(FrameType::FLOAT, &mut slot, &mut types, &hierarchy)?);
		assert_eq!(slot, FrameType::TOP);
		assert!(!merge_type(FrameType::INTEGER, &mut slot, &mut types, &hierarchy)?);
		Ok(())
	}
}
