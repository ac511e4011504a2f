//! Decoding of `Code` attributes.
//!
//! The bytecode is walked twice. The first walk only finds the offsets that need a [`Label`], the second
//! one decodes the instructions and visits them, placing the labels found before.

use std::collections::HashSet;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::bytes::ByteReader;
use crate::class_constants::{attribute, frame, opcode, verification_type};
use crate::descriptor::{parse_method, BaseType, Type};
use crate::reader::labels::Labels;
use crate::reader::pool::{BootstrapMethodRead, PoolRead};
use crate::tree::code::{Instruction, LocalVariable, StackMapFrame, TryCatch, VerificationType};
use crate::tree::MethodHeader;
use crate::visitor::{MethodVisitor, ReadOptions};

/// What decoding a method body needs from the class around it.
pub(crate) struct CodeContext<'r, 'a> {
	pub(crate) pool: &'r PoolRead<'a>,
	pub(crate) bootstrap_methods: &'r [BootstrapMethodRead],
	pub(crate) class: &'r JavaStr,
	pub(crate) options: ReadOptions,
}

/// A `LocalVariableTable` or `LocalVariableTypeTable` entry, with offsets not yet turned into labels.
struct LocalVariableRead<'a> {
	start: usize,
	end: usize,
	name: &'a JavaStr,
	/// The descriptor, or the signature for `LocalVariableTypeTable` entries.
	descriptor: &'a JavaStr,
	index: u16,
}

fn branch_target(opcode_pos: usize, branch: i32) -> Result<usize> {
	opcode_pos.checked_add_signed(branch as isize)
		.with_context(|| anyhow!("can't add branch offset {branch:?} to opcode position {opcode_pos:?}"))
}

fn align_to_4_byte_boundary(r: &mut ByteReader) -> Result<()> {
	r.skip((4 - r.position() % 4) % 4)
}

/// Reads the contents of a `Code` attribute and visits them.
pub(crate) fn read_code<M: MethodVisitor>(
	reader: &mut ByteReader,
	context: &CodeContext,
	header: &MethodHeader,
	visitor: &mut M,
) -> Result<()> {
	let pool = context.pool;

	let max_stack = reader.read_u16()?;
	let max_locals = reader.read_u16()?;

	let code_length = reader.read_u32_as_usize()?;
	// This limit here is defined by the Java Virtual Machine Specification.
	if code_length == 0 || code_length > u16::MAX as usize {
		bail!("`code_length` must be greater than zero and less than 65536, got {code_length:?}");
	}
	let code = reader.read_slice(code_length)?;

	let mut labels = Labels::new(code_length);
	scan_labels(code, &mut labels)?;

	let try_catches = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(TryCatch {
			start: labels.create(r.read_u16_as_usize()?)?,
			end: labels.create_end(r.read_u16_as_usize()?)?,
			handler: labels.create(r.read_u16_as_usize()?)?,
			catch_type: pool.optional_class(r.read_u16()?)?.map(JavaStr::to_owned),
		})
	)?;

	let mut line_numbers = Vec::new();
	let mut local_variables = Vec::new();
	let mut local_variable_types = Vec::new();
	let mut frames = None;

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let name = pool.utf8_bytes(reader.read_u16()?)?;
		let length = reader.read_u32_as_usize()?;
		let mut r = ByteReader::new(reader.read_slice(length)?);

		let debug = !context.options.skip_debug;
		match name {
			name if name == attribute::LINE_NUMBER_TABLE.as_bytes() && debug => {
				for _ in 0..r.read_u16()? {
					let start = r.read_u16_as_usize()?;
					let line = r.read_u16()?;
					labels.create_debug(start)?;
					line_numbers.push((start, line));
				}
			},
			name if name == attribute::LOCAL_VARIABLE_TABLE.as_bytes() && debug => {
				read_local_variable_table(&mut r, pool, &mut labels, &mut local_variables)
					.context("failed to read `LocalVariableTable`")?;
			},
			name if name == attribute::LOCAL_VARIABLE_TYPE_TABLE.as_bytes() && debug => {
				read_local_variable_table(&mut r, pool, &mut labels, &mut local_variable_types)
					.context("failed to read `LocalVariableTypeTable`")?;
			},
			name if name == attribute::STACK_MAP_TABLE.as_bytes() && context.options.frames => {
				if frames.is_some() {
					bail!("only one `StackMapTable` attribute is allowed");
				}
				let initial = initial_locals(context.class, header)?;
				frames = Some(read_stack_map_table(&mut r, pool, &mut labels, initial)?);
			},
			name if name == attribute::STACK_MAP.as_bytes() && context.options.frames => {
				if frames.is_some() {
					bail!("only one `StackMap` attribute is allowed");
				}
				frames = Some(read_stack_map(&mut r, pool, &mut labels)?);
			},
			_ => {},
		}
	}

	// At this point all the labels are known.
	let labels = labels;

	for try_catch in try_catches {
		visitor.visit_try_catch(try_catch)?;
	}

	line_numbers.sort_by_key(|&(start, _)| start);
	let mut line_numbers = line_numbers.into_iter().peekable();
	let mut frames = frames.unwrap_or_default().into_iter().peekable();
	let mut placed = HashSet::new();

	let mut r = ByteReader::new(code);
	while r.position() < code.len() {
		let opcode_pos = r.position();

		if let Some(label) = labels.get(opcode_pos) {
			if labels.is_normal(opcode_pos) {
				visitor.visit_label(label)?;
			} else {
				visitor.visit_debug_label(label)?;
			}
			placed.insert(opcode_pos);

			while let Some((start, line)) = line_numbers.next_if(|&(start, _)| start <= opcode_pos) {
				if start == opcode_pos {
					visitor.visit_line_number(line, label)?;
				}
			}
			while let Some((offset, frame)) = frames.next_if(|(offset, _)| *offset <= opcode_pos) {
				if offset == opcode_pos {
					visitor.visit_frame(frame)?;
				}
			}
		}

		let instruction = read_instruction(&mut r, opcode_pos, context, &labels)
			.with_context(|| anyhow!("at bytecode offset {opcode_pos}"))?;
		visitor.visit_instruction(instruction)?;
	}
	if let Some(label) = labels.get(code.len()) {
		if labels.is_normal(code.len()) {
			visitor.visit_label(label)?;
		} else {
			visitor.visit_debug_label(label)?;
		}
		placed.insert(code.len());
	}

	for (pc, _) in labels.iter() {
		if labels.is_normal(pc) && !placed.contains(&pc) {
			bail!("bytecode offset {pc} is referenced, but isn't the start of an instruction");
		}
	}

	for local_variable in &local_variables {
		if !placed.contains(&local_variable.start) || !placed.contains(&local_variable.end) {
			continue;
		}
		let signature = local_variable_types.iter()
			.find(|t| t.start == local_variable.start && t.end == local_variable.end && t.index == local_variable.index)
			.map(|t| t.descriptor.to_owned());
		visitor.visit_local_variable(LocalVariable {
			name: local_variable.name.to_owned(),
			descriptor: local_variable.descriptor.to_owned(),
			signature,
			start: labels.try_get(local_variable.start)?,
			end: labels.try_get(local_variable.end)?,
			index: local_variable.index,
		})?;
	}

	visitor.visit_max_stack(max_stack, max_locals)
}

fn read_local_variable_table<'a>(
	r: &mut ByteReader,
	pool: &'a PoolRead,
	labels: &mut Labels,
	table: &mut Vec<LocalVariableRead<'a>>,
) -> Result<()> {
	for _ in 0..r.read_u16()? {
		let start = r.read_u16_as_usize()?;
		let end = start + r.read_u16_as_usize()?;
		labels.create_debug(start)?;
		labels.create_debug(end)?;
		table.push(LocalVariableRead {
			start,
			end,
			name: pool.utf8(r.read_u16()?)?,
			descriptor: pool.utf8(r.read_u16()?)?,
			index: r.read_u16()?,
		});
	}
	Ok(())
}

/// Creates all the labels referenced by any branching instruction.
fn scan_labels(code: &[u8], labels: &mut Labels) -> Result<()> {
	let mut r = ByteReader::new(code);
	while r.position() < code.len() {
		let opcode_pos = r.position();

		(|| {
			match r.read_u8()? {
				opcode::NOP..=opcode::DCONST_1 |
				opcode::ILOAD_0..=opcode::SALOAD |
				opcode::ISTORE_0..=opcode::LXOR |
				opcode::I2L..=opcode::DCMPG |
				opcode::IRETURN..=opcode::RETURN |
				opcode::ARRAYLENGTH |
				opcode::ATHROW |
				opcode::MONITORENTER |
				opcode::MONITOREXIT => {},
				opcode::BIPUSH |
				opcode::LDC |
				opcode::ILOAD..=opcode::ALOAD |
				opcode::ISTORE..=opcode::ASTORE |
				opcode::RET |
				opcode::NEWARRAY => r.skip(1)?,
				opcode::SIPUSH |
				opcode::LDC_W |
				opcode::LDC2_W |
				opcode::IINC |
				opcode::GETSTATIC..=opcode::INVOKESTATIC |
				opcode::NEW |
				opcode::ANEWARRAY |
				opcode::CHECKCAST |
				opcode::INSTANCEOF => r.skip(2)?,
				opcode::MULTIANEWARRAY => r.skip(3)?,
				opcode::INVOKEINTERFACE |
				opcode::INVOKEDYNAMIC => r.skip(4)?,
				opcode::WIDE => match r.read_u8()? {
					opcode::ILOAD..=opcode::ALOAD |
					opcode::ISTORE..=opcode::ASTORE |
					opcode::RET => r.skip(2)?,
					opcode::IINC => r.skip(4)?,
					wide_opcode => bail!("unknown wide opcode {wide_opcode:x?}"),
				},
				opcode::IFEQ..=opcode::JSR |
				opcode::IFNULL |
				opcode::IFNONNULL => {
					labels.create(branch_target(opcode_pos, r.read_i16()? as i32)?)?;
				},
				opcode::GOTO_W |
				opcode::JSR_W => {
					labels.create(branch_target(opcode_pos, r.read_i32()?)?)?;
				},
				opcode::TABLESWITCH => {
					align_to_4_byte_boundary(&mut r)?;
					labels.create(branch_target(opcode_pos, r.read_i32()?)?)?;

					let low = r.read_i32()?;
					let high = r.read_i32()?;
					if low > high {
						bail!("in tableswitch `low` must be lower or equal to `high`, it's low={low:?} and high={high:?}");
					}
					for _ in low..=high {
						labels.create(branch_target(opcode_pos, r.read_i32()?)?)?;
					}
				},
				opcode::LOOKUPSWITCH => {
					align_to_4_byte_boundary(&mut r)?;
					labels.create(branch_target(opcode_pos, r.read_i32()?)?)?;

					let n = r.read_i32()?;
					if n < 0 {
						bail!("in lookupswitch the `npairs` must be positive, it's npairs={n:?}");
					}
					for _ in 0..n {
						let _key = r.read_i32()?;
						labels.create(branch_target(opcode_pos, r.read_i32()?)?)?;
					}
				},
				opcode => bail!("unknown opcode {opcode:x?}"),
			}
			Ok(())
		})()
			.with_context(|| anyhow!("at bytecode offset {opcode_pos}"))?;
	}
	Ok(())
}

fn read_instruction(r: &mut ByteReader, opcode_pos: usize, context: &CodeContext, labels: &Labels) -> Result<Instruction> {
	let pool = context.pool;
	let bootstrap_methods = context.bootstrap_methods;

	let jump = |opcode, branch| -> Result<Instruction> {
		Ok(Instruction::Jump { opcode, target: labels.try_get(branch_target(opcode_pos, branch)?)? })
	};

	Ok(match r.read_u8()? {
		opcode @ (opcode::NOP..=opcode::DCONST_1 |
		opcode::IALOAD..=opcode::SALOAD |
		opcode::IASTORE..=opcode::LXOR |
		opcode::I2L..=opcode::DCMPG |
		opcode::IRETURN..=opcode::RETURN |
		opcode::ARRAYLENGTH |
		opcode::ATHROW |
		opcode::MONITORENTER |
		opcode::MONITOREXIT) => Instruction::Simple(opcode),
		opcode::BIPUSH => Instruction::Int { opcode: opcode::BIPUSH, operand: r.read_i8()? as i32 },
		opcode::SIPUSH => Instruction::Int { opcode: opcode::SIPUSH, operand: r.read_i16()? as i32 },
		opcode::NEWARRAY => Instruction::Int { opcode: opcode::NEWARRAY, operand: r.read_u8()? as i32 },
		opcode::LDC => Instruction::Ldc(pool.loadable(r.read_u8()? as u16, bootstrap_methods)?),
		opcode::LDC_W | opcode::LDC2_W => Instruction::Ldc(pool.loadable(r.read_u16()?, bootstrap_methods)?),
		opcode @ (opcode::ILOAD..=opcode::ALOAD | opcode::ISTORE..=opcode::ASTORE | opcode::RET) => {
			Instruction::Var { opcode, index: r.read_u8()? as u16 }
		},
		opcode @ opcode::ILOAD_0..=opcode::ALOAD_3 => {
			let shifted = opcode - opcode::ILOAD_0;
			Instruction::Var { opcode: opcode::ILOAD + (shifted >> 2), index: (shifted & 0b11) as u16 }
		},
		opcode @ opcode::ISTORE_0..=opcode::ASTORE_3 => {
			let shifted = opcode - opcode::ISTORE_0;
			Instruction::Var { opcode: opcode::ISTORE + (shifted >> 2), index: (shifted & 0b11) as u16 }
		},
		opcode::IINC => {
			let index = r.read_u8()? as u16;
			let increment = r.read_i8()? as i16;
			Instruction::IInc { index, increment }
		},
		opcode @ (opcode::IFEQ..=opcode::JSR | opcode::IFNULL | opcode::IFNONNULL) => jump(opcode, r.read_i16()? as i32)?,
		opcode::GOTO_W => jump(opcode::GOTO, r.read_i32()?)?,
		opcode::JSR_W => jump(opcode::JSR, r.read_i32()?)?,
		opcode::TABLESWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = labels.try_get(branch_target(opcode_pos, r.read_i32()?)?)?;
			let low = r.read_i32()?;
			let high = r.read_i32()?;
			if low > high {
				bail!("in tableswitch `low` must be lower or equal to `high`, it's low={low:?} and high={high:?}");
			}

			let mut targets = Vec::with_capacity(((high as i64 - low as i64 + 1) as usize).min(r.data().len() / 4));
			for _ in low..=high {
				targets.push(labels.try_get(branch_target(opcode_pos, r.read_i32()?)?)?);
			}
			Instruction::TableSwitch { default, low, high, targets }
		},
		opcode::LOOKUPSWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = labels.try_get(branch_target(opcode_pos, r.read_i32()?)?)?;
			let n = r.read_i32()?;
			if n < 0 {
				bail!("in lookupswitch the `npairs` must be positive, it's npairs={n:?}");
			}

			let mut pairs = Vec::with_capacity((n as usize).min(r.data().len() / 8));
			for _ in 0..n {
				let key = r.read_i32()?;
				let target = labels.try_get(branch_target(opcode_pos, r.read_i32()?)?)?;
				pairs.push((key, target));
			}
			Instruction::LookupSwitch { default, pairs }
		},
		opcode @ opcode::GETSTATIC..=opcode::PUTFIELD => {
			let (field, _) = pool.member_ref(r.read_u16()?)?;
			Instruction::Field { opcode, field }
		},
		opcode @ opcode::INVOKEVIRTUAL..=opcode::INVOKESTATIC => {
			let (method, interface) = pool.member_ref(r.read_u16()?)?;
			Instruction::Invoke { opcode, method, interface }
		},
		opcode::INVOKEINTERFACE => {
			let (method, interface) = pool.member_ref(r.read_u16()?)?;
			let _count = r.read_u8()?;
			let _zero = r.read_u8()?;
			Instruction::Invoke { opcode: opcode::INVOKEINTERFACE, method, interface }
		},
		opcode::INVOKEDYNAMIC => {
			let dynamic = pool.invoke_dynamic(r.read_u16()?, bootstrap_methods)?;
			let _zero = r.read_u16()?;
			Instruction::InvokeDynamic(dynamic)
		},
		opcode @ (opcode::NEW | opcode::ANEWARRAY | opcode::CHECKCAST | opcode::INSTANCEOF) => {
			Instruction::Type { opcode, class: pool.class(r.read_u16()?)?.to_owned() }
		},
		opcode::WIDE => match r.read_u8()? {
			opcode @ (opcode::ILOAD..=opcode::ALOAD | opcode::ISTORE..=opcode::ASTORE | opcode::RET) => {
				Instruction::Var { opcode, index: r.read_u16()? }
			},
			opcode::IINC => {
				let index = r.read_u16()?;
				let increment = r.read_i16()?;
				Instruction::IInc { index, increment }
			},
			wide_opcode => bail!("unknown wide opcode {wide_opcode:x?}"),
		},
		opcode::MULTIANEWARRAY => {
			let class = pool.class(r.read_u16()?)?.to_owned();
			let dimensions = r.read_u8()?;
			Instruction::MultiANewArray { class, dimensions }
		},
		opcode => bail!("unknown opcode {opcode:x?}"),
	})
}

fn verification_type_of(t: &Type) -> VerificationType {
	if t.array_dimension > 0 {
		let mut descriptor = JavaString::with_capacity(t.array_dimension as usize + 1);
		for _ in 0..t.array_dimension {
			descriptor.push('[');
		}
		match &t.base {
			BaseType::Byte => descriptor.push('B'),
			BaseType::Char => descriptor.push('C'),
			BaseType::Double => descriptor.push('D'),
			BaseType::Float => descriptor.push('F'),
			BaseType::Int => descriptor.push('I'),
			BaseType::Long => descriptor.push('J'),
			BaseType::Short => descriptor.push('S'),
			BaseType::Boolean => descriptor.push('Z'),
			BaseType::Object(class) => {
				descriptor.push('L');
				descriptor.push_java_str(class);
				descriptor.push(';');
			},
		}
		return VerificationType::Object(descriptor);
	}
	match &t.base {
		BaseType::Byte | BaseType::Char | BaseType::Int | BaseType::Short | BaseType::Boolean => VerificationType::Integer,
		BaseType::Float => VerificationType::Float,
		BaseType::Long => VerificationType::Long,
		BaseType::Double => VerificationType::Double,
		BaseType::Object(class) => VerificationType::Object(class.clone()),
	}
}

/// The locals of the implicit frame at the start of a method, one entry per `long` and `double`, like frames store them.
pub(crate) fn initial_locals(class: &JavaStr, header: &MethodHeader) -> Result<Vec<VerificationType>> {
	let method = parse_method(&header.descriptor)?;
	let mut locals = Vec::with_capacity(method.parameters.len() + 1);
	if !header.is_static() {
		if header.is_constructor() && class != JavaStr::from_str(crate::hierarchy::OBJECT) {
			locals.push(VerificationType::UninitializedThis);
		} else {
			locals.push(VerificationType::Object(class.to_owned()));
		}
	}
	locals.extend(method.parameters.iter().map(verification_type_of));
	Ok(locals)
}

fn read_verification_type(r: &mut ByteReader, pool: &PoolRead, labels: &mut Labels) -> Result<VerificationType> {
	Ok(match r.read_u8()? {
		verification_type::TOP => VerificationType::Top,
		verification_type::INTEGER => VerificationType::Integer,
		verification_type::FLOAT => VerificationType::Float,
		verification_type::DOUBLE => VerificationType::Double,
		verification_type::LONG => VerificationType::Long,
		verification_type::NULL => VerificationType::Null,
		verification_type::UNINITIALIZED_THIS => VerificationType::UninitializedThis,
		verification_type::OBJECT => VerificationType::Object(pool.class(r.read_u16()?)?.to_owned()),
		verification_type::UNINITIALIZED => VerificationType::Uninitialized(labels.create(r.read_u16_as_usize()?)?),
		tag => bail!("unknown verification_type_info tag {tag}"),
	})
}

fn read_verification_types(r: &mut ByteReader, pool: &PoolRead, labels: &mut Labels, count: usize) -> Result<Vec<VerificationType>> {
	let mut types = Vec::with_capacity(count);
	for _ in 0..count {
		types.push(read_verification_type(r, pool, labels)?);
	}
	Ok(types)
}

/// Reads a `StackMapTable`, expanding every frame to its full locals and stack.
fn read_stack_map_table(
	r: &mut ByteReader,
	pool: &PoolRead,
	labels: &mut Labels,
	initial_locals: Vec<VerificationType>,
) -> Result<Vec<(usize, StackMapFrame)>> {
	let number_of_entries = r.read_u16_as_usize()?;
	let mut frames = Vec::with_capacity(number_of_entries);
	let mut locals = initial_locals;
	let mut offset = None;

	for _ in 0..number_of_entries {
		let frame_type = r.read_u8()?;
		let (offset_delta, stack) = match frame_type {
			0..=63 => (frame_type as usize, Vec::new()),
			64..=127 => ((frame_type - frame::SAME_LOCALS_1_STACK_ITEM) as usize, read_verification_types(r, pool, labels, 1)?),
			frame::SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
				let offset_delta = r.read_u16_as_usize()?;
				(offset_delta, read_verification_types(r, pool, labels, 1)?)
			},
			248..=250 => {
				let offset_delta = r.read_u16_as_usize()?;
				let k = (frame::SAME_FRAME_EXTENDED - frame_type) as usize;
				if k > locals.len() {
					bail!("chop frame removes {k} locals, but there are only {}", locals.len());
				}
				locals.truncate(locals.len() - k);
				(offset_delta, Vec::new())
			},
			frame::SAME_FRAME_EXTENDED => (r.read_u16_as_usize()?, Vec::new()),
			252..=254 => {
				let offset_delta = r.read_u16_as_usize()?;
				let k = (frame_type - frame::SAME_FRAME_EXTENDED) as usize;
				locals.extend(read_verification_types(r, pool, labels, k)?);
				(offset_delta, Vec::new())
			},
			frame::FULL_FRAME => {
				let offset_delta = r.read_u16_as_usize()?;
				let count = r.read_u16_as_usize()?;
				locals = read_verification_types(r, pool, labels, count)?;
				let count = r.read_u16_as_usize()?;
				(offset_delta, read_verification_types(r, pool, labels, count)?)
			},
			frame_type => bail!("unknown stack map frame type {frame_type}"),
		};

		let current = match offset {
			None => offset_delta,
			Some(previous) => previous + offset_delta + 1,
		};
		offset = Some(current);
		labels.create(current)?;
		frames.push((current, StackMapFrame { locals: locals.clone(), stack }));
	}
	Ok(frames)
}

/// Reads the `StackMap` attribute of class files before version 50, made of full frames with absolute offsets.
fn read_stack_map(r: &mut ByteReader, pool: &PoolRead, labels: &mut Labels) -> Result<Vec<(usize, StackMapFrame)>> {
	let number_of_entries = r.read_u16_as_usize()?;
	let mut frames = Vec::with_capacity(number_of_entries);
	for _ in 0..number_of_entries {
		let offset = r.read_u16_as_usize()?;
		let count = r.read_u16_as_usize()?;
		let locals = read_verification_types(r, pool, labels, count)?;
		let count = r.read_u16_as_usize()?;
		let stack = read_verification_types(r, pool, labels, count)?;
		labels.create(offset)?;
		frames.push((offset, StackMapFrame { locals, stack }));
	}
	// The format doesn't guarantee ordered entries.
	frames.sort_by_key(|&(offset, _)| offset);
	Ok(frames)
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::reader::code::initial_locals;
	use crate::tree::code::VerificationType;
	use crate::tree::MethodHeader;

	#[test]
	fn locals_at_method_start() -> Result<()> {
		let class = JavaStr::from_str("a/B");

		let constructor = MethodHeader::new(0, "<init>", "(J[Ljava/lang/String;)V");
		assert_eq!(initial_locals(class, &constructor)?, vec![
			VerificationType::UninitializedThis,
			VerificationType::Long,
			VerificationType::Object("[Ljava/lang/String;".into()),
		]);

		let method = MethodHeader::new(0x0008, "f", "(ZLa/C;[[I)V");
		assert_eq!(initial_locals(class, &method)?, vec![
			VerificationType::Integer,
			VerificationType::Object("a/C".into()),
			VerificationType::Object("[[I".into()),
		]);
		Ok(())
	}
}
