//! Assembling a recorded method body into a `Code` attribute.
//!
//! Jumps are first written with 16 bit offsets. If a forward jump turns out to be too far, the whole body is
//! written again, that time using the wide form for that jump. Each attempt runs the control flow graph along
//! with the encoding, the frames or the maximum stack size are computed from the final attempt.

use std::collections::{HashMap, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaStr;
use log::{debug, trace};
use crate::bytes::ClassWrite;
use crate::class_constants::attribute;
use crate::class_constants::opcode::*;
use crate::class_constants::version;
use crate::descriptor::parse_method;
use crate::error::CapacityError;
use crate::flow::graph::{Graph, Mode};
use crate::flow::handlers::Handler;
use crate::flow::label::LabelId;
use crate::flow::solver::{max_stack, solve_frames, store_frames};
use crate::flow::stack_map::StackMapWriter;
use crate::flow::types::TypeTable;
use crate::hierarchy::TypeHierarchy;
use crate::pool::ConstantPool;
use crate::tree::code::{Instruction, Label, LocalVariable, StackMapFrame, TryCatch};
use crate::tree::MethodHeader;
use crate::writer::attributes::{write_attribute, write_full_frame};

const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// One event of a method body, in the order it was visited.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CodeEvent {
	Label(Label),
	DebugLabel(Label),
	LineNumber(u16, Label),
	Frame(StackMapFrame),
	Instruction(Instruction),
}

/// A method body as visited, before it's assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MethodCode {
	pub(crate) events: Vec<CodeEvent>,
	pub(crate) try_catches: Vec<TryCatch>,
	pub(crate) local_variables: Vec<LocalVariable>,
	pub(crate) max_stack: u16,
	pub(crate) max_locals: u16,
}

impl MethodCode {
	fn has_instructions(&self) -> bool {
		self.events.iter().any(|event| matches!(event, CodeEvent::Instruction(_)))
	}

	/// Labels that are jumped to or bound the range of an exception handler.
	fn referenced_labels(&self) -> HashSet<Label> {
		let mut labels = HashSet::new();
		for try_catch in &self.try_catches {
			labels.extend([try_catch.start, try_catch.end, try_catch.handler]);
		}
		for event in &self.events {
			match event {
				CodeEvent::Instruction(Instruction::Jump { target, .. }) => {
					labels.insert(*target);
				},
				CodeEvent::Instruction(Instruction::TableSwitch { default, targets, .. }) => {
					labels.insert(*default);
					labels.extend(targets);
				},
				CodeEvent::Instruction(Instruction::LookupSwitch { default, pairs }) => {
					labels.insert(*default);
					labels.extend(pairs.iter().map(|(_, label)| *label));
				},
				_ => {},
			}
		}
		labels
	}
}

/// What assembling a method needs to know about its class.
pub(crate) struct MethodContext<'w> {
	pub(crate) class: &'w JavaStr,
	pub(crate) major_version: u16,
	/// Compute full frames, and not only the maximum stack size.
	pub(crate) frames: bool,
	pub(crate) hierarchy: &'w dyn TypeHierarchy,
}

/// One attempt at writing the instructions.
struct Assembly<'m> {
	graph: Graph,
	code: Vec<u8>,
	types: TypeTable,
	ids: HashMap<Label, LabelId>,
	referenced: &'m HashSet<Label>,
	has_handlers: bool,
	max_locals: usize,
	line_numbers: Vec<(u16, LabelId)>,
	/// Frames visited along with the code, and the offset they're at.
	frames: Vec<(usize, &'m StackMapFrame)>,
}

impl<'m> Assembly<'m> {
	fn new(mode: Mode, method: &'m MethodCode, referenced: &'m HashSet<Label>, max_locals: usize) -> Result<Assembly<'m>> {
		let mut code = Vec::new();
		let graph = Graph::new(mode, &mut code)?;
		Ok(Assembly {
			graph,
			code,
			types: TypeTable::new(),
			ids: HashMap::new(),
			referenced,
			has_handlers: !method.try_catches.is_empty(),
			max_locals,
			line_numbers: Vec::new(),
			frames: Vec::new(),
		})
	}

	fn id(&mut self, label: Label) -> LabelId {
		*self.ids.entry(label).or_insert_with(|| self.graph.labels.create())
	}

	/// The id of a label that must already be placed.
	fn placed(&self, label: Label) -> Result<LabelId> {
		self.ids.get(&label).copied()
			.filter(|&id| self.graph.labels[id].is_resolved())
			.with_context(|| anyhow!("label {label:?} is used but never placed"))
	}

	fn position(&self, label: Label) -> Result<usize> {
		Ok(self.graph.labels[self.placed(label)?].position)
	}

	fn event(&mut self, index: usize, event: &'m CodeEvent, wide: &HashSet<usize>, pool: &mut ConstantPool) -> Result<()> {
		match event {
			&CodeEvent::Label(label) => {
				let id = self.id(label);
				self.graph.visit_label(id, &mut self.code)
			},
			&CodeEvent::DebugLabel(label) => {
				let id = self.id(label);
				if !self.referenced.contains(&label) {
					self.graph.labels[id].debug = true;
				}
				self.graph.visit_label(id, &mut self.code)
			},
			&CodeEvent::LineNumber(line, label) => {
				let id = self.id(label);
				self.line_numbers.push((line, id));
				Ok(())
			},
			CodeEvent::Frame(frame) => {
				self.frames.push((self.code.len(), frame));
				Ok(())
			},
			CodeEvent::Instruction(instruction) => self.instruction(index, instruction, wide, pool)
				.with_context(|| anyhow!("failed to write instruction {instruction:?} at offset {}", self.code.len())),
		}
	}

	fn use_local(&mut self, index: u16, size: usize) {
		self.max_locals = self.max_locals.max(index as usize + size);
	}

	fn instruction(&mut self, index: usize, instruction: &Instruction, wide: &HashSet<usize>, pool: &mut ConstantPool) -> Result<()> {
		let offset = self.code.len();
		match instruction {
			&Instruction::Simple(opcode @ (ILOAD_0..=ALOAD_3)) => {
				let n = opcode - ILOAD_0;
				return self.instruction(index, &Instruction::Var { opcode: ILOAD + n / 4, index: (n % 4) as u16 }, wide, pool);
			},
			&Instruction::Simple(opcode @ (ISTORE_0..=ASTORE_3)) => {
				let n = opcode - ISTORE_0;
				return self.instruction(index, &Instruction::Var { opcode: ISTORE + n / 4, index: (n % 4) as u16 }, wide, pool);
			},
			&Instruction::Simple(opcode) => {
				if matches!(opcode, WIDE | LDC | LDC_W | LDC2_W) {
					bail!("opcode {opcode:#x} takes operands");
				}
				self.code.write_u8(opcode);
				self.graph.execute(instruction, offset, &mut self.types)?;
				if matches!(opcode, IRETURN..=RETURN | ATHROW) {
					self.graph.no_successor(&mut self.code)?;
				}
			},
			&Instruction::Int { opcode, operand } => {
				self.code.write_u8(opcode);
				match opcode {
					BIPUSH => self.code.write_i8(i8::try_from(operand).with_context(|| anyhow!("operand {operand} of bipush out of range"))?),
					SIPUSH => self.code.write_i16(i16::try_from(operand).with_context(|| anyhow!("operand {operand} of sipush out of range"))?),
					NEWARRAY => self.code.write_u8(u8::try_from(operand).with_context(|| anyhow!("invalid array type {operand}"))?),
					opcode => bail!("not an int instruction: {opcode:#x}"),
				}
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			&Instruction::Var { opcode, index: local } => {
				let size = if matches!(opcode, LLOAD | DLOAD | LSTORE | DSTORE) { 2 } else { 1 };
				self.use_local(local, size);
				if opcode != RET && local < 4 {
					let short = match opcode {
						ILOAD..=ALOAD => ILOAD_0 + ((opcode - ILOAD) << 2) + local as u8,
						ISTORE..=ASTORE => ISTORE_0 + ((opcode - ISTORE) << 2) + local as u8,
						opcode => bail!("not a local variable instruction: {opcode:#x}"),
					};
					self.code.write_u8(short);
				} else if let Ok(local) = u8::try_from(local) {
					self.code.write_u8(opcode);
					self.code.write_u8(local);
				} else {
					self.code.write_u8(WIDE);
					self.code.write_u8(opcode);
					self.code.write_u16(local);
				}
				self.graph.execute(instruction, offset, &mut self.types)?;

				if opcode == RET {
					self.graph.no_successor(&mut self.code)?;
				} else if self.graph.mode == Mode::Frames && self.has_handlers && matches!(opcode, ISTORE..=ASTORE) {
					// handlers see the locals after each store
					let label = self.graph.labels.create();
					self.graph.visit_label(label, &mut self.code)?;
				}
			},
			Instruction::Type { opcode, class } => {
				self.code.write_u8(*opcode);
				self.code.write_u16(pool.put_class(class));
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			Instruction::Field { opcode, field } => {
				self.code.write_u8(*opcode);
				self.code.write_u16(pool.put_field_ref(field));
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			&Instruction::Invoke { opcode, ref method, interface } => {
				self.code.write_u8(opcode);
				if opcode == INVOKEINTERFACE {
					self.code.write_u16(pool.put_method_ref(method, true));
					let count = parse_method(&method.descriptor)?.parameters_size() + 1;
					self.code.write_u8(u8::try_from(count).with_context(|| anyhow!("too many arguments for {method:?}"))?);
					self.code.write_u8(0);
				} else {
					self.code.write_u16(pool.put_method_ref(method, interface));
				}
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			Instruction::InvokeDynamic(dynamic) => {
				self.code.write_u8(INVOKEDYNAMIC);
				self.code.write_u16(pool.put_invoke_dynamic(dynamic));
				self.code.write_u16(0);
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			&Instruction::Jump { opcode, target } => self.jump(index, instruction, opcode, target, wide)?,
			Instruction::Ldc(loadable) => {
				let constant = pool.put_loadable(loadable);
				if loadable.is_wide() {
					self.code.write_u8(LDC2_W);
					self.code.write_u16(constant);
				} else if let Ok(constant) = u8::try_from(constant) {
					self.code.write_u8(LDC);
					self.code.write_u8(constant);
				} else {
					self.code.write_u8(LDC_W);
					self.code.write_u16(constant);
				}
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			&Instruction::IInc { index: local, increment } => {
				self.use_local(local, 1);
				if let (Ok(local), Ok(increment)) = (u8::try_from(local), i8::try_from(increment)) {
					self.code.write_u8(IINC);
					self.code.write_u8(local);
					self.code.write_i8(increment);
				} else {
					self.code.write_u8(WIDE);
					self.code.write_u8(IINC);
					self.code.write_u16(local);
					self.code.write_i16(increment);
				}
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
			&Instruction::TableSwitch { default, low, high, ref targets } => {
				if low > high {
					bail!("`low` {low} is greater than `high` {high}");
				}
				let n = high as i64 - low as i64 + 1;
				if targets.len() as i64 != n {
					bail!("tableswitch from {low} to {high} needs {n} targets, got {}", targets.len());
				}

				self.code.write_u8(TABLESWITCH);
				self.align();
				let default = self.id(default);
				self.graph.labels.put(&mut self.code, default, offset, true, index)?;
				self.code.write_i32(low);
				self.code.write_i32(high);
				let mut ids = Vec::with_capacity(targets.len());
				for &target in targets {
					let target = self.id(target);
					self.graph.labels.put(&mut self.code, target, offset, true, index)?;
					ids.push(target);
				}
				self.graph.switch(instruction, default, &ids, &mut self.code, &mut self.types)?;
			},
			Instruction::LookupSwitch { default, pairs } => {
				if !pairs.windows(2).all(|w| w[0].0 < w[1].0) {
					bail!("keys of lookupswitch must be sorted and distinct");
				}

				self.code.write_u8(LOOKUPSWITCH);
				self.align();
				let default = self.id(*default);
				self.graph.labels.put(&mut self.code, default, offset, true, index)?;
				self.code.write_i32(i32::try_from(pairs.len())?);
				let mut ids = Vec::with_capacity(pairs.len());
				for &(key, target) in pairs {
					self.code.write_i32(key);
					let target = self.id(target);
					self.graph.labels.put(&mut self.code, target, offset, true, index)?;
					ids.push(target);
				}
				self.graph.switch(instruction, default, &ids, &mut self.code, &mut self.types)?;
			},
			Instruction::MultiANewArray { class, dimensions } => {
				if *dimensions == 0 {
					bail!("multianewarray of {class:?} with zero dimensions");
				}
				self.code.write_u8(MULTIANEWARRAY);
				self.code.write_u16(pool.put_class(class));
				self.code.write_u8(*dimensions);
				self.graph.execute(instruction, offset, &mut self.types)?;
			},
		}
		Ok(())
	}

	fn align(&mut self) {
		while self.code.len() % 4 != 0 {
			self.code.write_u8(0);
		}
	}

	fn jump(&mut self, index: usize, instruction: &Instruction, opcode: u8, target: Label, wide: &HashSet<usize>) -> Result<()> {
		let opcode = match opcode {
			GOTO_W => GOTO,
			JSR_W => JSR,
			opcode => opcode,
		};
		let target = self.id(target);
		let source = self.code.len();

		let block = &self.graph.labels[target];
		let far_backward = block.is_resolved() && i16::try_from(block.position as i64 - source as i64).is_err();
		let is_wide = far_backward || wide.contains(&index);

		let mut next = self.graph.jump(instruction, opcode, target, &mut self.types)?;

		if !is_wide {
			self.code.write_u8(opcode);
			self.graph.labels.put(&mut self.code, target, source, false, index)?;
		} else if opcode == GOTO || opcode == JSR {
			self.code.write_u8(if opcode == GOTO { GOTO_W } else { JSR_W });
			self.graph.labels.put(&mut self.code, target, source, true, index)?;
		} else {
			// the opposite condition skips over a goto_w to the target
			self.code.write_u8(opposite(opcode));
			self.code.write_i16(8);
			let source = self.code.len();
			self.code.write_u8(GOTO_W);
			self.graph.labels.put(&mut self.code, target, source, true, index)?;

			let next = *next.get_or_insert_with(|| self.graph.labels.create());
			if self.graph.mode == Mode::Frames {
				self.graph.labels[next].target = true;
			}
		}

		self.graph.after_jump(opcode, next, &mut self.code)
	}

	/// Exception handlers, with their labels resolved.
	fn handlers(&self, try_catches: &[TryCatch]) -> Result<Vec<Handler>> {
		try_catches.iter()
			.map(|try_catch| Ok(Handler {
				start: self.placed(try_catch.start)?,
				end: self.placed(try_catch.end)?,
				handler: self.placed(try_catch.handler)?,
				catch_type: try_catch.catch_type.clone(),
			}))
			.collect()
	}
}

/// The conditional jump with the negated condition.
fn opposite(opcode: u8) -> u8 {
	if opcode <= IF_ACMPNE {
		((opcode + 1) ^ 1) - 1
	} else {
		opcode ^ 1
	}
}

/// Writes the contents of the `Code` attribute of a method.
pub(crate) fn write_code(
	writer: &mut Vec<u8>,
	pool: &mut ConstantPool,
	context: &MethodContext,
	header: &MethodHeader,
	method: &MethodCode,
) -> Result<()> {
	if !method.has_instructions() {
		bail!("code without any instructions");
	}

	let mode = if context.frames { Mode::Frames } else { Mode::MaxStack };
	let referenced = method.referenced_labels();

	let mut initial_locals = parse_method(&header.descriptor)?.parameters_size() as usize;
	if !header.is_static() {
		initial_locals += 1;
	}

	// Instruction indices of jumps that need a wide offset.
	let mut wide = HashSet::new();

	let mut assembly = 'a: loop {
		let mut assembly = Assembly::new(mode, method, &referenced, initial_locals)?;
		for (index, event) in method.events.iter().enumerate() {
			assembly.event(index, event, &wide, pool)?;
		}
		let overflows = assembly.graph.labels.take_overflows();
		if !overflows.is_empty() {
			debug!("widening {} jumps in {:?}{:?} of {:?}", overflows.len(), header.name, header.descriptor, context.class);
			wide.extend(overflows);
			continue 'a;
		}
		break assembly;
	};

	if assembly.code.len() > MAX_CODE_LENGTH {
		return Err(CapacityError { what: "method code", size: assembly.code.len(), limit: MAX_CODE_LENGTH }.into());
	}
	assembly.graph.labels.check_resolved()?;

	for local_variable in &method.local_variables {
		let size = if local_variable.descriptor.starts_with('J') || local_variable.descriptor.starts_with('D') { 2 } else { 1 };
		assembly.use_local(local_variable.index, size);
	}

	let mut handlers = assembly.handlers(&method.try_catches)?;
	assembly.graph.close();
	assembly.graph.add_handler_edges(&handlers, &mut assembly.types)?;

	let (max_stack, max_locals, stack_map) = match mode {
		Mode::Frames => {
			let graph = &mut assembly.graph;
			let root = graph.frame_of(graph.root)?;
			graph.frames[root].init_input(context.class, header, assembly.max_locals, &mut assembly.types)?;
			let initial = graph.frames[root].input().map(|(locals, _)| locals.to_vec()).unwrap_or_default();
			let mut stack_map = StackMapWriter::new(context.major_version >= version::V1_6, &initial);

			let max = solve_frames(graph, context.class, &mut assembly.types, context.hierarchy)?;
			let max = store_frames(graph, &mut assembly.code, max, &mut stack_map, &mut handlers, pool, &mut assembly.types)?;
			(max as usize, assembly.max_locals, Some(stack_map))
		},
		Mode::MaxStack => {
			let max = max_stack(&mut assembly.graph) as usize;
			(max.max(method.max_stack as usize), assembly.max_locals.max(method.max_locals as usize), None)
		},
	};

	let assembly = &assembly;
	let code = &assembly.code;
	let labels = &assembly.graph.labels;
	trace!("{:?}{:?} of {:?}: {} bytes, {} labels, max stack {max_stack}, max locals {max_locals}",
		header.name, header.descriptor, context.class, code.len(), labels.ids().count());

	if max_stack > u16::MAX as usize {
		return Err(CapacityError { what: "max stack", size: max_stack, limit: u16::MAX as usize }.into());
	}
	if max_locals > u16::MAX as usize {
		return Err(CapacityError { what: "max locals", size: max_locals, limit: u16::MAX as usize }.into());
	}

	writer.write_usize_as_u16(max_stack)?;
	writer.write_usize_as_u16(max_locals)?;
	writer.write_usize_as_u32(code.len())?;
	writer.write_u8_slice(code);

	let handlers: Vec<_> = handlers.iter()
		.filter(|handler| labels[handler.start].position < labels[handler.end].position)
		.collect();
	writer.write_usize_as_u16(handlers.len()).context("too many exception handlers")?;
	for handler in handlers {
		writer.write_usize_as_u16(labels[handler.start].position)?;
		writer.write_usize_as_u16(labels[handler.end].position)?;
		writer.write_usize_as_u16(labels[handler.handler].position)?;
		writer.write_u16(handler.catch_type.as_deref().map_or(0, |class| pool.put_class(class)));
	}

	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if let Some(stack_map) = stack_map {
		if !stack_map.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, stack_map.attribute_name(), |w, _| stack_map.write(w))?;
		}
	} else if !assembly.frames.is_empty() {
		attribute_count += 1;
		write_given_frames(&mut buffer, pool, context, assembly)?;
	}

	if !assembly.line_numbers.is_empty() {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::LINE_NUMBER_TABLE, |w, _| {
			w.write_usize_as_u16(assembly.line_numbers.len()).context("too many line numbers")?;
			for &(line, label) in &assembly.line_numbers {
				if !labels[label].is_resolved() {
					bail!("line number {line} at a label that is never placed");
				}
				w.write_usize_as_u16(labels[label].position)?;
				w.write_u16(line);
			}
			Ok(())
		})?;
	}

	if !method.local_variables.is_empty() {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::LOCAL_VARIABLE_TABLE, |w, pool| {
			w.write_slice(&method.local_variables,
				|w, len| w.write_usize_as_u16(len).context("too many local variables"),
				|w, local_variable| {
					write_local_variable_range(w, assembly, local_variable)?;
					w.write_u16(pool.put_utf8(&local_variable.name));
					w.write_u16(pool.put_utf8(&local_variable.descriptor));
					w.write_u16(local_variable.index);
					Ok(())
				},
			)
		})?;

		let with_signature: Vec<_> = method.local_variables.iter()
			.filter_map(|local_variable| local_variable.signature.as_ref().map(|signature| (local_variable, signature)))
			.collect();
		if !with_signature.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::LOCAL_VARIABLE_TYPE_TABLE, |w, pool| {
				w.write_slice(&with_signature,
					|w, len| w.write_usize_as_u16(len),
					|w, &(local_variable, signature)| {
						write_local_variable_range(w, assembly, local_variable)?;
						w.write_u16(pool.put_utf8(&local_variable.name));
						w.write_u16(pool.put_utf8(signature));
						w.write_u16(local_variable.index);
						Ok(())
					},
				)
			})?;
		}
	}

	writer.write_usize_as_u16(attribute_count)?;
	writer.write_u8_slice(&buffer);
	Ok(())
}

fn write_local_variable_range(writer: &mut Vec<u8>, assembly: &Assembly, local_variable: &LocalVariable) -> Result<()> {
	let start = assembly.position(local_variable.start)?;
	let end = assembly.position(local_variable.end)?;
	if end < start {
		bail!("local variable {:?} ends before it starts", local_variable.name);
	}
	writer.write_usize_as_u16(start)?;
	writer.write_usize_as_u16(end - start)?;
	Ok(())
}

/// Writes the frames visited along with the code as full frames, for when they're not computed.
fn write_given_frames(writer: &mut Vec<u8>, pool: &mut ConstantPool, context: &MethodContext, assembly: &Assembly) -> Result<()> {
	let compressed = context.major_version >= version::V1_6;
	let name = if compressed { attribute::STACK_MAP_TABLE } else { attribute::STACK_MAP };

	// the last one of several frames at the same offset wins
	let mut frames: Vec<(usize, &StackMapFrame)> = Vec::with_capacity(assembly.frames.len());
	for &(offset, frame) in &assembly.frames {
		match frames.last().map(|&(last, _)| last) {
			Some(last) if last == offset => {
				frames.pop();
			},
			Some(last) if last > offset => bail!("frames out of order at offset {offset}"),
			_ => {},
		}
		frames.push((offset, frame));
	}

	write_attribute(writer, pool, name, |w, pool| {
		w.write_usize_as_u16(frames.len()).context("too many frames")?;
		let mut previous: Option<usize> = None;
		for &(offset, frame) in &frames {
			let delta = match previous {
				Some(previous) if compressed => offset - previous - 1,
				_ => offset,
			};
			write_full_frame(w, pool, compressed, delta, &frame.locals, &frame.stack, |label| assembly.position(label))?;
			previous = Some(offset);
		}
		Ok(())
	})
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::class_constants::opcode::*;
	use crate::class_constants::version;
	use crate::hierarchy::SuperClassMap;
	use crate::pool::ConstantPool;
	use crate::tree::code::{Instruction, Label};
	use crate::tree::MethodHeader;
	use crate::writer::code::{opposite, write_code, CodeEvent, MethodCode, MethodContext};

	fn assemble(header: &MethodHeader, events: Vec<CodeEvent>, frames: bool) -> Result<Vec<u8>> {
		let hierarchy = SuperClassMap::with_platform_classes();
		let context = MethodContext {
			class: JavaStr::from_str("a/Test"),
			major_version: version::V1_8,
			frames,
			hierarchy: &hierarchy,
		};
		let method = MethodCode { events, ..MethodCode::default() };
		let mut pool = ConstantPool::new();
		let mut bytes = Vec::new();
		write_code(&mut bytes, &mut pool, &context, header, &method)?;
		Ok(bytes)
	}

	fn simple(opcode: u8) -> CodeEvent {
		CodeEvent::Instruction(Instruction::Simple(opcode))
	}

	#[test]
	fn opposite_conditions() {
		assert_eq!(opposite(IFEQ), IFNE);
		assert_eq!(opposite(IFNE), IFEQ);
		assert_eq!(opposite(IF_ICMPLT), IF_ICMPGE);
		assert_eq!(opposite(IF_ACMPNE), IF_ACMPEQ);
		assert_eq!(opposite(IFNULL), IFNONNULL);
		assert_eq!(opposite(IFNONNULL), IFNULL);
	}

	#[test]
	fn short_forms_and_max_values() -> Result<()> {
		let header = MethodHeader::new(0x0008, "f", "(IJ)J");
		let events = vec![
			CodeEvent::Instruction(Instruction::Var { opcode: ILOAD, index: 0 }),
			CodeEvent::Instruction(Instruction::Var { opcode: ISTORE, index: 5 }),
			CodeEvent::Instruction(Instruction::Var { opcode: LLOAD, index: 1 }),
			simple(LRETURN),
		];
		let bytes = assemble(&header, events, false)?;
		assert_eq!(bytes, vec![
			0, 2, // max stack
			0, 6, // max locals
			0, 0, 0, 5,
			ILOAD_0, ISTORE, 5, 0x1f, LRETURN, // 0x1f is lload_1
			0, 0, // exception table
			0, 0, // attributes
		]);
		Ok(())
	}

	#[test]
	fn far_forward_goto_is_widened() -> Result<()> {
		let header = MethodHeader::new(0x0008, "f", "()V");
		let end = Label::new();
		let mut events = vec![CodeEvent::Instruction(Instruction::Jump { opcode: GOTO, target: end })];
		events.extend(std::iter::repeat_with(|| simple(NOP)).take(40000));
		events.push(CodeEvent::Label(end));
		events.push(simple(RETURN));

		let bytes = assemble(&header, events, false)?;
		let code = &bytes[8..];
		assert_eq!(&code[..5], &[GOTO_W, 0, 0, 0x9c, 0x45]);
		assert_eq!(code[5 + 40000], RETURN);
		Ok(())
	}

	#[test]
	fn far_forward_branch_is_inverted() -> Result<()> {
		let header = MethodHeader::new(0x0008, "f", "(I)V");
		let end = Label::new();
		let mut events = vec![
			CodeEvent::Instruction(Instruction::Var { opcode: ILOAD, index: 0 }),
			CodeEvent::Instruction(Instruction::Jump { opcode: IFEQ, target: end }),
		];
		events.extend(std::iter::repeat_with(|| simple(NOP)).take(40000));
		events.push(CodeEvent::Label(end));
		events.push(simple(RETURN));

		let bytes = assemble(&header, events, false)?;
		let code = &bytes[8..];
		// iload_0, ifne +8, goto_w to the return
		assert_eq!(&code[..9], &[ILOAD_0, IFNE, 0, 8, GOTO_W, 0, 0, 0x9c, 0x45]);
		Ok(())
	}

	#[test]
	fn never_placed_label_fails() {
		let header = MethodHeader::new(0x0008, "f", "()V");
		let events = vec![
			CodeEvent::Instruction(Instruction::Jump { opcode: GOTO, target: Label::new() }),
		];
		assert!(assemble(&header, events, false).is_err());
	}

	#[test]
	fn frames_for_a_loop() -> Result<()> {
		// static void f(int i) { while (i > 0) i--; }
		let header = MethodHeader::new(0x0008, "f", "(I)V");
		let head = Label::new();
		let end = Label::new();
		let events = vec![
			CodeEvent::Label(head),
			CodeEvent::Instruction(Instruction::Var { opcode: ILOAD, index: 0 }),
			CodeEvent::Instruction(Instruction::Jump { opcode: IFLE, target: end }),
			CodeEvent::Instruction(Instruction::IInc { index: 0, increment: -1 }),
			CodeEvent::Instruction(Instruction::Jump { opcode: GOTO, target: head }),
			CodeEvent::Label(end),
			simple(RETURN),
		];
		let bytes = assemble(&header, events, true)?;
		assert_eq!(&bytes[..8], &[0, 1, 0, 1, 0, 0, 0, 11]);
		// a frame at the loop head and one at the return, both the same as the initial one
		let attribute = &bytes[8 + 11 + 2..];
		assert_eq!(&attribute[..2], &[0, 1]);
		assert_eq!(&attribute[8..], &[0, 2, 0, 9]);
		Ok(())
	}
}
