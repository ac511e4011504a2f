//! The control flow graph of a method, built while its code is written.
//!
//! In [`Mode::MaxStack`] every label starts a block and only stack sizes are tracked. In [`Mode::Frames`] labels
//! at the same position share one block and one [`Frame`], and every instruction is interpreted.

use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaStr;
use crate::class_constants::opcode::*;
use crate::descriptor::{parse_field, parse_method};
use crate::flow::frame::{Frame, FrameType};
use crate::flow::handlers::Handler;
use crate::flow::label::{Edge, EdgeKind, LabelId, Labels};
use crate::flow::types::TypeTable;
use crate::tree::code::Instruction;

const THROWABLE: &str = "java/lang/Throwable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
	MaxStack,
	Frames,
}

#[derive(Debug)]
pub(crate) struct Graph {
	pub(crate) mode: Mode,
	pub(crate) labels: Labels,
	pub(crate) frames: Vec<Frame>,
	/// The block at position zero.
	pub(crate) root: LabelId,
	/// The last block in code order.
	previous: Option<LabelId>,
	/// The block instructions are added to, `None` after an unconditional transfer.
	current: Option<LabelId>,
	/// Max stack mode: stack size relative to the start of the current block.
	stack_size: i32,
	max_stack_size: i32,
}

impl Graph {
	/// Starts a graph with the root block placed at the start of `code`.
	pub(crate) fn new(mode: Mode, code: &mut Vec<u8>) -> Result<Graph> {
		let mut labels = Labels::new();
		let root = labels.create();
		labels[root].pushed = true;
		let mut graph = Graph {
			mode,
			labels,
			frames: Vec::new(),
			root,
			previous: None,
			current: None,
			stack_size: 0,
			max_stack_size: 0,
		};
		graph.visit_label(root, code)?;
		Ok(graph)
	}

	/// The label owning the block the label is in.
	pub(crate) fn first(&self, label: LabelId) -> LabelId {
		self.labels[label].frame.map_or(label, |frame| self.frames[frame].owner)
	}

	pub(crate) fn frame_of(&self, label: LabelId) -> Result<usize> {
		self.labels[label].frame
			.with_context(|| anyhow!("block {label:?} has no frame"))
	}

	fn new_frame(&mut self, label: LabelId) -> usize {
		self.frames.push(Frame::new(label));
		let frame = self.frames.len() - 1;
		self.labels[label].frame = Some(frame);
		frame
	}

	fn add_edge(&mut self, kind: EdgeKind, successor: LabelId) {
		if let Some(current) = self.current {
			self.labels[current].edges.push(Edge { kind, successor });
		}
	}

	fn mark_target(&mut self, label: LabelId) {
		let first = self.first(label);
		self.labels[first].target = true;
	}

	/// Places a label at the end of `code`.
	pub(crate) fn visit_label(&mut self, label: LabelId, code: &mut Vec<u8>) -> Result<()> {
		self.labels.resolve(code, label)?;
		if self.labels[label].debug {
			return Ok(());
		}
		let position = self.labels[label].position;
		match self.mode {
			Mode::Frames => {
				if let Some(current) = self.current {
					if self.labels[current].position == position {
						self.join(current, label);
						return Ok(());
					}
					self.add_edge(EdgeKind::Normal, label);
				}
				if let Some(previous) = self.previous {
					if self.labels[previous].position == position {
						self.join(previous, label);
						self.current = Some(previous);
						return Ok(());
					}
					self.labels[previous].successor = Some(label);
				}
				if self.labels[label].frame.is_none() {
					self.new_frame(label);
				}
				self.current = Some(label);
				self.previous = Some(label);
			},
			Mode::MaxStack => {
				if let Some(current) = self.current {
					self.labels[current].output_stack_max = self.max_stack_size;
					self.add_edge(EdgeKind::Stack(self.stack_size), label);
				}
				self.current = Some(label);
				self.stack_size = 0;
				self.max_stack_size = 0;
				if let Some(previous) = self.previous {
					self.labels[previous].successor = Some(label);
				}
				self.previous = Some(label);
			},
		}
		Ok(())
	}

	/// Makes `label` part of the block of `block`, at the same position.
	fn join(&mut self, block: LabelId, label: LabelId) {
		let target = self.labels[label].target;
		self.labels[block].target |= target;
		self.labels[label].frame = self.labels[block].frame;
	}

	/// Ends the current block after an unconditional transfer of control.
	pub(crate) fn no_successor(&mut self, code: &mut Vec<u8>) -> Result<()> {
		let Some(current) = self.current else {
			return Ok(());
		};
		match self.mode {
			Mode::Frames => {
				let label = self.labels.create();
				self.new_frame(label);
				self.labels.resolve(code, label)?;
				if let Some(previous) = self.previous {
					self.labels[previous].successor = Some(label);
				}
				self.previous = Some(label);
			},
			Mode::MaxStack => {
				self.labels[current].output_stack_max = self.max_stack_size;
			},
		}
		self.current = None;
		Ok(())
	}

	/// Applies an instruction other than a jump or a switch to the current block. `offset` is the position the
	/// instruction is written at.
	pub(crate) fn execute(&mut self, instruction: &Instruction, offset: usize, types: &mut TypeTable) -> Result<()> {
		let Some(current) = self.current else {
			return Ok(());
		};
		match self.mode {
			Mode::Frames => {
				let frame = self.frame_of(current)?;
				self.frames[frame].execute(instruction, offset, types)
			},
			Mode::MaxStack => {
				self.stack_size += stack_delta(instruction)?;
				self.max_stack_size = self.max_stack_size.max(self.stack_size);
				Ok(())
			},
		}
	}

	/// Adds the edges of a jump, before the jump is written. Returns the label to visit right after the jump.
	pub(crate) fn jump(&mut self, instruction: &Instruction, opcode: u8, target: LabelId, types: &mut TypeTable) -> Result<Option<LabelId>> {
		let Some(current) = self.current else {
			return Ok(None);
		};
		match self.mode {
			Mode::Frames => {
				let frame = self.frame_of(current)?;
				self.frames[frame].execute(instruction, 0, types)?;
				self.mark_target(target);
				self.add_edge(EdgeKind::Normal, target);
				Ok((opcode != GOTO).then(|| self.labels.create()))
			},
			Mode::MaxStack if opcode == JSR => {
				self.add_edge(EdgeKind::Stack(self.stack_size + 1), target);
				Ok(Some(self.labels.create()))
			},
			Mode::MaxStack => {
				self.stack_size += jump_delta(opcode)?;
				self.add_edge(EdgeKind::Stack(self.stack_size), target);
				Ok(None)
			},
		}
	}

	/// Continues after a jump was written.
	pub(crate) fn after_jump(&mut self, opcode: u8, next: Option<LabelId>, code: &mut Vec<u8>) -> Result<()> {
		if self.current.is_none() {
			return Ok(());
		}
		if let Some(next) = next {
			self.visit_label(next, code)?;
		}
		if opcode == GOTO {
			self.no_successor(code)?;
		}
		Ok(())
	}

	/// Adds the edges of a switch, after it was written.
	pub(crate) fn switch(&mut self, instruction: &Instruction, default: LabelId, targets: &[LabelId], code: &mut Vec<u8>, types: &mut TypeTable) -> Result<()> {
		let Some(current) = self.current else {
			return Ok(());
		};
		let kind = match self.mode {
			Mode::Frames => {
				let frame = self.frame_of(current)?;
				self.frames[frame].execute(instruction, 0, types)?;
				EdgeKind::Normal
			},
			Mode::MaxStack => {
				self.stack_size -= 1;
				EdgeKind::Stack(self.stack_size)
			},
		};
		for &target in std::iter::once(&default).chain(targets) {
			self.add_edge(kind, target);
			if self.mode == Mode::Frames {
				self.mark_target(target);
			}
		}
		self.no_successor(code)
	}

	/// Ends the last block, once all code is written.
	pub(crate) fn close(&mut self) {
		if self.mode == Mode::MaxStack {
			if let Some(current) = self.current.take() {
				self.labels[current].output_stack_max = self.max_stack_size;
			}
		}
	}

	/// Adds an edge from every block in the range of each handler to the handler.
	pub(crate) fn add_handler_edges(&mut self, handlers: &[Handler], types: &mut TypeTable) -> Result<()> {
		for handler in handlers {
			let (mut block, end, successor, kind) = match self.mode {
				Mode::Frames => {
					let catch_type = handler.catch_type.as_deref().unwrap_or(JavaStr::from_str(THROWABLE));
					let caught = FrameType::object(types.normal(catch_type));
					let successor = self.first(handler.handler);
					self.labels[successor].target = true;
					(Some(self.first(handler.start)), self.first(handler.end), successor, EdgeKind::Handler(caught))
				},
				Mode::MaxStack => (Some(handler.start), handler.end, handler.handler, EdgeKind::Exception),
			};
			while let Some(label) = block {
				if label == end {
					break;
				}
				self.labels[label].edges.push(Edge { kind, successor });
				block = self.labels[label].successor;
			}
		}
		Ok(())
	}
}

/// How many slots a jump pops.
fn jump_delta(opcode: u8) -> Result<i32> {
	Ok(match opcode {
		IFEQ..=IFLE | IFNULL | IFNONNULL => -1,
		IF_ICMPEQ..=IF_ACMPNE => -2,
		GOTO | GOTO_W => 0,
		JSR | JSR_W => 1,
		opcode => bail!("not a jump instruction: {opcode:#x}"),
	})
}

fn var_delta(opcode: u8) -> Result<i32> {
	Ok(match opcode {
		ILOAD | FLOAD | ALOAD => 1,
		LLOAD | DLOAD => 2,
		ISTORE | FSTORE | ASTORE => -1,
		LSTORE | DSTORE => -2,
		RET => 0,
		opcode => bail!("not a local variable instruction: {opcode:#x}"),
	})
}

fn simple_delta(opcode: u8) -> Result<i32> {
	Ok(match opcode {
		ILOAD_0..=ALOAD_3 => var_delta(ILOAD + (opcode - ILOAD_0) / 4)?,
		ISTORE_0..=ASTORE_3 => var_delta(ISTORE + (opcode - ISTORE_0) / 4)?,

		LASTORE | DASTORE => -4,
		IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE | LCMP | DCMPL | DCMPG => -3,
		POP2 | LADD | DADD | LSUB | DSUB | LMUL | DMUL | LDIV | DDIV | LREM | DREM | LAND | LOR | LXOR
			| LRETURN | DRETURN => -2,
		IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD | POP
			| IADD | FADD | ISUB | FSUB | IMUL | FMUL | IDIV | FDIV | IREM | FREM
			| ISHL | LSHL | ISHR | LSHR | IUSHR | LUSHR | IAND | IOR | IXOR
			| L2I | L2F | D2I | D2F | FCMPL | FCMPG
			| IRETURN | FRETURN | ARETURN | ATHROW | MONITORENTER | MONITOREXIT => -1,
		ACONST_NULL | ICONST_M1..=ICONST_5 | FCONST_0..=FCONST_2 | DUP | DUP_X1 | DUP_X2
			| I2L | I2D | F2L | F2D => 1,
		LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 | DUP2 | DUP2_X1 | DUP2_X2 => 2,
		NOP | LALOAD | DALOAD | SWAP | INEG | LNEG | FNEG | DNEG | I2F | L2D | F2I | D2L | I2B | I2C | I2S
			| RETURN | ARRAYLENGTH => 0,
		opcode => bail!("unknown or misplaced opcode {opcode:#x}"),
	})
}

/// By how much an instruction changes the size of the stack.
pub(crate) fn stack_delta(instruction: &Instruction) -> Result<i32> {
	Ok(match instruction {
		Instruction::Simple(opcode) => simple_delta(*opcode)?,
		Instruction::Int { opcode: NEWARRAY, .. } => 0,
		Instruction::Int { .. } => 1,
		Instruction::Var { opcode, .. } => var_delta(*opcode)?,
		Instruction::Type { opcode: NEW, .. } => 1,
		Instruction::Type { .. } => 0,
		Instruction::Field { opcode, field } => {
			let size = parse_field(&field.descriptor)?.size() as i32;
			match *opcode {
				GETSTATIC => size,
				PUTSTATIC => -size,
				GETFIELD => size - 1,
				PUTFIELD => -size - 1,
				opcode => bail!("not a field instruction: {opcode:#x}"),
			}
		},
		Instruction::Invoke { opcode, method, .. } => {
			let method_type = parse_method(&method.descriptor)?;
			let receiver = if *opcode == INVOKESTATIC { 0 } else { 1 };
			method_type.return_size() as i32 - method_type.parameters_size() as i32 - receiver
		},
		Instruction::InvokeDynamic(dynamic) => {
			let method_type = parse_method(&dynamic.descriptor)?;
			method_type.return_size() as i32 - method_type.parameters_size() as i32
		},
		Instruction::Jump { opcode, .. } => jump_delta(*opcode)?,
		Instruction::Ldc(loadable) => if loadable.is_wide() { 2 } else { 1 },
		Instruction::IInc { .. } => 0,
		Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => -1,
		Instruction::MultiANewArray { dimensions, .. } => 1 - *dimensions as i32,
	})
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::class_constants::opcode::*;
	use crate::flow::graph::{Graph, Mode, stack_delta};
	use crate::flow::label::EdgeKind;
	use crate::flow::types::TypeTable;
	use crate::tree::code::{Instruction, Label, Loadable, MemberRef};

	#[test]
	fn deltas() -> Result<()> {
		let println = MemberRef::new("java/io/PrintStream", "println", "(J)V");
		assert_eq!(stack_delta(&Instruction::Invoke { opcode: INVOKEVIRTUAL, method: println.clone(), interface: false })?, -3);
		assert_eq!(stack_delta(&Instruction::Invoke { opcode: INVOKESTATIC, method: println, interface: false })?, -2);
		let field = MemberRef::new("a/B", "c", "D");
		assert_eq!(stack_delta(&Instruction::Field { opcode: GETFIELD, field: field.clone() })?, 1);
		assert_eq!(stack_delta(&Instruction::Field { opcode: PUTFIELD, field })?, -3);
		assert_eq!(stack_delta(&Instruction::Ldc(Loadable::Long(5)))?, 2);
		assert_eq!(stack_delta(&Instruction::Simple(DUP2_X1))?, 2);
		assert_eq!(stack_delta(&Instruction::Simple(ALOAD_2))?, 1);
		assert_eq!(stack_delta(&Instruction::MultiANewArray { class: "[[I".into(), dimensions: 2 })?, -1);
		assert!(stack_delta(&Instruction::Simple(0xcb)).is_err());
		Ok(())
	}

	#[test]
	fn labels_at_the_same_position_share_a_block() -> Result<()> {
		let mut code = Vec::new();
		let mut graph = Graph::new(Mode::Frames, &mut code)?;
		let a = graph.labels.create();
		let b = graph.labels.create();
		graph.labels[b].target = true;
		graph.visit_label(a, &mut code)?;
		graph.visit_label(b, &mut code)?;
		assert_eq!(graph.first(a), graph.root);
		assert_eq!(graph.first(b), graph.root);
		assert!(graph.labels[graph.root].target);
		assert_eq!(graph.frames.len(), 1);
		Ok(())
	}

	#[test]
	fn goto_ends_the_block() -> Result<()> {
		let mut code = Vec::new();
		let mut types = TypeTable::new();
		let mut graph = Graph::new(Mode::MaxStack, &mut code)?;
		let target = graph.labels.create();

		graph.execute(&Instruction::Simple(ICONST_0), 0, &mut types)?;
		code.push(ICONST_0);
		let jump = Instruction::Jump { opcode: GOTO, target: Label::new() };
		let next = graph.jump(&jump, GOTO, target, &mut types)?;
		code.extend_from_slice(&[GOTO, 0, 0]);
		graph.after_jump(GOTO, next, &mut code)?;
		graph.visit_label(target, &mut code)?;

		let root = &graph.labels[graph.root];
		assert_eq!(root.output_stack_max, 1);
		assert_eq!(root.edges.len(), 1);
		assert_eq!(root.edges[0].kind, EdgeKind::Stack(1));
		assert_eq!(root.successor, Some(target));
		// no fall through from the goto
		assert!(graph.labels[target].edges.is_empty());
		Ok(())
	}
}
