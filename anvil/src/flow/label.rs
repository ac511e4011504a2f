//! Basic blocks, indexed by [`LabelId`].
//!
//! Every placed label is a position in the code. Labels that start a basic block also carry the block's edges and
//! its link to the next block in code order.

use std::ops::{Index, IndexMut};
use anyhow::{anyhow, bail, Context, Result};
use crate::bytes::{ClassWrite, put_i16_at, put_i32_at};
use crate::flow::frame::FrameType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct LabelId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeKind {
	/// Max stack mode: the stack size at the jump, relative to the input stack size of the block.
	Stack(i32),
	/// Max stack mode: an edge to an exception handler.
	Exception,
	/// Frame mode: a jump or a fall through.
	Normal,
	/// Frame mode: an edge to an exception handler catching the type.
	Handler(FrameType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
	pub(crate) kind: EdgeKind,
	pub(crate) successor: LabelId,
}

/// A jump offset that gets written once the label is placed.
#[derive(Debug, Clone, Copy)]
struct ForwardReference {
	/// The position the offset is relative to, the opcode of the jump.
	source: usize,
	/// Where the offset is written.
	site: usize,
	wide: bool,
	/// Which instruction of the method body made the reference.
	instruction: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Block {
	pub(crate) position: usize,
	resolved: bool,
	/// Only used by line numbers or local variables, never starts a block.
	pub(crate) debug: bool,
	pub(crate) target: bool,
	pub(crate) storing: bool,
	pub(crate) reachable: bool,
	pub(crate) pushed: bool,
	pub(crate) queued: bool,
	forward_references: Vec<ForwardReference>,

	/// Index of the frame in frame mode. Labels at the same position share their frame.
	pub(crate) frame: Option<usize>,
	/// The next block in code order.
	pub(crate) successor: Option<LabelId>,
	pub(crate) edges: Vec<Edge>,

	/// Max stack mode: stack size at the start of the block.
	pub(crate) input_stack_top: i32,
	/// Max stack mode: highest stack size within the block, relative to `input_stack_top`.
	pub(crate) output_stack_max: i32,
}

impl Block {
	pub(crate) fn is_resolved(&self) -> bool {
		self.resolved
	}
}

#[derive(Debug, Default)]
pub(crate) struct Labels {
	blocks: Vec<Block>,
	/// Instructions whose forward jump didn't fit into an `i16`.
	overflows: Vec<usize>,
}

impl Labels {
	pub(crate) fn new() -> Labels {
		Labels::default()
	}

	pub(crate) fn create(&mut self) -> LabelId {
		self.blocks.push(Block::default());
		LabelId(self.blocks.len() - 1)
	}

	pub(crate) fn ids(&self) -> impl Iterator<Item = LabelId> {
		(0..self.blocks.len()).map(LabelId)
	}

	/// Writes the offset from `source` to `label`, or reserves space for it if the label isn't placed yet.
	pub(crate) fn put(&mut self, code: &mut Vec<u8>, label: LabelId, source: usize, wide: bool, instruction: usize) -> Result<()> {
		let block = &mut self[label];
		if block.resolved {
			let offset = block.position as i64 - source as i64;
			if wide {
				code.write_i32(i32::try_from(offset)?);
			} else {
				let offset = i16::try_from(offset)
					.with_context(|| anyhow!("backward jump offset {offset} from {source} doesn't fit into an i16"))?;
				code.write_i16(offset);
			}
		} else {
			block.forward_references.push(ForwardReference { source, site: code.len(), wide, instruction });
			if wide {
				code.write_i32(-1);
			} else {
				code.write_i16(-1);
			}
		}
		Ok(())
	}

	/// Places the label at the end of `code`, patching all jumps to it.
	pub(crate) fn resolve(&mut self, code: &mut [u8], label: LabelId) -> Result<()> {
		let position = code.len();
		let block = &mut self[label];
		if block.resolved {
			bail!("label {label:?} placed twice, first at {} and then at {position}", block.position);
		}
		block.resolved = true;
		block.position = position;

		let references = std::mem::take(&mut block.forward_references);
		for reference in references {
			let offset = position as i64 - reference.source as i64;
			if reference.wide {
				put_i32_at(code, reference.site, i32::try_from(offset)?)?;
			} else if let Ok(offset) = i16::try_from(offset) {
				put_i16_at(code, reference.site, offset)?;
			} else {
				self.overflows.push(reference.instruction);
			}
		}
		Ok(())
	}

	/// The instructions that need to be written with a wide jump.
	pub(crate) fn take_overflows(&mut self) -> Vec<usize> {
		std::mem::take(&mut self.overflows)
	}

	/// Fails if some jump references a label that was never placed.
	pub(crate) fn check_resolved(&self) -> Result<()> {
		if let Some((index, _)) = self.blocks.iter().enumerate()
			.find(|(_, block)| !block.resolved && !block.forward_references.is_empty())
		{
			bail!("label {:?} is jumped to but never placed", LabelId(index));
		}
		Ok(())
	}
}

impl Index<LabelId> for Labels {
	type Output = Block;

	fn index(&self, index: LabelId) -> &Block {
		&self.blocks[index.0]
	}
}

impl IndexMut<LabelId> for Labels {
	fn index_mut(&mut self, index: LabelId) -> &mut Block {
		&mut self.blocks[index.0]
	}
}
