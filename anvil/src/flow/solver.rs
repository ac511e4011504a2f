//! Fixed point computations over a finished [`Graph`].

use anyhow::Result;
use java_string::JavaStr;
use log::trace;
use crate::class_constants::opcode::{ATHROW, NOP};
use crate::flow::frame::FrameType;
use crate::flow::graph::Graph;
use crate::flow::handlers::{Handler, remove_range};
use crate::flow::label::EdgeKind;
use crate::flow::stack_map::StackMapWriter;
use crate::flow::types::TypeTable;
use crate::hierarchy::TypeHierarchy;
use crate::pool::ConstantPool;

const THROWABLE: &str = "java/lang/Throwable";

/// The maximum stack size, from the stack sizes along every edge.
pub(crate) fn max_stack(graph: &mut Graph) -> i32 {
	let mut max = 0;
	let mut stack = vec![graph.root];
	while let Some(label) = stack.pop() {
		let start = graph.labels[label].input_stack_top;
		max = max.max(start + graph.labels[label].output_stack_max);

		for index in 0..graph.labels[label].edges.len() {
			let edge = graph.labels[label].edges[index];
			let successor = &mut graph.labels[edge.successor];
			if successor.pushed {
				continue;
			}
			successor.input_stack_top = match edge.kind {
				EdgeKind::Stack(size) => start + size,
				_ => 1,
			};
			successor.pushed = true;
			stack.push(edge.successor);
		}
	}
	max
}

/// Merges the frames of all blocks into their successors until nothing changes, starting at the root block.
///
/// Returns the maximum stack size of all reachable blocks.
pub(crate) fn solve_frames(graph: &mut Graph, class: &JavaStr, types: &mut TypeTable, hierarchy: &dyn TypeHierarchy) -> Result<i32> {
	let mut max = 0;
	let mut queue = vec![graph.root];
	graph.labels[graph.root].queued = true;

	while let Some(label) = queue.pop() {
		let block = &mut graph.labels[label];
		block.queued = false;
		if block.target {
			block.storing = true;
		}
		block.reachable = true;

		let frame = graph.frame_of(label)?;
		let frame = &graph.frames[frame];
		max = max.max(frame.input_stack_len() as i32 + frame.output_stack_max);
		let outgoing = frame.outgoing(class, types)?;

		for index in 0..graph.labels[label].edges.len() {
			let edge = graph.labels[label].edges[index];
			let handler = match edge.kind {
				EdgeKind::Handler(caught) => Some(caught),
				_ => None,
			};
			let successor = graph.first(edge.successor);
			let frame = graph.frame_of(successor)?;
			let changed = graph.frames[frame].merge(&outgoing, handler, types, hierarchy)?;
			if changed && !graph.labels[successor].queued {
				graph.labels[successor].queued = true;
				queue.push(successor);
			}
		}
	}
	Ok(max)
}

/// Writes the frames of the blocks that need one, and replaces unreachable blocks by `nop`s ending in an
/// `athrow`, which is all a verifier accepts without knowing what reaches them.
///
/// Returns the maximum stack size, including the stack of those replacements.
pub(crate) fn store_frames(
	graph: &Graph,
	code: &mut [u8],
	max: i32,
	stack_map: &mut StackMapWriter,
	handlers: &mut Vec<Handler>,
	pool: &mut ConstantPool,
	types: &mut TypeTable,
) -> Result<i32> {
	let mut max = max;
	let throwable = FrameType::object(types.normal(JavaStr::from_str(THROWABLE)));

	let mut next = Some(graph.root);
	while let Some(label) = next {
		let block = &graph.labels[label];
		next = block.successor;

		if block.storing {
			let frame = &graph.frames[graph.frame_of(label)?];
			if let Some((locals, stack)) = frame.input() {
				stack_map.visit_frame(block.position, locals, stack, pool, types)?;
			}
		}
		if !block.reachable {
			let start = block.position;
			let end = next.map_or(code.len(), |next| graph.labels[next].position);
			if end > start {
				trace!("replacing unreachable code from {start} to {end}");
				code[start..end - 1].fill(NOP);
				code[end - 1] = ATHROW;
				max = max.max(1);
				stack_map.visit_frame(start, &[], &[throwable], pool, types)?;
				remove_range(handlers, &graph.labels, label, next);
			}
		}
	}
	Ok(max)
}
