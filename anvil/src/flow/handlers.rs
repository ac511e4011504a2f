//! Exception handlers of a method being written.

use java_string::JavaString;
use crate::flow::label::{LabelId, Labels};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Handler {
	pub(crate) start: LabelId,
	pub(crate) end: LabelId,
	pub(crate) handler: LabelId,
	/// `None` catches everything.
	pub(crate) catch_type: Option<JavaString>,
}

/// Removes the range from `start` to `end` from all handlers. An `end` of `None` means the end of the code.
///
/// A handler covering code on both sides of the range is split in two, the second half directly after the first.
pub(crate) fn remove_range(handlers: &mut Vec<Handler>, labels: &Labels, start: LabelId, end: Option<LabelId>) {
	let range_start = labels[start].position;
	let range_end = end.map_or(usize::MAX, |end| labels[end].position);

	let mut kept = Vec::with_capacity(handlers.len() + 1);
	for mut handler in handlers.drain(..) {
		let handler_start = labels[handler.start].position;
		let handler_end = labels[handler.end].position;
		if range_start >= handler_end || range_end <= handler_start {
			kept.push(handler);
			continue;
		}

		if range_start <= handler_start {
			// the range covers the start of the handler
			match end {
				Some(end) if range_end < handler_end => {
					handler.start = end;
					kept.push(handler);
				},
				_ => {},
			}
		} else if range_end >= handler_end {
			handler.end = start;
			kept.push(handler);
		} else if let Some(end) = end {
			let second = Handler { start: end, ..handler.clone() };
			handler.end = start;
			kept.push(handler);
			kept.push(second);
		}
	}
	*handlers = kept;
}
