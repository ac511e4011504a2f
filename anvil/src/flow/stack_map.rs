//! Encoding of computed frames into a `StackMapTable`, or a `StackMap` for class files older than version 50.

use anyhow::{bail, Result};
use java_string::JavaString;
use crate::bytes::ClassWrite;
use crate::class_constants::{attribute, frame, verification_type};
use crate::descriptor::object_descriptor;
use crate::flow::frame::{Base, FrameType, Kind};
use crate::flow::types::{TypeEntry, TypeTable};
use crate::pool::ConstantPool;

#[derive(Debug)]
pub(crate) struct StackMapWriter {
	/// `StackMapTable` with compressed frames, or the old `StackMap` with full frames only.
	compressed: bool,
	previous_offset: Option<usize>,
	previous_locals: Vec<FrameType>,
	count: usize,
	bytes: Vec<u8>,
}

/// Drops the slot after each long or double, and trailing `Top`s.
fn compact_locals(locals: &[FrameType]) -> Vec<FrameType> {
	let mut compact = compact_stack(locals);
	while compact.last() == Some(&FrameType::TOP) {
		compact.pop();
	}
	compact
}

/// Drops the slot after each long or double.
fn compact_stack(stack: &[FrameType]) -> Vec<FrameType> {
	let mut compact = Vec::with_capacity(stack.len());
	let mut iter = stack.iter();
	while let Some(&t) = iter.next() {
		compact.push(t);
		if t.is_long_or_double() {
			iter.next();
		}
	}
	compact
}

impl StackMapWriter {
	/// `initial_locals` are the locals at the start of the method, the implicit first frame.
	pub(crate) fn new(compressed: bool, initial_locals: &[FrameType]) -> StackMapWriter {
		StackMapWriter {
			compressed,
			previous_offset: None,
			previous_locals: compact_locals(initial_locals),
			count: 0,
			bytes: Vec::new(),
		}
	}

	pub(crate) fn attribute_name(&self) -> &'static str {
		if self.compressed {
			attribute::STACK_MAP_TABLE
		} else {
			attribute::STACK_MAP
		}
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.count == 0
	}

	/// Writes the number of frames and the frames.
	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<()> {
		writer.write_usize_as_u16(self.count)?;
		writer.write_u8_slice(&self.bytes);
		Ok(())
	}

	/// Adds the frame at `offset`. Frames must be added in increasing offset order.
	pub(crate) fn visit_frame(&mut self, offset: usize, locals: &[FrameType], stack: &[FrameType], pool: &mut ConstantPool, types: &TypeTable) -> Result<()> {
		let locals = compact_locals(locals);
		let stack = compact_stack(stack);

		if self.compressed {
			let delta = match self.previous_offset {
				None => offset,
				Some(previous) if offset > previous => offset - previous - 1,
				Some(previous) => bail!("frame at {offset} written after frame at {previous}"),
			};
			self.write_compressed(delta, &locals, &stack, pool, types)?;
		} else {
			self.bytes.write_usize_as_u16(offset)?;
			self.write_types(&locals, pool, types)?;
			self.write_types(&stack, pool, types)?;
		}

		self.previous_offset = Some(offset);
		self.previous_locals = locals;
		self.count += 1;
		Ok(())
	}

	fn write_compressed(&mut self, delta: usize, locals: &[FrameType], stack: &[FrameType], pool: &mut ConstantPool, types: &TypeTable) -> Result<()> {
		enum Shape {
			Same,
			SameLocalsOneStackItem,
			Chop(u8),
			Append(u8),
			Full,
		}

		let previous_len = self.previous_locals.len();
		let (mut shape, compared) = match (stack.len(), locals.len() as isize - previous_len as isize) {
			(0, k @ -3..=-1) => (Shape::Chop((-k) as u8), locals.len()),
			(0, 0) => (Shape::Same, locals.len()),
			(0, k @ 1..=3) => (Shape::Append(k as u8), previous_len),
			(1, 0) => (Shape::SameLocalsOneStackItem, locals.len()),
			_ => (Shape::Full, 0),
		};
		if locals[..compared] != self.previous_locals[..compared] {
			shape = Shape::Full;
		}

		match shape {
			Shape::Same if delta < 64 => self.bytes.write_u8(delta as u8),
			Shape::Same => {
				self.bytes.write_u8(frame::SAME_FRAME_EXTENDED);
				self.bytes.write_usize_as_u16(delta)?;
			},
			Shape::SameLocalsOneStackItem if delta < 64 => {
				self.bytes.write_u8(frame::SAME_LOCALS_1_STACK_ITEM + delta as u8);
				self.write_type(stack[0], pool, types)?;
			},
			Shape::SameLocalsOneStackItem => {
				self.bytes.write_u8(frame::SAME_LOCALS_1_STACK_ITEM_EXTENDED);
				self.bytes.write_usize_as_u16(delta)?;
				self.write_type(stack[0], pool, types)?;
			},
			Shape::Chop(k) => {
				self.bytes.write_u8(frame::SAME_FRAME_EXTENDED - k);
				self.bytes.write_usize_as_u16(delta)?;
			},
			Shape::Append(k) => {
				self.bytes.write_u8(frame::SAME_FRAME_EXTENDED + k);
				self.bytes.write_usize_as_u16(delta)?;
				for &t in &locals[previous_len..] {
					self.write_type(t, pool, types)?;
				}
			},
			Shape::Full => {
				self.bytes.write_u8(frame::FULL_FRAME);
				self.bytes.write_usize_as_u16(delta)?;
				self.write_types(locals, pool, types)?;
				self.write_types(stack, pool, types)?;
			},
		}
		Ok(())
	}

	fn write_types(&mut self, types_to_write: &[FrameType], pool: &mut ConstantPool, types: &TypeTable) -> Result<()> {
		self.bytes.write_usize_as_u16(types_to_write.len())?;
		for &t in types_to_write {
			self.write_type(t, pool, types)?;
		}
		Ok(())
	}

	fn write_type(&mut self, t: FrameType, pool: &mut ConstantPool, types: &TypeTable) -> Result<()> {
		let Kind::Base(base) = t.kind else {
			bail!("unresolved type {t:?} in frame");
		};
		if t.dim < 0 {
			bail!("negative array dimension in frame type {t:?}");
		}
		if t.dim == 0 {
			let tag = match base {
				Base::Top => verification_type::TOP,
				Base::Integer | Base::Boolean | Base::Byte | Base::Char | Base::Short => verification_type::INTEGER,
				Base::Float => verification_type::FLOAT,
				Base::Double => verification_type::DOUBLE,
				Base::Long => verification_type::LONG,
				Base::Null => verification_type::NULL,
				Base::UninitializedThis => verification_type::UNINITIALIZED_THIS,
				Base::Object(index) => {
					let class = pool.put_class(types.get(index)?.name());
					self.bytes.write_u8(verification_type::OBJECT);
					self.bytes.write_u16(class);
					return Ok(());
				},
				Base::Uninitialized(index) => {
					let TypeEntry::Uninitialized { offset, .. } = types.get(index)? else {
						bail!("type {index} isn't an uninitialized type");
					};
					self.bytes.write_u8(verification_type::UNINITIALIZED);
					self.bytes.write_usize_as_u16(*offset)?;
					return Ok(());
				},
			};
			self.bytes.write_u8(tag);
			return Ok(());
		}

		let mut descriptor = JavaString::with_capacity(t.dim as usize + 1);
		for _ in 0..t.dim {
			descriptor.push('[');
		}
		match base {
			Base::Integer => descriptor.push('I'),
			Base::Float => descriptor.push('F'),
			Base::Double => descriptor.push('D'),
			Base::Long => descriptor.push('J'),
			Base::Boolean => descriptor.push('Z'),
			Base::Byte => descriptor.push('B'),
			Base::Char => descriptor.push('C'),
			Base::Short => descriptor.push('S'),
			Base::Object(index) => descriptor.push_java_str(&object_descriptor(types.get(index)?.name())),
			_ => bail!("can't write an array of {base:?} into a frame"),
		}
		let class = pool.put_class(&descriptor);
		self.bytes.write_u8(verification_type::OBJECT);
		self.bytes.write_u16(class);
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::flow::frame::{Base, FrameType};
	use crate::flow::stack_map::StackMapWriter;
	use crate::flow::types::TypeTable;
	use crate::pool::ConstantPool;

	#[test]
	fn compressed_frames() -> Result<()> {
		let mut pool = ConstantPool::new();
		let mut types = TypeTable::new();
		let string = FrameType::object(types.normal(JavaStr::from_str("java/lang/String")));
		let string_class = pool.put_class(JavaStr::from_str("java/lang/String"));
		let initial = [string, FrameType::TOP, FrameType::TOP];

		let mut writer = StackMapWriter::new(true, &initial);
		// same
		writer.visit_frame(5, &initial, &[], &mut pool, &types)?;
		// append an int and a long
		writer.visit_frame(9, &[string, FrameType::INTEGER, FrameType::LONG, FrameType::TOP], &[], &mut pool, &types)?;
		// chop both again, with one item on the stack that's a full frame
		writer.visit_frame(100, &[string], &[FrameType::INTEGER], &mut pool, &types)?;
		// same locals, one stack item
		writer.visit_frame(101, &[string], &[FrameType::NULL], &mut pool, &types)?;

		let mut bytes = Vec::new();
		writer.write(&mut bytes)?;
		let [high, low] = string_class.to_be_bytes();
		assert_eq!(bytes, vec![
			0, 4,
			5,
			253, 0, 3, 1, 4,
			255, 0, 90, 0, 1, 7, high, low, 0, 1, 1,
			64, 5,
		]);
		Ok(())
	}

	#[test]
	fn arrays_and_old_format() -> Result<()> {
		let mut pool = ConstantPool::new();
		let mut types = TypeTable::new();
		let strings = FrameType::array(2, Base::Object(types.normal(JavaStr::from_str("java/lang/String"))));
		let booleans = FrameType::array(1, Base::Boolean);

		let mut writer = StackMapWriter::new(false, &[]);
		writer.visit_frame(3, &[strings], &[booleans], &mut pool, &types)?;
		let strings_class = pool.put_class(JavaStr::from_str("[[Ljava/lang/String;"));
		let booleans_class = pool.put_class(JavaStr::from_str("[Z"));

		let mut bytes = Vec::new();
		writer.write(&mut bytes)?;
		let mut expected = vec![0, 1, 0, 3, 0, 1, 7];
		expected.extend(strings_class.to_be_bytes());
		expected.extend([0, 1, 7]);
		expected.extend(booleans_class.to_be_bytes());
		assert_eq!(bytes, expected);
		assert_eq!(writer.attribute_name(), "StackMap");
		Ok(())
	}
}
