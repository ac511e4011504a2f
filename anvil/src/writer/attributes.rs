use anyhow::{anyhow, Context, Result};
use crate::bytes::ClassWrite;
use crate::class_constants::{frame, verification_type};
use crate::pool::ConstantPool;
use crate::tree::annotation::{Annotation, ElementValue};
use crate::tree::code::{Label, VerificationType};

/// Writes an attribute whose contents `f` writes into a buffer first, to know its length.
pub(crate) fn write_attribute<F>(writer: &mut Vec<u8>, pool: &mut ConstantPool, name: &str, f: F) -> Result<()>
where
	F: FnOnce(&mut Vec<u8>, &mut ConstantPool) -> Result<()>,
{
	let mut buffer = Vec::new();
	f(&mut buffer, pool)?;
	writer.write_u16(pool.put_str(name));
	writer.write_usize_as_u32(buffer.len()).with_context(|| anyhow!("attribute {name:?} is too large"))?;
	writer.write_u8_slice(&buffer);
	Ok(())
}

/// Writes the header of an attribute, the caller writes exactly `length` bytes of contents after it.
pub(crate) fn write_attribute_fix_length(writer: &mut Vec<u8>, pool: &mut ConstantPool, name: &str, length: usize) -> Result<()> {
	writer.write_u16(pool.put_str(name));
	writer.write_usize_as_u32(length).with_context(|| anyhow!("attribute {name:?} is too large"))
}

pub(crate) fn write_annotations(writer: &mut Vec<u8>, pool: &mut ConstantPool, annotations: &[Annotation]) -> Result<()> {
	writer.write_slice(annotations,
		|w, len| w.write_usize_as_u16(len).context("too many annotations"),
		|w, annotation| write_annotation(w, pool, annotation),
	)
}

pub(crate) fn write_parameter_annotations(writer: &mut Vec<u8>, pool: &mut ConstantPool, parameters: &[Vec<Annotation>]) -> Result<()> {
	writer.write_slice(parameters,
		|w, len| w.write_usize_as_u8(len).context("too many parameters with annotations"),
		|w, annotations| write_annotations(w, pool, annotations),
	)
}

fn write_annotation(writer: &mut Vec<u8>, pool: &mut ConstantPool, annotation: &Annotation) -> Result<()> {
	writer.write_u16(pool.put_utf8(&annotation.annotation_type));
	writer.write_slice(&annotation.element_value_pairs,
		|w, len| w.write_usize_as_u16(len)
			.with_context(|| anyhow!("too many element values for annotation {:?}", annotation.annotation_type)),
		|w, (name, value)| {
			w.write_u16(pool.put_utf8(name));
			write_element_value(w, pool, value)
		},
	)
}

fn write_element_value(writer: &mut Vec<u8>, pool: &mut ConstantPool, value: &ElementValue) -> Result<()> {
	match value {
		&ElementValue::Byte(value) => {
			writer.write_u8(b'B');
			writer.write_u16(pool.put_integer(value as i32));
		},
		&ElementValue::Char(value) => {
			writer.write_u8(b'C');
			writer.write_u16(pool.put_integer(value as i32));
		},
		&ElementValue::Double(value) => {
			writer.write_u8(b'D');
			writer.write_u16(pool.put_double(value));
		},
		&ElementValue::Float(value) => {
			writer.write_u8(b'F');
			writer.write_u16(pool.put_float(value));
		},
		&ElementValue::Int(value) => {
			writer.write_u8(b'I');
			writer.write_u16(pool.put_integer(value));
		},
		&ElementValue::Long(value) => {
			writer.write_u8(b'J');
			writer.write_u16(pool.put_long(value));
		},
		&ElementValue::Short(value) => {
			writer.write_u8(b'S');
			writer.write_u16(pool.put_integer(value as i32));
		},
		&ElementValue::Boolean(value) => {
			writer.write_u8(b'Z');
			writer.write_u16(pool.put_integer(value as i32));
		},
		ElementValue::String(value) => {
			writer.write_u8(b's');
			writer.write_u16(pool.put_utf8(value));
		},
		ElementValue::Enum { type_name, const_name } => {
			writer.write_u8(b'e');
			writer.write_u16(pool.put_utf8(type_name));
			writer.write_u16(pool.put_utf8(const_name));
		},
		ElementValue::Class(class) => {
			writer.write_u8(b'c');
			writer.write_u16(pool.put_utf8(class));
		},
		ElementValue::Annotation(annotation) => {
			writer.write_u8(b'@');
			write_annotation(writer, pool, annotation)?;
		},
		ElementValue::Array(values) => {
			writer.write_u8(b'[');
			writer.write_slice(values,
				|w, len| w.write_usize_as_u16(len).context("too many element values in array"),
				|w, value| write_element_value(w, pool, value),
			)?;
		},
	}
	Ok(())
}

/// Writes a frame given to the writer as a full frame. `offset` is the `offset_delta` for a `StackMapTable`,
/// and the absolute offset for a `StackMap`. `uninitialized` gives the offset of the `new` instruction at a label.
pub(crate) fn write_full_frame(
	writer: &mut Vec<u8>,
	pool: &mut ConstantPool,
	compressed: bool,
	offset: usize,
	locals: &[VerificationType],
	stack: &[VerificationType],
	uninitialized: impl Fn(Label) -> Result<usize>,
) -> Result<()> {
	if compressed {
		writer.write_u8(frame::FULL_FRAME);
	}
	writer.write_usize_as_u16(offset).context("frame offset too large")?;
	for types in [locals, stack] {
		writer.write_usize_as_u16(types.len()).context("too many types in frame")?;
		for t in types {
			match t {
				VerificationType::Top => writer.write_u8(verification_type::TOP),
				VerificationType::Integer => writer.write_u8(verification_type::INTEGER),
				VerificationType::Float => writer.write_u8(verification_type::FLOAT),
				VerificationType::Long => writer.write_u8(verification_type::LONG),
				VerificationType::Double => writer.write_u8(verification_type::DOUBLE),
				VerificationType::Null => writer.write_u8(verification_type::NULL),
				VerificationType::UninitializedThis => writer.write_u8(verification_type::UNINITIALIZED_THIS),
				VerificationType::Object(class) => {
					writer.write_u8(verification_type::OBJECT);
					writer.write_u16(pool.put_class(class));
				},
				&VerificationType::Uninitialized(label) => {
					let offset = uninitialized(label)?;
					writer.write_u8(verification_type::UNINITIALIZED);
					writer.write_usize_as_u16(offset)?;
				},
			}
		}
	}
	Ok(())
}
