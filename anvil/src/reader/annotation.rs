use anyhow::{bail, Result};
use crate::bytes::ByteReader;
use crate::reader::pool::PoolRead;
use crate::tree::annotation::{Annotation, ElementValue};

/// Annotations nest through `@` and `[` element values, this bounds how deep.
const MAX_NESTING: u32 = 64;

/// Reads the contents of a `RuntimeVisibleAnnotations` attribute.
pub(crate) fn read_annotations(reader: &mut ByteReader, pool: &PoolRead) -> Result<Vec<Annotation>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_annotation(r, pool, 0),
	)
}

/// Reads the contents of a `RuntimeVisibleParameterAnnotations` attribute.
pub(crate) fn read_parameter_annotations(reader: &mut ByteReader, pool: &PoolRead) -> Result<Vec<Vec<Annotation>>> {
	reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| read_annotations(r, pool),
	)
}

fn read_annotation(reader: &mut ByteReader, pool: &PoolRead, depth: u32) -> Result<Annotation> {
	let annotation_type = pool.utf8(reader.read_u16()?)?.to_owned();
	let element_value_pairs = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let name = pool.utf8(r.read_u16()?)?.to_owned();
			let value = read_element_value(r, pool, depth)?;
			Ok((name, value))
		},
	)?;
	Ok(Annotation { annotation_type, element_value_pairs })
}

fn read_element_value(reader: &mut ByteReader, pool: &PoolRead, depth: u32) -> Result<ElementValue> {
	if depth > MAX_NESTING {
		bail!("element values nested deeper than {MAX_NESTING}");
	}

	Ok(match reader.read_u8()? {
		b'B' => ElementValue::Byte(pool.integer(reader.read_u16()?)? as i8),
		b'C' => ElementValue::Char(pool.integer(reader.read_u16()?)? as u16),
		b'D' => ElementValue::Double(pool.double(reader.read_u16()?)?),
		b'F' => ElementValue::Float(pool.float(reader.read_u16()?)?),
		b'I' => ElementValue::Int(pool.integer(reader.read_u16()?)?),
		b'J' => ElementValue::Long(pool.long(reader.read_u16()?)?),
		b'S' => ElementValue::Short(pool.integer(reader.read_u16()?)? as i16),
		b'Z' => ElementValue::Boolean(pool.integer(reader.read_u16()?)? != 0),
		b's' => ElementValue::String(pool.utf8(reader.read_u16()?)?.to_owned()),
		b'e' => {
			let type_name = pool.utf8(reader.read_u16()?)?.to_owned();
			let const_name = pool.utf8(reader.read_u16()?)?.to_owned();
			ElementValue::Enum { type_name, const_name }
		},
		b'c' => ElementValue::Class(pool.utf8(reader.read_u16()?)?.to_owned()),
		b'@' => ElementValue::Annotation(read_annotation(reader, pool, depth + 1)?),
		b'[' => {
			let values = reader.read_vec(
				|r| r.read_u16_as_usize(),
				|r| read_element_value(r, pool, depth + 1),
			)?;
			ElementValue::Array(values)
		},
		tag => bail!("unknown `element_value` tag {tag:?}"),
	})
}
