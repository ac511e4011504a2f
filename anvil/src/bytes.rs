//! Positional reading and appending of big endian values, the way the class file stores them.

use anyhow::{anyhow, bail, Context, Result};

/// A cursor over a byte slice.
///
/// Every read is bounds checked, reading past the end of the data is an error and never panics.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> ByteReader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> ByteReader<'a> {
		ByteReader { data, pos: 0 }
	}

	/// Creates a reader positioned at `pos`.
	pub(crate) fn at(data: &'a [u8], pos: usize) -> Result<ByteReader<'a>> {
		if pos > data.len() {
			bail!("position {pos} out of bounds for data of length {}", data.len());
		}
		Ok(ByteReader { data, pos })
	}

	pub(crate) fn position(&self) -> usize {
		self.pos
	}

	pub(crate) fn data(&self) -> &'a [u8] {
		self.data
	}

	pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
		let end = self.pos.checked_add(n)
			.filter(|&end| end <= self.data.len())
			.with_context(|| anyhow!("couldn't skip {n} bytes at {}, data is only {} bytes long", self.pos, self.data.len()))?;
		self.pos = end;
		Ok(())
	}

	pub(crate) fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let slice = self.read_slice(N)?;
		let mut buf = [0u8; N];
		buf.copy_from_slice(slice);
		Ok(buf)
	}

	pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
		let data = self.data;
		let slice = self.pos.checked_add(len)
			.and_then(|end| data.get(self.pos..end))
			.with_context(|| anyhow!("couldn't read {len} bytes at {}, data is only {} bytes long", self.pos, data.len()))?;
		self.pos += len;
		Ok(slice)
	}

	pub(crate) fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n().context("couldn't read u8, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n().context("couldn't read u16, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n().context("couldn't read u32, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_u64(&mut self) -> Result<u64> {
		Ok(u64::from_be_bytes(self.read_n().context("couldn't read u64, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_be_bytes(self.read_n().context("couldn't read i8, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_i16(&mut self) -> Result<i16> {
		Ok(i16::from_be_bytes(self.read_n().context("couldn't read i16, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_i32(&mut self) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_n().context("couldn't read i32, perhaps the data's end is reached?")?))
	}
	pub(crate) fn read_i64(&mut self) -> Result<i64> {
		Ok(i64::from_be_bytes(self.read_n().context("couldn't read i64, perhaps the data's end is reached?")?))
	}

	pub(crate) fn read_u8_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u8()? as usize)
	}
	pub(crate) fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	pub(crate) fn read_u32_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u32()? as usize)
	}

	pub(crate) fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>>
	where
		S: FnOnce(&mut Self) -> Result<usize>,
		E: FnMut(&mut Self) -> Result<T>,
	{
		let size = get_size(self)?;
		let mut vec = Vec::with_capacity(size.min(self.data.len()));
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}
}

/// Appending big endian values to a byte buffer.
pub(crate) trait ClassWrite {
	fn write_u8_slice(&mut self, buf: &[u8]);

	fn write_u8(&mut self, value: u8) {
		self.write_u8_slice(&[value])
	}
	fn write_u16(&mut self, value: u16) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_u32(&mut self, value: u32) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_u64(&mut self, value: u64) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i8(&mut self, value: i8) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i16(&mut self, value: i16) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i32(&mut self, value: i32) {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i64(&mut self, value: i64) {
		self.write_u8_slice(&value.to_be_bytes())
	}

	fn write_usize_as_u8(&mut self, value: usize) -> Result<()> {
		self.write_u8(u8::try_from(value).with_context(|| anyhow!("failed to convert {value} to u8 for writing: value too large"))?);
		Ok(())
	}
	fn write_usize_as_u16(&mut self, value: usize) -> Result<()> {
		self.write_u16(u16::try_from(value).with_context(|| anyhow!("failed to convert {value} to u16 for writing: value too large"))?);
		Ok(())
	}
	fn write_usize_as_u32(&mut self, value: usize) -> Result<()> {
		self.write_u32(u32::try_from(value).with_context(|| anyhow!("failed to convert {value} to u32 for writing: value too large"))?);
		Ok(())
	}

	fn write_slice<T>(
		&mut self,
		slice: &[T],
		put_size: impl FnOnce(&mut Self, usize) -> Result<()>,
		mut put_element: impl FnMut(&mut Self, &T) -> Result<()>,
	) -> Result<()> {
		put_size(self, slice.len())?;
		for value in slice {
			put_element(self, value)?;
		}
		Ok(())
	}
}

impl ClassWrite for Vec<u8> {
	fn write_u8_slice(&mut self, buf: &[u8]) {
		self.extend_from_slice(buf);
	}
}

/// Overwrites already written bytes, used for patching jump offsets.
pub(crate) fn put_i16_at(buf: &mut [u8], pos: usize, value: i16) -> Result<()> {
	put_slice_at(buf, pos, &value.to_be_bytes())
}

pub(crate) fn put_i32_at(buf: &mut [u8], pos: usize, value: i32) -> Result<()> {
	put_slice_at(buf, pos, &value.to_be_bytes())
}

fn put_slice_at(buf: &mut [u8], pos: usize, value: &[u8]) -> Result<()> {
	let len = buf.len();
	buf.get_mut(pos..pos + value.len())
		.with_context(|| anyhow!("cannot patch {} bytes at {pos}, buffer is only {len} bytes long", value.len()))?
		.copy_from_slice(value);
	Ok(())
}
