use std::cell::OnceCell;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::bytes::ByteReader;
use crate::class_constants::pool;
use crate::jstring;
use crate::tree::code::{Dynamic, Handle, Loadable, MemberRef};
use crate::tree::ConstantValue;

/// A small helper struct for reading. Represents a bootstrap method, but doesn't resolve the arguments yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BootstrapMethodRead {
	pub(crate) handle_index: u16,
	/// The arguments to the bootstrap method as raw constant pool indices, since an argument may itself
	/// be a dynamic constant using another bootstrap method.
	pub(crate) arguments: Vec<u16>,
}

/// A pool entry with its references still being indices. Strings are only located, they get decoded on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolEntry {
	Class { name_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	String { string_index: u16 },
	Integer { bytes: i32 },
	Float { bytes: u32 },
	Long { bytes: i64 },
	Double { bytes: u64 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	Utf8 { offset: usize, length: usize },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

/// Dynamic constants may use other dynamic constants as bootstrap arguments, this bounds the nesting.
const MAX_DYNAMIC_NESTING: u32 = 32;

pub(crate) struct PoolRead<'a> {
	data: &'a [u8],
	/// We store a [`None`] for the zero index, as well as for the upper indices of [`PoolEntry::Double`] and [`PoolEntry::Long`].
	inner: Vec<Option<PoolEntry>>,
	strings: Vec<OnceCell<JavaString>>,
}

impl<'a> PoolRead<'a> {
	/// Reads the constant pool from the specified reader. The first thing read is an `u16` specifying the size of the constant pool.
	pub(crate) fn read(reader: &mut ByteReader<'a>) -> Result<PoolRead<'a>> {
		let constant_pool_count = reader.read_u16_as_usize()?;
		let mut pool = Vec::with_capacity(constant_pool_count);
		pool.push(None);

		while pool.len() < constant_pool_count {
			let entry = match reader.read_u8()? {
				pool::UTF8 => {
					let length = reader.read_u16_as_usize()?;
					let offset = reader.position();
					reader.skip(length)
						.with_context(|| anyhow!("utf8 pool entry at index {} is truncated", pool.len()))?;
					PoolEntry::Utf8 { offset, length }
				},
				pool::INTEGER => PoolEntry::Integer { bytes: reader.read_i32()? },
				pool::FLOAT => PoolEntry::Float { bytes: reader.read_u32()? },
				pool::LONG => PoolEntry::Long { bytes: reader.read_i64()? },
				pool::DOUBLE => PoolEntry::Double { bytes: reader.read_u64()? },
				pool::CLASS => PoolEntry::Class { name_index: reader.read_u16()? },
				pool::STRING => PoolEntry::String { string_index: reader.read_u16()? },
				pool::FIELD_REF => PoolEntry::FieldRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::METHOD_REF => PoolEntry::MethodRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::NAME_AND_TYPE => PoolEntry::NameAndType {
					name_index: reader.read_u16()?,
					descriptor_index: reader.read_u16()?,
				},
				pool::METHOD_HANDLE => PoolEntry::MethodHandle {
					reference_kind: reader.read_u8()?,
					reference_index: reader.read_u16()?,
				},
				pool::METHOD_TYPE => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
				pool::DYNAMIC => PoolEntry::Dynamic {
					bootstrap_method_attribute_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic {
					bootstrap_method_attribute_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::MODULE => PoolEntry::Module { name_index: reader.read_u16()? },
				pool::PACKAGE => PoolEntry::Package { name_index: reader.read_u16()? },
				tag => bail!("unknown constant pool tag {tag} at pool index {}", pool.len()),
			};

			let wide = matches!(entry, PoolEntry::Long { .. } | PoolEntry::Double { .. });
			pool.push(Some(entry));
			if wide {
				// long and double take up two pool slots
				pool.push(None);
			}
		}

		if pool.len() > constant_pool_count {
			bail!("last constant pool entry is a long or double reaching past the pool count {constant_pool_count}");
		}

		let strings = (0..pool.len()).map(|_| OnceCell::new()).collect();

		Ok(PoolRead { data: reader.data(), inner: pool, strings })
	}

	/// The value of `constant_pool_count`.
	pub(crate) fn count(&self) -> usize {
		self.inner.len()
	}

	pub(crate) fn entries(&self) -> impl Iterator<Item = (u16, &PoolEntry)> {
		self.inner.iter()
			.enumerate()
			.filter_map(|(index, entry)| entry.as_ref().map(|entry| (index as u16, entry)))
	}

	pub(crate) fn get(&self, index: u16) -> Result<&PoolEntry> {
		if let Some(Some(entry)) = self.inner.get(index as usize) {
			Ok(entry)
		} else {
			bail!("pool entry at index {index:?} is not there: either index too large or the upper half of long or double");
		}
	}

	/// The raw modified UTF-8 bytes of a `Utf8` entry.
	pub(crate) fn utf8_bytes(&self, index: u16) -> Result<&'a [u8]> {
		let PoolEntry::Utf8 { offset, length } = *self.get(index)? else {
			bail!("pool entry at index {index} not `Utf8`");
		};
		let data = self.data;
		data.get(offset..offset + length)
			.with_context(|| anyhow!("utf8 pool entry at index {index} out of bounds"))
	}

	/// Gets a `Utf8` entry, decoding it only the first time.
	pub(crate) fn utf8(&self, index: u16) -> Result<&JavaStr> {
		let cell = self.strings.get(index as usize)
			.with_context(|| anyhow!("pool index {index} out of bounds"))?;
		if let Some(string) = cell.get() {
			let string: &JavaStr = string;
			return Ok(string);
		}
		let string = jstring::decode(self.utf8_bytes(index)?)
			.with_context(|| anyhow!("while getting pool index {index}"))?;
		let string: &JavaStr = cell.get_or_init(|| string);
		Ok(string)
	}

	pub(crate) fn optional_utf8(&self, index: u16) -> Result<Option<&JavaStr>> {
		if index == 0 { Ok(None) } else { self.utf8(index).map(Some) }
	}

	pub(crate) fn class(&self, index: u16) -> Result<&JavaStr> {
		let PoolEntry::Class { name_index } = *self.get(index)? else {
			bail!("pool entry at index {index} not `Class`");
		};
		self.utf8(name_index).pool_context(index)
	}

	pub(crate) fn optional_class(&self, index: u16) -> Result<Option<&JavaStr>> {
		if index == 0 { Ok(None) } else { self.class(index).map(Some) }
	}

	pub(crate) fn name_and_type(&self, index: u16) -> Result<(&JavaStr, &JavaStr)> {
		let PoolEntry::NameAndType { name_index, descriptor_index } = *self.get(index)? else {
			bail!("pool entry at index {index} not `NameAndType`");
		};
		let name = self.utf8(name_index).pool_context(index)?;
		let descriptor = self.utf8(descriptor_index).pool_context(index)?;
		Ok((name, descriptor))
	}

	/// Gets a `Fieldref`, `Methodref` or `InterfaceMethodref`. The `bool` tells if it was an `InterfaceMethodref`.
	pub(crate) fn member_ref(&self, index: u16) -> Result<(MemberRef, bool)> {
		let (class_index, name_and_type_index, interface) = match *self.get(index)? {
			PoolEntry::FieldRef { class_index, name_and_type_index } => (class_index, name_and_type_index, false),
			PoolEntry::MethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, false),
			PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, true),
			entry => bail!("pool entry at index {index} not a member reference: {entry:?}"),
		};
		let owner = self.class(class_index).pool_context(index)?;
		let (name, descriptor) = self.name_and_type(name_and_type_index).pool_context(index)?;
		Ok((MemberRef::new(owner.to_owned(), name.to_owned(), descriptor.to_owned()), interface))
	}

	pub(crate) fn method_handle(&self, index: u16) -> Result<Handle> {
		let PoolEntry::MethodHandle { reference_kind, reference_index } = *self.get(index)? else {
			bail!("pool entry at index {index} not `MethodHandle`");
		};
		if !(pool::method_handle_reference::GET_FIELD..=pool::method_handle_reference::INVOKE_INTERFACE).contains(&reference_kind) {
			bail!("unknown `reference_kind` {reference_kind} for `MethodHandle` pool entry at index {index}");
		}
		let (member, interface) = self.member_ref(reference_index).pool_context(index)?;
		Ok(Handle { kind: reference_kind, member, interface })
	}

	pub(crate) fn integer(&self, index: u16) -> Result<i32> {
		match *self.get(index)? {
			PoolEntry::Integer { bytes } => Ok(bytes),
			entry => bail!("pool entry at index {index} not `Integer`: {entry:?}"),
		}
	}
	pub(crate) fn float(&self, index: u16) -> Result<f32> {
		match *self.get(index)? {
			PoolEntry::Float { bytes } => Ok(f32::from_bits(bytes)),
			entry => bail!("pool entry at index {index} not `Float`: {entry:?}"),
		}
	}
	pub(crate) fn long(&self, index: u16) -> Result<i64> {
		match *self.get(index)? {
			PoolEntry::Long { bytes } => Ok(bytes),
			entry => bail!("pool entry at index {index} not `Long`: {entry:?}"),
		}
	}
	pub(crate) fn double(&self, index: u16) -> Result<f64> {
		match *self.get(index)? {
			PoolEntry::Double { bytes } => Ok(f64::from_bits(bytes)),
			entry => bail!("pool entry at index {index} not `Double`: {entry:?}"),
		}
	}

	pub(crate) fn constant_value(&self, index: u16) -> Result<ConstantValue> {
		Ok(match *self.get(index)? {
			PoolEntry::Integer { bytes } => ConstantValue::Integer(bytes),
			PoolEntry::Float { bytes } => ConstantValue::Float(f32::from_bits(bytes)),
			PoolEntry::Long { bytes } => ConstantValue::Long(bytes),
			PoolEntry::Double { bytes } => ConstantValue::Double(f64::from_bits(bytes)),
			PoolEntry::String { string_index } => ConstantValue::String(self.utf8(string_index).pool_context(index)?.to_owned()),
			entry => bail!("pool entry at index {index} may not be used in a `ConstantValue` attribute: {entry:?}"),
		})
	}

	/// Gets a loadable constant pool entry.
	///
	/// Loadable entries are: `Integer`, `Float`, `Long`, `Double`, `Class`, `String`, `MethodHandle`,
	/// `MethodType` and `Dynamic`.
	pub(crate) fn loadable(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead]) -> Result<Loadable> {
		self.loadable_nested(index, bootstrap_methods, 0)
	}

	fn loadable_nested(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead], depth: u32) -> Result<Loadable> {
		Ok(match *self.get(index)? {
			PoolEntry::Integer { bytes } => Loadable::Integer(bytes),
			PoolEntry::Float { bytes } => Loadable::Float(f32::from_bits(bytes)),
			PoolEntry::Long { bytes } => Loadable::Long(bytes),
			PoolEntry::Double { bytes } => Loadable::Double(f64::from_bits(bytes)),
			PoolEntry::Class { name_index } => Loadable::Class(self.utf8(name_index).pool_context(index)?.to_owned()),
			PoolEntry::String { string_index } => Loadable::String(self.utf8(string_index).pool_context(index)?.to_owned()),
			PoolEntry::MethodHandle { .. } => Loadable::MethodHandle(self.method_handle(index)?),
			PoolEntry::MethodType { descriptor_index } => Loadable::MethodType(self.utf8(descriptor_index).pool_context(index)?.to_owned()),
			PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index } => {
				let dynamic = self.dynamic(bootstrap_method_attribute_index, name_and_type_index, bootstrap_methods, depth)
					.pool_context(index)?;
				Loadable::Dynamic(Box::new(dynamic))
			},
			entry => bail!("pool entry at index {index} is not loadable: {entry:?}"),
		})
	}

	pub(crate) fn invoke_dynamic(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead]) -> Result<Dynamic> {
		let PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index } = *self.get(index)? else {
			bail!("pool entry at index {index} not `InvokeDynamic`");
		};
		self.dynamic(bootstrap_method_attribute_index, name_and_type_index, bootstrap_methods, 0)
			.pool_context(index)
	}

	fn dynamic(&self, bootstrap_index: u16, name_and_type_index: u16, bootstrap_methods: &[BootstrapMethodRead], depth: u32) -> Result<Dynamic> {
		if depth > MAX_DYNAMIC_NESTING {
			bail!("dynamic constants nested deeper than {MAX_DYNAMIC_NESTING}");
		}

		let (name, descriptor) = self.name_and_type(name_and_type_index)?;
		let method = bootstrap_methods.get(bootstrap_index as usize)
			.with_context(|| anyhow!("no bootstrap method at index {bootstrap_index}, there are only {}", bootstrap_methods.len()))?;

		let bootstrap = self.method_handle(method.handle_index)?;
		let arguments = method.arguments.iter()
			.map(|&argument| self.loadable_nested(argument, bootstrap_methods, depth + 1))
			.collect::<Result<Vec<_>>>()
			.with_context(|| anyhow!("while reading the arguments of bootstrap method {bootstrap_index} for {name:?} {descriptor:?}"))?;

		Ok(Dynamic { name: name.to_owned(), descriptor: descriptor.to_owned(), bootstrap, arguments })
	}
}

/// Tiny helper trait for adding pool indices to errors.
trait PoolContext {
	fn pool_context(self, index: u16) -> Self;
}
impl<T> PoolContext for Result<T> {
	fn pool_context(self, index: u16) -> Self {
		self.with_context(|| anyhow!("while getting pool index {index}"))
	}
}
