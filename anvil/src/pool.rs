//! The constant pool of a class being written.
//!
//! Entries are interned: putting a structurally equal entry twice yields the same index. A pool can also be
//! seeded with the encoded pool of an existing class, keeping all its indices valid.

use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::bytes::{ByteReader, ClassWrite};
use crate::class_constants::pool;
use crate::error::CapacityError;
use crate::jstring;
use crate::reader::pool::{BootstrapMethodRead, PoolEntry as PoolEntryRead, PoolRead};
use crate::tree::code::{Dynamic, Handle, Loadable, MemberRef};
use crate::tree::ConstantValue;

/// The largest `constant_pool_count` the format allows.
pub const MAX_POOL_COUNT: usize = 0xFFFF;

/// The structural key of an entry. References to other entries are indices, which is fine as those are
/// interned as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolEntry {
	Utf8(JavaString),
	Integer(i32),
	Float(u32),
	Long(i64),
	Double(u64),
	Class(u16),
	String(u16),
	FieldRef(u16, u16),
	MethodRef(u16, u16),
	InterfaceMethodRef(u16, u16),
	NameAndType(u16, u16),
	MethodHandle(u8, u16),
	MethodType(u16),
	Dynamic(u16, u16),
	InvokeDynamic(u16, u16),
	Module(u16),
	Package(u16),
}

impl PoolEntry {
	fn is_wide(&self) -> bool {
		matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
	}
}

/// A small helper struct for the `BootstrapMethods` attribute. Represents a bootstrap method, with arguments as pool indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BootstrapMethodWrite {
	handle: u16,
	arguments: Vec<u16>,
}

#[derive(Debug, Default)]
pub struct ConstantPool {
	/// The encoded entries, without the count.
	bytes: Vec<u8>,
	/// The index the next entry gets. May grow past what fits into an `u16`, this is checked when writing.
	count: usize,
	entries: HashMap<PoolEntry, u16>,

	/// The encoded `bootstrap_methods` array of the `BootstrapMethods` attribute, without the count.
	bootstrap_bytes: Vec<u8>,
	bootstrap_count: usize,
	bootstrap_methods: HashMap<BootstrapMethodWrite, u16>,

	/// The first string that was too long for a `Utf8` entry.
	oversized_string: Option<usize>,
}

impl ConstantPool {
	pub fn new() -> ConstantPool {
		ConstantPool {
			count: 1,
			..ConstantPool::default()
		}
	}

	/// Seeds a pool with an already encoded pool, copying its bytes verbatim and only rebuilding the lookup
	/// table. `raw` are the encoded entries, the bootstrap methods are the ones of the source class.
	pub(crate) fn copy_from(
		source: &PoolRead,
		raw: &[u8],
		bootstrap_methods: Option<(&[u8], &[BootstrapMethodRead])>,
	) -> Result<ConstantPool> {
		let mut entries = HashMap::with_capacity(source.count());

		for (index, &entry) in source.entries() {
			let key = match entry {
				PoolEntryRead::Utf8 { .. } => PoolEntry::Utf8(source.utf8(index)?.to_owned()),
				PoolEntryRead::Integer { bytes } => PoolEntry::Integer(bytes),
				PoolEntryRead::Float { bytes } => PoolEntry::Float(bytes),
				PoolEntryRead::Long { bytes } => PoolEntry::Long(bytes),
				PoolEntryRead::Double { bytes } => PoolEntry::Double(bytes),
				PoolEntryRead::Class { name_index } => PoolEntry::Class(name_index),
				PoolEntryRead::String { string_index } => PoolEntry::String(string_index),
				PoolEntryRead::FieldRef { class_index, name_and_type_index } => PoolEntry::FieldRef(class_index, name_and_type_index),
				PoolEntryRead::MethodRef { class_index, name_and_type_index } => PoolEntry::MethodRef(class_index, name_and_type_index),
				PoolEntryRead::InterfaceMethodRef { class_index, name_and_type_index } =>
					PoolEntry::InterfaceMethodRef(class_index, name_and_type_index),
				PoolEntryRead::NameAndType { name_index, descriptor_index } => PoolEntry::NameAndType(name_index, descriptor_index),
				PoolEntryRead::MethodHandle { reference_kind, reference_index } => PoolEntry::MethodHandle(reference_kind, reference_index),
				PoolEntryRead::MethodType { descriptor_index } => PoolEntry::MethodType(descriptor_index),
				PoolEntryRead::Dynamic { bootstrap_method_attribute_index, name_and_type_index } =>
					PoolEntry::Dynamic(bootstrap_method_attribute_index, name_and_type_index),
				PoolEntryRead::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index } =>
					PoolEntry::InvokeDynamic(bootstrap_method_attribute_index, name_and_type_index),
				PoolEntryRead::Module { name_index } => PoolEntry::Module(name_index),
				PoolEntryRead::Package { name_index } => PoolEntry::Package(name_index),
			};
			// a pool may contain duplicates, the first one wins
			entries.entry(key).or_insert(index);
		}

		let mut pool = ConstantPool {
			bytes: raw.to_vec(),
			count: source.count(),
			entries,
			..ConstantPool::default()
		};

		if let Some((raw, methods)) = bootstrap_methods {
			pool.bootstrap_bytes = raw.to_vec();
			pool.bootstrap_count = methods.len();
			for (index, method) in methods.iter().enumerate() {
				let key = BootstrapMethodWrite { handle: method.handle_index, arguments: method.arguments.clone() };
				pool.bootstrap_methods.entry(key).or_insert(index as u16);
			}
		}

		Ok(pool)
	}

	/// The value `constant_pool_count` would have.
	pub fn count(&self) -> usize {
		self.count
	}

	fn put(&mut self, entry: PoolEntry) -> u16 {
		if let Some(&index) = self.entries.get(&entry) {
			return index;
		}

		// wraps if there are too many entries, `write` refuses such a pool
		let index = self.count as u16;

		let bytes = &mut self.bytes;
		match &entry {
			PoolEntry::Utf8(string) => {
				let vec = jstring::encode(string);
				if vec.len() > u16::MAX as usize && self.oversized_string.is_none() {
					self.oversized_string = Some(vec.len());
				}
				bytes.write_u8(pool::UTF8);
				bytes.write_u16(vec.len() as u16);
				bytes.write_u8_slice(&vec);
			},
			&PoolEntry::Integer(value) => {
				bytes.write_u8(pool::INTEGER);
				bytes.write_i32(value);
			},
			&PoolEntry::Float(value) => {
				bytes.write_u8(pool::FLOAT);
				bytes.write_u32(value);
			},
			&PoolEntry::Long(value) => {
				bytes.write_u8(pool::LONG);
				bytes.write_i64(value);
			},
			&PoolEntry::Double(value) => {
				bytes.write_u8(pool::DOUBLE);
				bytes.write_u64(value);
			},
			&PoolEntry::Class(name) => {
				bytes.write_u8(pool::CLASS);
				bytes.write_u16(name);
			},
			&PoolEntry::String(string) => {
				bytes.write_u8(pool::STRING);
				bytes.write_u16(string);
			},
			&PoolEntry::FieldRef(class, name_and_type) => {
				bytes.write_u8(pool::FIELD_REF);
				bytes.write_u16(class);
				bytes.write_u16(name_and_type);
			},
			&PoolEntry::MethodRef(class, name_and_type) => {
				bytes.write_u8(pool::METHOD_REF);
				bytes.write_u16(class);
				bytes.write_u16(name_and_type);
			},
			&PoolEntry::InterfaceMethodRef(class, name_and_type) => {
				bytes.write_u8(pool::INTERFACE_METHOD_REF);
				bytes.write_u16(class);
				bytes.write_u16(name_and_type);
			},
			&PoolEntry::NameAndType(name, descriptor) => {
				bytes.write_u8(pool::NAME_AND_TYPE);
				bytes.write_u16(name);
				bytes.write_u16(descriptor);
			},
			&PoolEntry::MethodHandle(kind, reference) => {
				bytes.write_u8(pool::METHOD_HANDLE);
				bytes.write_u8(kind);
				bytes.write_u16(reference);
			},
			&PoolEntry::MethodType(descriptor) => {
				bytes.write_u8(pool::METHOD_TYPE);
				bytes.write_u16(descriptor);
			},
			&PoolEntry::Dynamic(bootstrap, name_and_type) => {
				bytes.write_u8(pool::DYNAMIC);
				bytes.write_u16(bootstrap);
				bytes.write_u16(name_and_type);
			},
			&PoolEntry::InvokeDynamic(bootstrap, name_and_type) => {
				bytes.write_u8(pool::INVOKE_DYNAMIC);
				bytes.write_u16(bootstrap);
				bytes.write_u16(name_and_type);
			},
			&PoolEntry::Module(name) => {
				bytes.write_u8(pool::MODULE);
				bytes.write_u16(name);
			},
			&PoolEntry::Package(name) => {
				bytes.write_u8(pool::PACKAGE);
				bytes.write_u16(name);
			},
		}

		self.count += if entry.is_wide() { 2 } else { 1 };
		self.entries.insert(entry, index);
		index
	}

	pub fn put_utf8(&mut self, string: &JavaStr) -> u16 {
		self.put(PoolEntry::Utf8(string.to_owned()))
	}

	pub(crate) fn put_str(&mut self, string: &str) -> u16 {
		self.put_utf8(JavaStr::from_str(string))
	}

	pub fn put_class(&mut self, name: &JavaStr) -> u16 {
		let name = self.put_utf8(name);
		self.put(PoolEntry::Class(name))
	}

	pub fn put_string(&mut self, string: &JavaStr) -> u16 {
		let string = self.put_utf8(string);
		self.put(PoolEntry::String(string))
	}

	pub fn put_integer(&mut self, value: i32) -> u16 {
		self.put(PoolEntry::Integer(value))
	}

	pub fn put_float(&mut self, value: f32) -> u16 {
		self.put(PoolEntry::Float(value.to_bits()))
	}

	pub fn put_long(&mut self, value: i64) -> u16 {
		self.put(PoolEntry::Long(value))
	}

	pub fn put_double(&mut self, value: f64) -> u16 {
		self.put(PoolEntry::Double(value.to_bits()))
	}

	pub fn put_name_and_type(&mut self, name: &JavaStr, descriptor: &JavaStr) -> u16 {
		let name = self.put_utf8(name);
		let descriptor = self.put_utf8(descriptor);
		self.put(PoolEntry::NameAndType(name, descriptor))
	}

	pub fn put_field_ref(&mut self, field: &MemberRef) -> u16 {
		let class = self.put_class(&field.owner);
		let name_and_type = self.put_name_and_type(&field.name, &field.descriptor);
		self.put(PoolEntry::FieldRef(class, name_and_type))
	}

	/// Puts a `Methodref`, or an `InterfaceMethodref` if `interface` is set.
	pub fn put_method_ref(&mut self, method: &MemberRef, interface: bool) -> u16 {
		let class = self.put_class(&method.owner);
		let name_and_type = self.put_name_and_type(&method.name, &method.descriptor);
		if interface {
			self.put(PoolEntry::InterfaceMethodRef(class, name_and_type))
		} else {
			self.put(PoolEntry::MethodRef(class, name_and_type))
		}
	}

	pub fn put_method_handle(&mut self, handle: &Handle) -> u16 {
		use pool::method_handle_reference::*;
		let reference = match handle.kind {
			GET_FIELD | GET_STATIC | PUT_FIELD | PUT_STATIC => self.put_field_ref(&handle.member),
			_ => self.put_method_ref(&handle.member, handle.interface),
		};
		self.put(PoolEntry::MethodHandle(handle.kind, reference))
	}

	pub fn put_method_type(&mut self, descriptor: &JavaStr) -> u16 {
		let descriptor = self.put_utf8(descriptor);
		self.put(PoolEntry::MethodType(descriptor))
	}

	pub fn put_constant_dynamic(&mut self, dynamic: &Dynamic) -> u16 {
		let bootstrap = self.put_bootstrap_method(&dynamic.bootstrap, &dynamic.arguments);
		let name_and_type = self.put_name_and_type(&dynamic.name, &dynamic.descriptor);
		self.put(PoolEntry::Dynamic(bootstrap, name_and_type))
	}

	pub fn put_invoke_dynamic(&mut self, dynamic: &Dynamic) -> u16 {
		let bootstrap = self.put_bootstrap_method(&dynamic.bootstrap, &dynamic.arguments);
		let name_and_type = self.put_name_and_type(&dynamic.name, &dynamic.descriptor);
		self.put(PoolEntry::InvokeDynamic(bootstrap, name_and_type))
	}

	pub fn put_loadable(&mut self, loadable: &Loadable) -> u16 {
		match loadable {
			&Loadable::Integer(value) => self.put_integer(value),
			&Loadable::Float(value) => self.put_float(value),
			&Loadable::Long(value) => self.put_long(value),
			&Loadable::Double(value) => self.put_double(value),
			Loadable::Class(name) => self.put_class(name),
			Loadable::String(string) => self.put_string(string),
			Loadable::MethodType(descriptor) => self.put_method_type(descriptor),
			Loadable::MethodHandle(handle) => self.put_method_handle(handle),
			Loadable::Dynamic(dynamic) => self.put_constant_dynamic(dynamic),
		}
	}

	pub fn put_constant_value(&mut self, value: &ConstantValue) -> u16 {
		match value {
			&ConstantValue::Integer(value) => self.put_integer(value),
			&ConstantValue::Float(value) => self.put_float(value),
			&ConstantValue::Long(value) => self.put_long(value),
			&ConstantValue::Double(value) => self.put_double(value),
			ConstantValue::String(string) => self.put_string(string),
		}
	}

	/// Interns a bootstrap method, returning its index in the `BootstrapMethods` attribute.
	pub fn put_bootstrap_method(&mut self, handle: &Handle, arguments: &[Loadable]) -> u16 {
		let handle = self.put_method_handle(handle);
		let arguments: Vec<u16> = arguments.iter()
			.map(|argument| self.put_loadable(argument))
			.collect();
		let key = BootstrapMethodWrite { handle, arguments };

		if let Some(&index) = self.bootstrap_methods.get(&key) {
			return index;
		}

		let index = self.bootstrap_count as u16;
		self.bootstrap_bytes.write_u16(key.handle);
		self.bootstrap_bytes.write_u16(key.arguments.len() as u16);
		for &argument in &key.arguments {
			self.bootstrap_bytes.write_u16(argument);
		}
		self.bootstrap_count += 1;
		self.bootstrap_methods.insert(key, index);
		index
	}

	pub(crate) fn has_bootstrap_methods(&self) -> bool {
		self.bootstrap_count > 0
	}

	/// Writes the contents of the `BootstrapMethods` attribute.
	pub(crate) fn write_bootstrap_methods(&self, writer: &mut Vec<u8>) -> Result<()> {
		if self.bootstrap_count > u16::MAX as usize {
			return Err(CapacityError { what: "bootstrap methods", size: self.bootstrap_count, limit: u16::MAX as usize }.into());
		}
		writer.write_usize_as_u16(self.bootstrap_count)?;
		writer.write_u8_slice(&self.bootstrap_bytes);
		Ok(())
	}

	/// Checks that the pool fits into the format.
	pub fn check_capacity(&self) -> Result<()> {
		if self.count > MAX_POOL_COUNT {
			return Err(CapacityError { what: "constant pool", size: self.count, limit: MAX_POOL_COUNT }.into());
		}
		if let Some(size) = self.oversized_string {
			return Err(CapacityError { what: "utf8 constant", size, limit: u16::MAX as usize }.into());
		}
		Ok(())
	}

	/// Writes `constant_pool_count` and the entries.
	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<()> {
		self.check_capacity()?;
		writer.write_usize_as_u16(self.count)?;
		writer.write_u8_slice(&self.bytes);
		Ok(())
	}
}

/// Splits the raw `bootstrap_methods` array of a `BootstrapMethods` attribute into its entries.
pub(crate) fn read_bootstrap_methods(data: &[u8]) -> Result<Vec<BootstrapMethodRead>> {
	let mut reader = ByteReader::new(data);
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(BootstrapMethodRead {
			handle_index: r.read_u16()?,
			arguments: r.read_vec(|r| r.read_u16_as_usize(), |r| r.read_u16())?,
		}),
	).with_context(|| anyhow!("malformed `BootstrapMethods` attribute"))
}
