//! Parsing of field and method descriptors.

use std::iter::Peekable;
use anyhow::{anyhow, bail, Context, Result};
use java_string::{Chars, JavaCodePoint, JavaStr, JavaString};

/// The element kind of a [`Type`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
	Byte,
	Char,
	Double,
	Float,
	Int,
	Long,
	Short,
	Boolean,
	/// The internal name of a class, like `java/lang/Object`.
	Object(JavaString),
}

/// A field type, possibly an array of `array_dimension` dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
	pub array_dimension: u8,
	pub base: BaseType,
}

impl Type {
	/// The number of local variable or operand stack slots a value of this type takes.
	pub fn size(&self) -> u16 {
		match self.base {
			BaseType::Long | BaseType::Double if self.array_dimension == 0 => 2,
			_ => 1,
		}
	}
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	const B: JavaCodePoint = JavaCodePoint::from_char('B');
	const C: JavaCodePoint = JavaCodePoint::from_char('C');
	const D: JavaCodePoint = JavaCodePoint::from_char('D');
	const F: JavaCodePoint = JavaCodePoint::from_char('F');
	const I: JavaCodePoint = JavaCodePoint::from_char('I');
	const J: JavaCodePoint = JavaCodePoint::from_char('J');
	const L: JavaCodePoint = JavaCodePoint::from_char('L');
	const S: JavaCodePoint = JavaCodePoint::from_char('S');
	const Z: JavaCodePoint = JavaCodePoint::from_char('Z');

	let mut array_dimension: u8 = 0;
	while chars.next_if_eq(&'[').is_some() {
		array_dimension = array_dimension.checked_add(1)
			.context("array dimension of descriptor doesn't fit into u8")?;
	}

	let char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	let base = match char {
		B => BaseType::Byte,
		C => BaseType::Char,
		D => BaseType::Double,
		F => BaseType::Float,
		I => BaseType::Int,
		J => BaseType::Long,
		S => BaseType::Short,
		Z => BaseType::Boolean,
		L => {
			let mut s = JavaString::new();

			let mut char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			while char != ';' {
				s.push_java(char);

				char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			}

			if s.is_empty() {
				bail!("empty class name in descriptor");
			}
			BaseType::Object(s)
		},
		x => bail!("unexpected char {x:?} in descriptor"),
	};

	Ok(Type { array_dimension, base })
}

pub fn parse_field(descriptor: &JavaStr) -> Result<Type> {
	let mut chars = descriptor.chars().peekable();
	let t = read_field_type(&mut chars)
		.with_context(|| anyhow!("failed to parse field descriptor {descriptor:?}"))?;
	if chars.peek().is_some() {
		bail!("expected end of field descriptor {descriptor:?}, got {:?} remaining", JavaString::from_iter(chars));
	}
	Ok(t)
}

/// A parsed method descriptor. A return type of `None` means `void`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
	pub parameters: Vec<Type>,
	pub return_type: Option<Type>,
}

impl MethodType {
	/// The number of slots the parameters take, not counting the implicit `this`.
	pub fn parameters_size(&self) -> u16 {
		self.parameters.iter().map(Type::size).sum()
	}

	pub fn return_size(&self) -> u16 {
		self.return_type.as_ref().map_or(0, Type::size)
	}
}

pub fn parse_method(descriptor: &JavaStr) -> Result<MethodType> {
	let mut chars = descriptor.chars().peekable();

	if chars.next_if_eq(&'(').is_none() {
		bail!("method descriptor {descriptor:?} doesn't start with '('");
	}

	let mut parameters = Vec::new();
	while chars.next_if_eq(&')').is_none() {
		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read parameter descriptor of {descriptor:?}"))?;
		parameters.push(t);
	}

	let return_type = if chars.next_if_eq(&'V').is_some() {
		None
	} else {
		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read return descriptor of {descriptor:?}"))?;
		Some(t)
	};

	if chars.peek().is_some() {
		bail!("expected end of method descriptor {descriptor:?}, got {:?} remaining", JavaString::from_iter(chars));
	}

	Ok(MethodType { parameters, return_type })
}

/// Wraps an internal class name into an object descriptor, arrays are passed through.
pub fn object_descriptor(class: &JavaStr) -> JavaString {
	if class.starts_with('[') {
		class.to_owned()
	} else {
		let mut s = JavaString::with_capacity(class.len() + 2);
		s.push('L');
		s.push_java_str(class);
		s.push(';');
		s
	}
}
