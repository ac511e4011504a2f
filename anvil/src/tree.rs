//! The structural values passed through the visitors.

use java_string::{JavaStr, JavaString};
use crate::class_constants::access;

pub mod code;
pub mod annotation;

/// The fixed header of a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
	pub minor_version: u16,
	pub major_version: u16,
	pub access: u16,
	pub name: JavaString,
	/// `None` only for `java/lang/Object` and `module-info`.
	pub super_class: Option<JavaString>,
	pub interfaces: Vec<JavaString>,
	pub signature: Option<JavaString>,
	pub deprecated: bool,
	pub synthetic: bool,
}

impl ClassHeader {
	pub fn new(major_version: u16, access: u16, name: impl Into<JavaString>, super_class: Option<JavaString>) -> ClassHeader {
		ClassHeader {
			minor_version: 0,
			major_version,
			access,
			name: name.into(),
			super_class,
			interfaces: Vec::new(),
			signature: None,
			deprecated: false,
			synthetic: false,
		}
	}
}

/// The value of a `ConstantValue` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(JavaString),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldHeader {
	pub access: u16,
	pub name: JavaString,
	pub descriptor: JavaString,
	pub signature: Option<JavaString>,
	pub constant_value: Option<ConstantValue>,
	pub deprecated: bool,
	pub synthetic: bool,
}

impl FieldHeader {
	pub fn new(access: u16, name: impl Into<JavaString>, descriptor: impl Into<JavaString>) -> FieldHeader {
		FieldHeader {
			access,
			name: name.into(),
			descriptor: descriptor.into(),
			signature: None,
			constant_value: None,
			deprecated: false,
			synthetic: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHeader {
	pub access: u16,
	pub name: JavaString,
	pub descriptor: JavaString,
	pub signature: Option<JavaString>,
	pub exceptions: Vec<JavaString>,
	pub deprecated: bool,
	pub synthetic: bool,
}

impl MethodHeader {
	pub fn new(access: u16, name: impl Into<JavaString>, descriptor: impl Into<JavaString>) -> MethodHeader {
		MethodHeader {
			access,
			name: name.into(),
			descriptor: descriptor.into(),
			signature: None,
			exceptions: Vec::new(),
			deprecated: false,
			synthetic: false,
		}
	}

	pub fn is_static(&self) -> bool {
		self.access & access::STATIC != 0
	}

	pub fn is_constructor(&self) -> bool {
		self.name == JavaStr::from_str("<init>")
	}
}

/// An entry of the `InnerClasses` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InnerClass {
	pub inner_class: JavaString,
	pub outer_class: Option<JavaString>,
	pub inner_name: Option<JavaString>,
	pub access: u16,
}

/// The `EnclosingMethod` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingMethod {
	pub class: JavaString,
	/// Name and descriptor of the method, if the class is enclosed by one.
	pub method: Option<(JavaString, JavaString)>,
}
