//! Interned class names for the frames of one method.

use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::hierarchy::TypeHierarchy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeEntry {
	/// An internal name, or an array descriptor.
	Normal(JavaString),
	/// The type pushed by the `new` instruction at `offset`.
	Uninitialized { class: JavaString, offset: usize },
}

impl TypeEntry {
	pub(crate) fn name(&self) -> &JavaStr {
		match self {
			TypeEntry::Normal(name) => name,
			TypeEntry::Uninitialized { class, .. } => class,
		}
	}
}

#[derive(Debug, Default)]
pub(crate) struct TypeTable {
	entries: Vec<TypeEntry>,
	indices: HashMap<TypeEntry, u32>,
	/// Common super types, keyed by the smaller index first.
	merged: HashMap<(u32, u32), u32>,
}

impl TypeTable {
	pub(crate) fn new() -> TypeTable {
		TypeTable::default()
	}

	fn add(&mut self, entry: TypeEntry) -> u32 {
		if let Some(&index) = self.indices.get(&entry) {
			return index;
		}
		let index = self.entries.len() as u32;
		self.entries.push(entry.clone());
		self.indices.insert(entry, index);
		index
	}

	pub(crate) fn normal(&mut self, name: &JavaStr) -> u32 {
		self.add(TypeEntry::Normal(name.to_owned()))
	}

	pub(crate) fn uninitialized(&mut self, class: &JavaStr, offset: usize) -> u32 {
		self.add(TypeEntry::Uninitialized { class: class.to_owned(), offset })
	}

	pub(crate) fn get(&self, index: u32) -> Result<&TypeEntry> {
		self.entries.get(index as usize)
			.with_context(|| anyhow!("no type with index {index}"))
	}

	/// The index of the common super class of the two normal types.
	pub(crate) fn merged(&mut self, a: u32, b: u32, hierarchy: &dyn TypeHierarchy) -> Result<u32> {
		let key = (a.min(b), a.max(b));
		if let Some(&index) = self.merged.get(&key) {
			return Ok(index);
		}
		let common = hierarchy.common_super_class(self.get(a)?.name(), self.get(b)?.name());
		let index = self.normal(&common);
		self.merged.insert(key, index);
		Ok(index)
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::flow::types::{TypeEntry, TypeTable};
	use crate::hierarchy::SuperClassMap;

	#[test]
	fn interning() -> Result<()> {
		let mut types = TypeTable::new();
		let string = types.normal(JavaStr::from_str("java/lang/String"));
		let new = types.uninitialized(JavaStr::from_str("java/lang/String"), 4);
		assert_ne!(string, new);
		assert_eq!(types.normal(JavaStr::from_str("java/lang/String")), string);
		assert_eq!(types.uninitialized(JavaStr::from_str("java/lang/String"), 4), new);
		assert_eq!(types.get(new)?, &TypeEntry::Uninitialized { class: "java/lang/String".into(), offset: 4 });
		Ok(())
	}

	#[test]
	fn merging_is_symmetric() -> Result<()> {
		let hierarchy = SuperClassMap::with_platform_classes();
		let mut types = TypeTable::new();
		let integer = types.normal(JavaStr::from_str("java/lang/Integer"));
		let long = types.normal(JavaStr::from_str("java/lang/Long"));
		let number = types.merged(integer, long, &hierarchy)?;
		assert_eq!(types.get(number)?.name(), JavaStr::from_str("java/lang/Number"));
		assert_eq!(types.merged(long, integer, &hierarchy)?, number);
		Ok(())
	}
}
