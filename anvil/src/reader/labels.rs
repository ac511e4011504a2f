use std::collections::{HashMap, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::code::Label;

/// A helper struct for reading bytecode offsets into [`Label`]s.
///
/// Offsets referenced by instructions, the exception table or frames are normal labels. Offsets only
/// referenced by line numbers and local variables are debug labels, they don't start a basic block.
pub(crate) struct Labels {
	code_length: usize,
	labels: HashMap<usize, Label>,
	normal: HashSet<usize>,
}

impl Labels {
	pub(crate) fn new(code_length: usize) -> Labels {
		Labels {
			code_length,
			labels: HashMap::with_capacity(code_length / 3),
			normal: HashSet::new(),
		}
	}

	fn get_or_add_unchecked(&mut self, pc: usize) -> Label {
		*self.labels.entry(pc).or_insert_with(Label::new)
	}

	/// Creates a normal label for an offset inside the code.
	pub(crate) fn create(&mut self, pc: usize) -> Result<Label> {
		if pc >= self.code_length {
			bail!("label for bytecode offset {pc:?} out of bounds for code length {:?}", self.code_length);
		}
		self.normal.insert(pc);
		Ok(self.get_or_add_unchecked(pc))
	}

	/// Creates a normal label that may also be the end of the code.
	pub(crate) fn create_end(&mut self, pc: usize) -> Result<Label> {
		if pc > self.code_length {
			bail!("label for bytecode offset {pc:?} out of bounds for code length {:?}", self.code_length);
		}
		self.normal.insert(pc);
		Ok(self.get_or_add_unchecked(pc))
	}

	/// Creates a label only used by debug information, it may also be the end of the code.
	pub(crate) fn create_debug(&mut self, pc: usize) -> Result<Label> {
		if pc > self.code_length {
			bail!("label for bytecode offset {pc:?} out of bounds for code length {:?}", self.code_length);
		}
		Ok(self.get_or_add_unchecked(pc))
	}

	pub(crate) fn try_get(&self, pc: usize) -> Result<Label> {
		self.get(pc).with_context(|| anyhow!("no label at bytecode offset {pc:?}"))
	}

	pub(crate) fn get(&self, pc: usize) -> Option<Label> {
		self.labels.get(&pc).copied()
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, Label)> + '_ {
		self.labels.iter().map(|(&pc, &label)| (pc, label))
	}

	pub(crate) fn is_normal(&self, pc: usize) -> bool {
		self.normal.contains(&pc)
	}
}
