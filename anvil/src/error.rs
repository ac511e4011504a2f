//! Error kinds of the engine.
//!
//! Errors are [`anyhow::Error`]s. The kinds a caller may want to tell apart are marked by a concrete error
//! somewhere in the chain, see [`Failure::classify`]. Abandoning a class on purpose isn't an error at all, it's a
//! [`ControlFlow::Break`] carrying [`Abandoned`].

use std::fmt::{Display, Formatter};
use std::ops::ControlFlow;
use anyhow::Result;

/// Marker for a collaborator that stopped visiting a class on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

/// The return type of visitor callbacks that may abandon the class.
pub type Visit<T = ()> = Result<ControlFlow<Abandoned, T>>;

/// A format limit was exceeded while writing a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityError {
	pub what: &'static str,
	pub size: usize,
	pub limit: usize,
}

impl Display for CapacityError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} too large: {} exceeds the limit of {}", self.what, self.size, self.limit)
	}
}

impl std::error::Error for CapacityError {}

/// What kind of failure an error represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
	/// Malformed or truncated input, or anything else that isn't a capacity problem.
	Format,
	/// The pool or a method body outgrew the class file format.
	Capacity,
}

impl Failure {
	pub fn classify(error: &anyhow::Error) -> Failure {
		if error.chain().any(|cause| cause.is::<CapacityError>()) {
			Failure::Capacity
		} else {
			Failure::Format
		}
	}
}

/// Turns an [`Abandoned`] break into `None`.
pub fn completed<T>(flow: ControlFlow<Abandoned, T>) -> Option<T> {
	match flow {
		ControlFlow::Continue(value) => Some(value),
		ControlFlow::Break(Abandoned) => None,
	}
}

#[cfg(test)]
mod testing {
	use anyhow::{anyhow, Context, Result};
	use pretty_assertions::assert_eq;
	use crate::error::{CapacityError, Failure};

	#[test]
	fn capacity_survives_context() -> Result<()> {
		let error: anyhow::Error = CapacityError { what: "constant pool", size: 70000, limit: 65535 }.into();
		let error = Err::<(), _>(error).context("while writing class Foo").unwrap_err();
		assert_eq!(Failure::classify(&error), Failure::Capacity);
		assert_eq!(Failure::classify(&anyhow!("wrong magic")), Failure::Format);
		Ok(())
	}
}
