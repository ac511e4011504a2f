//! Class bytes waiting for an enclosing class's writer to pick them up.
//!
//! Classes get offered here by whoever processes them, from any thread. Offers go through a [`PendingSession`],
//! which takes them back out again if the class wasn't processed to the end.

use std::collections::HashMap;
use java_string::{JavaStr, JavaString};
use log::trace;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct PendingClasses {
	classes: Mutex<HashMap<JavaString, Vec<u8>>>,
}

impl PendingClasses {
	pub fn new() -> PendingClasses {
		PendingClasses::default()
	}

	/// Starts offering classes. Everything offered through the session is removed again unless
	/// [`PendingSession::commit`] is called.
	pub fn session(&self) -> PendingSession<'_> {
		PendingSession { pending: self, offered: Vec::new() }
	}

	/// Removes and returns the bytes of a class.
	pub fn take(&self, name: &JavaStr) -> Option<Vec<u8>> {
		self.classes.lock().remove(&name.to_owned())
	}

	pub fn contains(&self, name: &JavaStr) -> bool {
		self.classes.lock().contains_key(&name.to_owned())
	}

	pub fn len(&self) -> usize {
		self.classes.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.lock().is_empty()
	}

	/// Takes all classes, in no particular order.
	pub fn drain(&self) -> Vec<(JavaString, Vec<u8>)> {
		self.classes.lock().drain().collect()
	}
}

/// Scope of the offers made while processing one class.
#[derive(Debug)]
#[must_use = "dropping a session without committing it removes its offers"]
pub struct PendingSession<'a> {
	pending: &'a PendingClasses,
	offered: Vec<JavaString>,
}

impl PendingSession<'_> {
	/// Offers the bytes of a class, replacing an earlier offer for the same name.
	pub fn offer(&mut self, name: JavaString, bytes: Vec<u8>) {
		trace!("offering {} bytes for {name:?}", bytes.len());
		self.pending.classes.lock().insert(name.clone(), bytes);
		self.offered.push(name);
	}

	/// Keeps the offers.
	pub fn commit(mut self) {
		self.offered.clear();
	}
}

impl Drop for PendingSession<'_> {
	fn drop(&mut self) {
		if self.offered.is_empty() {
			return;
		}
		let mut classes = self.pending.classes.lock();
		for name in self.offered.drain(..) {
			trace!("withdrawing offer for {name:?}");
			classes.remove(&name);
		}
	}
}
