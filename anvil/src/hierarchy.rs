//! Super class lookups for merging reference types.
//!
//! Computing the common super class of two types needs to know about classes that aren't being written. This is
//! supplied by the caller through [`TypeHierarchy`]. Lookups happen from many threads at once, so implementations
//! must be [`Sync`].

use std::collections::{HashMap, HashSet};
use java_string::{JavaStr, JavaString};
use log::debug;
use parking_lot::RwLock;

pub const OBJECT: &str = "java/lang/Object";

pub trait TypeHierarchy: Sync {
	/// The super class of a class, `None` if the class is unknown, or if it's `java/lang/Object`.
	fn super_class(&self, name: &JavaStr) -> Option<JavaString>;

	/// Makes a class known. A class writer does this for every class it encodes.
	fn register(&self, name: &JavaStr, super_class: Option<&JavaStr>);

	/// The most specific class both `a` and `b` extend.
	///
	/// A class that can't be looked up makes this `java/lang/Object`. That's always a valid answer, it only makes
	/// frames less precise.
	fn common_super_class(&self, a: &JavaStr, b: &JavaStr) -> JavaString {
		let object = JavaStr::from_str(OBJECT);
		if a == b {
			return a.to_owned();
		}
		if a == object || b == object {
			return object.to_owned();
		}

		let Some(chain_of_a) = super_chain(self, a) else {
			return object.to_owned();
		};

		let mut current = b.to_owned();
		let mut seen = HashSet::new();
		loop {
			if chain_of_a.contains(&current) {
				return current;
			}
			if !seen.insert(current.clone()) {
				debug!("cycle in the super classes of {b:?}, using {OBJECT}");
				return object.to_owned();
			}
			match self.super_class(&current) {
				Some(super_class) => current = super_class,
				None => {
					debug!("super class of {current:?} unknown, using {OBJECT} as common super class of {a:?} and {b:?}");
					return object.to_owned();
				},
			}
		}
	}
}

/// All classes `name` extends, including itself and `java/lang/Object`. `None` if some class in between is unknown
/// or if the super classes form a cycle.
fn super_chain<H: TypeHierarchy + ?Sized>(hierarchy: &H, name: &JavaStr) -> Option<HashSet<JavaString>> {
	let object = JavaStr::from_str(OBJECT);
	let mut chain = HashSet::new();
	let mut current = name.to_owned();
	while current != object {
		if !chain.insert(current.clone()) {
			debug!("cycle in the super classes of {name:?}, using {OBJECT}");
			return None;
		}
		match hierarchy.super_class(&current) {
			Some(super_class) => current = super_class,
			None => {
				debug!("super class of {current:?} unknown, using {OBJECT}");
				return None;
			},
		}
	}
	chain.insert(current);
	Some(chain)
}

/// A [`TypeHierarchy`] that knows exactly the classes it got told about.
#[derive(Debug, Default)]
pub struct SuperClassMap {
	classes: RwLock<HashMap<JavaString, Option<JavaString>>>,
}

/// Pairs of class and super class, for [`SuperClassMap::with_platform_classes`].
const PLATFORM_CLASSES: &[(&str, &str)] = &[
	("java/lang/String", OBJECT),
	("java/lang/Class", OBJECT),
	("java/lang/Enum", OBJECT),
	("java/lang/Record", OBJECT),
	("java/lang/Thread", OBJECT),
	("java/lang/Boolean", OBJECT),
	("java/lang/Character", OBJECT),
	("java/lang/Number", OBJECT),
	("java/lang/Byte", "java/lang/Number"),
	("java/lang/Short", "java/lang/Number"),
	("java/lang/Integer", "java/lang/Number"),
	("java/lang/Long", "java/lang/Number"),
	("java/lang/Float", "java/lang/Number"),
	("java/lang/Double", "java/lang/Number"),
	("java/lang/AbstractStringBuilder", OBJECT),
	("java/lang/StringBuilder", "java/lang/AbstractStringBuilder"),
	("java/lang/StringBuffer", "java/lang/AbstractStringBuilder"),

	("java/lang/Throwable", OBJECT),
	("java/lang/Exception", "java/lang/Throwable"),
	("java/lang/Error", "java/lang/Throwable"),
	("java/lang/RuntimeException", "java/lang/Exception"),
	("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
	("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
	("java/lang/IllegalStateException", "java/lang/RuntimeException"),
	("java/lang/NullPointerException", "java/lang/RuntimeException"),
	("java/lang/ClassCastException", "java/lang/RuntimeException"),
	("java/lang/ArithmeticException", "java/lang/RuntimeException"),
	("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
	("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
	("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
	("java/lang/StringIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
	("java/lang/InterruptedException", "java/lang/Exception"),
	("java/lang/ReflectiveOperationException", "java/lang/Exception"),
	("java/lang/ClassNotFoundException", "java/lang/ReflectiveOperationException"),
	("java/lang/NoSuchFieldException", "java/lang/ReflectiveOperationException"),
	("java/lang/NoSuchMethodException", "java/lang/ReflectiveOperationException"),
	("java/lang/LinkageError", "java/lang/Error"),
	("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
	("java/lang/AssertionError", "java/lang/Error"),
	("java/lang/VirtualMachineError", "java/lang/Error"),
	("java/lang/OutOfMemoryError", "java/lang/VirtualMachineError"),
	("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
	("java/io/IOException", "java/lang/Exception"),
	("java/io/FileNotFoundException", "java/io/IOException"),
	("java/io/UncheckedIOException", "java/lang/RuntimeException"),

	("java/util/AbstractCollection", OBJECT),
	("java/util/AbstractList", "java/util/AbstractCollection"),
	("java/util/AbstractSequentialList", "java/util/AbstractList"),
	("java/util/ArrayList", "java/util/AbstractList"),
	("java/util/LinkedList", "java/util/AbstractSequentialList"),
	("java/util/Vector", "java/util/AbstractList"),
	("java/util/Stack", "java/util/Vector"),
	("java/util/ArrayDeque", "java/util/AbstractCollection"),
	("java/util/AbstractSet", "java/util/AbstractCollection"),
	("java/util/HashSet", "java/util/AbstractSet"),
	("java/util/LinkedHashSet", "java/util/HashSet"),
	("java/util/TreeSet", "java/util/AbstractSet"),
	("java/util/AbstractMap", OBJECT),
	("java/util/HashMap", "java/util/AbstractMap"),
	("java/util/LinkedHashMap", "java/util/HashMap"),
	("java/util/TreeMap", "java/util/AbstractMap"),
];

impl SuperClassMap {
	pub fn new() -> SuperClassMap {
		SuperClassMap::default()
	}

	/// Creates a map that already knows the common classes of the platform library.
	pub fn with_platform_classes() -> SuperClassMap {
		let mut classes = HashMap::with_capacity(PLATFORM_CLASSES.len() + 1);
		classes.insert(JavaString::from(OBJECT), None);
		for &(name, super_class) in PLATFORM_CLASSES {
			classes.insert(JavaString::from(name), Some(JavaString::from(super_class)));
		}
		SuperClassMap { classes: RwLock::new(classes) }
	}

	pub fn len(&self) -> usize {
		self.classes.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.read().is_empty()
	}
}

impl TypeHierarchy for SuperClassMap {
	fn super_class(&self, name: &JavaStr) -> Option<JavaString> {
		self.classes.read()
			.get(&name.to_owned())
			.and_then(|super_class| super_class.clone())
	}

	fn register(&self, name: &JavaStr, super_class: Option<&JavaStr>) {
		self.classes.write()
			.insert(name.to_owned(), super_class.map(JavaStr::to_owned));
	}
}

#[cfg(test)]
mod testing {
	use java_string::{JavaStr, JavaString};
	use pretty_assertions::assert_eq;
	use crate::hierarchy::{SuperClassMap, TypeHierarchy};

	fn common(hierarchy: &SuperClassMap, a: &str, b: &str) -> JavaString {
		hierarchy.common_super_class(JavaStr::from_str(a), JavaStr::from_str(b))
	}

	#[test]
	fn platform_classes() {
		let hierarchy = SuperClassMap::with_platform_classes();
		assert_eq!(common(&hierarchy, "java/lang/String", "java/lang/Integer"), JavaString::from("java/lang/Object"));
		assert_eq!(common(&hierarchy, "java/util/ArrayList", "java/util/LinkedList"), JavaString::from("java/util/AbstractList"));
		assert_eq!(common(&hierarchy, "java/lang/Integer", "java/lang/Long"), JavaString::from("java/lang/Number"));
		assert_eq!(common(&hierarchy, "java/util/Stack", "java/util/Vector"), JavaString::from("java/util/Vector"));
		assert_eq!(common(&hierarchy, "java/lang/String", "java/lang/String"), JavaString::from("java/lang/String"));
	}

	#[test]
	fn unknown_classes_give_object() {
		let hierarchy = SuperClassMap::with_platform_classes();
		assert_eq!(common(&hierarchy, "a/Unknown", "java/lang/Integer"), JavaString::from("java/lang/Object"));
		assert_eq!(common(&hierarchy, "java/lang/Integer", "a/Unknown"), JavaString::from("java/lang/Object"));

		hierarchy.register(JavaStr::from_str("a/Known"), Some(JavaStr::from_str("java/lang/Number")));
		assert_eq!(common(&hierarchy, "a/Known", "java/lang/Integer"), JavaString::from("java/lang/Number"));
	}

	#[test]
	fn cycles_terminate() {
		let hierarchy = SuperClassMap::new();
		hierarchy.register(JavaStr::from_str("a/A"), Some(JavaStr::from_str("a/B")));
		hierarchy.register(JavaStr::from_str("a/B"), Some(JavaStr::from_str("a/A")));
		assert_eq!(common(&hierarchy, "a/A", "a/C"), JavaString::from("java/lang/Object"));
		assert_eq!(hierarchy.len(), 2);
	}
}
