//! Reading, transforming and writing [Java class files](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html).
//!
//! A [`ClassReader`] decodes a class into visitor events, a [`ClassWriter`] turns them back into bytes. In between,
//! collaborators may change or drop whatever they like. The writer recomputes the maximum stack size and the
//! stack map frames of every method it assembles, and copies methods nobody touched as they are.

pub mod class_constants;
pub mod descriptor;
pub mod error;
pub mod hierarchy;
pub mod metadata;
pub mod pending;
pub mod pool;
pub mod tree;
pub mod visitor;

mod bytes;
mod flow;
mod jstring;
mod macros;
mod reader;
mod writer;

pub use crate::error::{completed, Abandoned, CapacityError, Failure, Visit};
pub use crate::hierarchy::{SuperClassMap, TypeHierarchy};
pub use crate::metadata::ClassMetadata;
pub use crate::pending::{PendingClasses, PendingSession};
pub use crate::reader::ClassReader;
pub use crate::visitor::{ClassVisitor, FieldVisitor, MethodVisitor, ReadOptions, SourceId};
pub use crate::writer::{ClassWriter, FieldWriter, FrameComputation, MethodWriter};
