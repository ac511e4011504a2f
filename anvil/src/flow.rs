//! Control flow analysis of method bodies being written: the maximum stack size, and the stack map frames.

pub(crate) mod frame;
pub(crate) mod graph;
pub(crate) mod handlers;
pub(crate) mod label;
pub(crate) mod solver;
pub(crate) mod stack_map;
pub(crate) mod types;
