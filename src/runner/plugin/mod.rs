//! Built-in object plumbing.
//!
//! Built-ins are described once in a [`BuiltInRegistry`](registry::BuiltInRegistry)
//! and materialised per interpreter instance by
//! [`EvalContext`](types::EvalContext). Method lookups on values go through the
//! registry by class name, so primitives such as strings and numbers reach
//! their methods without wrapper objects.

pub mod registry;
pub mod types;
