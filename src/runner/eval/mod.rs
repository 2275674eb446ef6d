//! Evaluation module for executing JavaScript AST.
//!
//! A tree-walking interpreter over the parser's AST. It backs the sandbox
//! sessions; the static passes never run script code.

pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

pub use types::{Completion, CompletionType, EvalResult, ValueResult};
