//! Deobfuscation techniques and the AST machinery they share.
//!
//! Every technique takes a *description* (a short script naming the
//! obfuscator's lookup table, decoder or packer) and a *target* script, and
//! produces the rewritten target as source text. Synchronous techniques work
//! purely on the AST; [`call_pattern`] and [`evalpacker`] evaluate code in a
//! [`SandboxSession`](crate::runner::sandbox::SandboxSession) and so need a
//! tokio runtime.
//!
//! - [`visit`] - ordered walk and rewrite of the AST with identifier slots
//! - [`reducer`] - constant folding of literal expressions
//! - [`normalize`] - merging of adjacent string literals in `+` chains
//! - [`scope`] - lexical scope analysis
//! - [`substitution`] - object, array and string-variable lookup tables
//! - [`inline`] - inlining of single-assignment literal variables
//! - [`call_pattern`] - decoder calls replaced by their sandboxed results
//! - [`evalpacker`] - `eval(...)` packer unwrapping

pub mod call_pattern;
pub mod error;
pub mod evalpacker;
pub mod inline;
pub mod normalize;
pub mod reducer;
pub mod scope;
pub mod substitution;
pub mod technique;
pub mod visit;

pub use error::DeobError;
pub use technique::{beautify, Technique, TechniqueOptions};
