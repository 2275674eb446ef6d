//! # jsdeob - semi-automated JavaScript deobfuscation
//!
//! An analyst describes how a script was obfuscated (the lookup table it
//! reads, the decoder it calls, the packer that wraps it) as a short
//! *description* script, and a technique uses that description to rewrite
//! the obfuscated *target* into readable source.
//!
//! ## Quick Start
//!
//! ```
//! use jsdeob::deob::Technique;
//!
//! let output = Technique::ObjectProperty
//!     .deobfuscate("var a = {x: 1, y: 2};", "console.log(a.x + a.y);")
//!     .unwrap();
//! assert_eq!(output, "console.log(1 + 2);");
//! ```
//!
//! Techniques that run code ([`Technique::CallPattern`](deob::Technique::CallPattern)
//! and [`Technique::EvalPacker`](deob::Technique::EvalPacker)) are async and
//! evaluate it in a [`SandboxSession`](runner::sandbox::SandboxSession):
//!
//! ```
//! use jsdeob::deob::Technique;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let output = Technique::CallPattern
//!     .deobfuscate_async("d(undefined) == window.atob;", "x[d('Zm9v')];")
//!     .await
//!     .unwrap();
//! assert_eq!(output, "x['foo'];");
//! # });
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser, AST types and code generator
//! - **[`deob`]** - the techniques and the AST passes they share
//! - **[`runner`]** - tree-walking interpreter and the sandbox around it
//!   - **[`runner::ds`]** - values, objects, environments, operators
//!   - **[`runner::eval`]** - statement and expression evaluation
//!   - **[`runner::std_lib`]** - built-in objects
//! - **[`config`]** - run configuration for the `jsdeob` binary

#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod deob;
pub mod parser;
pub mod runner;
