mod api;
pub mod ast;
pub mod codegen;
#[allow(non_fmt_panics)]
#[cfg(test)]
mod unit_tests;

pub use api::{unescape_string_literal, JsParser, ParseError, Rule};
