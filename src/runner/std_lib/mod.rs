//! Standard library built-in objects.
//!
//! This module contains the built-ins obfuscated decoders reach for:
//! Object, Function, Array, String, Number, Boolean, RegExp, Math, JSON,
//! the Error family, console and the global functions.

pub mod core;
pub mod array;
pub mod console;
pub mod error;
pub mod function;
pub mod global;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod string;

pub use core::register_core_builtins;
