//! The built-in set every sandbox starts with.

use crate::runner::plugin::registry::BuiltInRegistry;

use super::array;
use super::console;
use super::error;
use super::function;
use super::global;
use super::json;
use super::math;
use super::number;
use super::object;
use super::regexp;
use super::string;

/// Registers every built-in a sandbox interpreter exposes.
pub fn register_core_builtins(registry: &mut BuiltInRegistry) {
    object::register(registry);
    function::register(registry);
    array::register(registry);
    string::register(registry);
    number::register(registry);
    regexp::register(registry);
    error::register(registry);
    math::register(registry);
    json::register(registry);
    console::register(registry);
    global::register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_builtins_registered() {
        let registry = BuiltInRegistry::with_core();
        for name in ["Object", "Function", "Array", "String", "Number", "Boolean", "RegExp", "Error", "TypeError", "Math", "JSON", "console", "global"] {
            assert!(registry.has_object(name), "missing built-in {}", name);
        }
        assert!(registry.get_method("TypeError", "toString").is_some());
        assert!(registry.get_method("Array", "hasOwnProperty").is_some());
    }
}
