//! Name-indexed table of built-in descriptions, shared by every sandbox
//! interpreter created from it.

use std::collections::HashMap;

use super::types::{BuiltInObject, NativeFn};
use crate::runner::std_lib::register_core_builtins;

/// Maps each built-in name to its constructor, static members and the
/// instance methods its values inherit.
pub struct BuiltInRegistry {
    objects: HashMap<String, BuiltInObject>,
}

impl BuiltInRegistry {
    pub fn new() -> Self {
        BuiltInRegistry {
            objects: HashMap::new(),
        }
    }

    /// Everything a decoder script can reach: language built-ins plus the
    /// browser globals (`atob`, `escape`, `console`).
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        register_core_builtins(&mut registry);
        registry
    }

    /// Registers `obj`, replacing any earlier built-in of the same name.
    pub fn register_object(&mut self, obj: BuiltInObject) {
        self.objects.insert(obj.name.clone(), obj);
    }

    pub fn get_object(&self, name: &str) -> Option<&BuiltInObject> {
        self.objects.get(name)
    }

    /// Instance method of `object`, searched along its prototype names.
    pub fn get_method(&self, object: &str, method: &str) -> Option<NativeFn> {
        let mut current = Some(object);
        while let Some(name) = current {
            let obj = self.objects.get(name)?;
            if let Some(f) = obj.methods.get(method) {
                return Some(*f);
            }
            current = obj.prototype.as_deref();
        }
        None
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn has_method(&self, object: &str, method: &str) -> bool {
        self.get_method(object, method).is_some()
    }

    /// Sorted, so globals install in a stable order.
    pub fn object_names(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.objects.keys().collect();
        names.sort();
        names
    }
}

impl Default for BuiltInRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}
