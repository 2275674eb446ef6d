use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObjectType, Property};
use crate::runner::ds::operations::object::find_property;
use crate::runner::ds::value::JsValue;

pub type EnvRef = Rc<RefCell<EnvironmentRecord>>;

pub enum EnvironmentRecordType {
    Declarative,
    /// Backs a `with` statement: names resolve against the object first.
    Object(JsObjectType),
    /// `var` and function bindings live on the global object; `let` and
    /// `const` in the record's own table.
    Global(JsObjectType),
}

pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
}

pub struct EnvironmentRecord {
    pub record_type: EnvironmentRecordType,
    bindings: HashMap<String, Binding>,
    pub outer: Option<EnvRef>,
}

impl EnvironmentRecord {
    pub fn new_declarative(outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(EnvironmentRecord {
            record_type: EnvironmentRecordType::Declarative,
            bindings: HashMap::new(),
            outer,
        }))
    }

    pub fn new_object(object: JsObjectType, outer: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(EnvironmentRecord {
            record_type: EnvironmentRecordType::Object(object),
            bindings: HashMap::new(),
            outer,
        }))
    }

    pub fn new_global(global_object: JsObjectType) -> EnvRef {
        Rc::new(RefCell::new(EnvironmentRecord {
            record_type: EnvironmentRecordType::Global(global_object),
            bindings: HashMap::new(),
            outer: None,
        }))
    }

    pub fn has_binding(&self, name: &str) -> bool {
        if self.bindings.contains_key(name) {
            return true;
        }
        match &self.record_type {
            EnvironmentRecordType::Declarative => false,
            EnvironmentRecordType::Object(o) | EnvironmentRecordType::Global(o) => {
                find_property(o, name).is_some()
            }
        }
    }

    /// Creates (or re-initialises) a binding in this record.
    pub fn create_binding(&mut self, name: &str, value: JsValue, mutable: bool) {
        self.bindings.insert(name.to_string(), Binding { value, mutable });
    }

    /// Creates a `var`-style binding: on the global object for the global
    /// record, in the table otherwise. An existing binding keeps its value.
    pub fn create_var_binding(&mut self, name: &str) {
        match &self.record_type {
            EnvironmentRecordType::Global(o) => {
                let exists = o.borrow().has_own(name);
                if !exists {
                    o.borrow_mut().set_own(name, JsValue::Undefined);
                }
            }
            _ => {
                if !self.bindings.contains_key(name) {
                    self.create_binding(name, JsValue::Undefined, true);
                }
            }
        }
    }

    /// Sets a `var`-style binding created by [`create_var_binding`].
    pub fn initialize_var_binding(&mut self, name: &str, value: JsValue) {
        match &self.record_type {
            EnvironmentRecordType::Global(o) if !self.bindings.contains_key(name) => {
                o.borrow_mut().set_own(name, value)
            }
            _ => self.create_binding(name, value, true),
        }
    }

    fn get_local(&self, name: &str) -> Option<JsValue> {
        if let Some(binding) = self.bindings.get(name) {
            return Some(binding.value.clone());
        }
        match &self.record_type {
            EnvironmentRecordType::Declarative => None,
            EnvironmentRecordType::Object(o) | EnvironmentRecordType::Global(o) => {
                match find_property(o, name) {
                    Some(Property::Data(v)) => Some(v),
                    Some(Property::Accessor { .. }) => Some(JsValue::Undefined),
                    None => None,
                }
            }
        }
    }

    fn set_local(&mut self, name: &str, value: JsValue) -> Result<bool, JErrorType> {
        if let Some(binding) = self.bindings.get_mut(name) {
            if !binding.mutable {
                return Err(JErrorType::TypeError("Assignment to constant variable".to_string()));
            }
            binding.value = value;
            return Ok(true);
        }
        match &self.record_type {
            EnvironmentRecordType::Declarative => Ok(false),
            EnvironmentRecordType::Object(o) | EnvironmentRecordType::Global(o) => {
                if find_property(o, name).is_some() {
                    o.borrow_mut().set_own(name, value);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

/// Looks a name up along the scope chain starting at `env`.
pub fn get_binding_value(env: &EnvRef, name: &str) -> Option<JsValue> {
    let mut current = Some(env.clone());
    while let Some(record) = current {
        if let Some(v) = record.borrow().get_local(name) {
            return Some(v);
        }
        current = record.borrow().outer.clone();
    }
    None
}

/// Assigns to the innermost binding of `name`. Returns `Ok(false)` when no
/// scope declares it.
pub fn set_binding_value(env: &EnvRef, name: &str, value: JsValue) -> Result<bool, JErrorType> {
    let mut current = Some(env.clone());
    while let Some(record) = current {
        if record.borrow_mut().set_local(name, value.clone())? {
            return Ok(true);
        }
        current = record.borrow().outer.clone();
    }
    Ok(false)
}

pub fn has_binding(env: &EnvRef, name: &str) -> bool {
    let mut current = Some(env.clone());
    while let Some(record) = current {
        if record.borrow().has_binding(name) {
            return true;
        }
        current = record.borrow().outer.clone();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::JsObject;

    #[test]
    fn test_inner_binding_shadows_outer() {
        let outer = EnvironmentRecord::new_declarative(None);
        outer.borrow_mut().create_binding("x", JsValue::number(1.0), true);
        let inner = EnvironmentRecord::new_declarative(Some(outer.clone()));
        inner.borrow_mut().create_binding("x", JsValue::number(2.0), true);
        assert_eq!(get_binding_value(&inner, "x"), Some(JsValue::number(2.0)));
        assert_eq!(get_binding_value(&outer, "x"), Some(JsValue::number(1.0)));
    }

    #[test]
    fn test_const_binding_rejects_assignment() {
        let env = EnvironmentRecord::new_declarative(None);
        env.borrow_mut().create_binding("c", JsValue::Null, false);
        assert!(set_binding_value(&env, "c", JsValue::Undefined).is_err());
    }

    #[test]
    fn test_global_vars_live_on_global_object() {
        let global = JsObject::new_ordinary();
        let env = EnvironmentRecord::new_global(global.clone());
        env.borrow_mut().create_var_binding("v");
        assert!(set_binding_value(&env, "v", JsValue::Boolean(true)).unwrap());
        assert!(global.borrow().has_own("v"));
        assert!(!set_binding_value(&env, "missing", JsValue::Null).unwrap());
    }
}
