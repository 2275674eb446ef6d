use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::parser::ast::FunctionData;
use crate::runner::ds::env_record::EnvRef;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::NativeFn;

pub type JsObjectType = Rc<RefCell<JsObject>>;

pub enum ObjectKind {
    Ordinary,
    /// Dense element storage; holes read back as `undefined`.
    Array(Vec<JsValue>),
    Function(FunctionKind),
    RegExp(RegExpData),
    Error,
}

pub enum FunctionKind {
    Script {
        data: Rc<FunctionData>,
        scope: EnvRef,
    },
    Native {
        name: String,
        func: NativeFn,
    },
}

pub struct RegExpData {
    pub source: String,
    pub flags: String,
    pub matcher: Regex,
}

impl RegExpData {
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn is_sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

#[derive(Clone)]
pub enum Property {
    Data(JsValue),
    Accessor {
        getter: Option<JsValue>,
        setter: Option<JsValue>,
    },
}

/// Named properties in insertion order.
#[derive(Default)]
pub struct PropertyMap {
    values: HashMap<String, Property>,
    order: Vec<String>,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: String, property: Property) {
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.insert(key, property);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if self.values.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct JsObject {
    pub kind: ObjectKind,
    pub properties: PropertyMap,
    pub prototype: Option<JsObjectType>,
}

impl JsObject {
    pub fn new(kind: ObjectKind) -> Self {
        JsObject {
            kind,
            properties: PropertyMap::default(),
            prototype: None,
        }
    }

    pub fn new_ordinary() -> JsObjectType {
        Rc::new(RefCell::new(JsObject::new(ObjectKind::Ordinary)))
    }

    pub fn new_array(elements: Vec<JsValue>) -> JsObjectType {
        Rc::new(RefCell::new(JsObject::new(ObjectKind::Array(elements))))
    }

    pub fn new_function(kind: FunctionKind) -> JsObjectType {
        Rc::new(RefCell::new(JsObject::new(ObjectKind::Function(kind))))
    }

    pub fn new_native_function(name: impl Into<String>, func: NativeFn) -> JsObjectType {
        JsObject::new_function(FunctionKind::Native {
            name: name.into(),
            func,
        })
    }

    pub fn new_error(name: &str, message: &str) -> JsObjectType {
        let mut object = JsObject::new(ObjectKind::Error);
        object.set_own("name", JsValue::string(name));
        object.set_own("message", JsValue::string(message));
        Rc::new(RefCell::new(object))
    }

    /// Built-in class this object belongs to, as `Object.prototype.toString`
    /// reports it.
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Error => "Error",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    /// Own property lookup, including array elements and `length`.
    pub fn get_own(&self, key: &str) -> Option<Property> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return Some(Property::Data(JsValue::number(elements.len() as f64)));
            }
            if let Some(index) = array_index(key) {
                return elements.get(index).map(|v| Property::Data(v.clone()));
            }
        }
        if let ObjectKind::Function(FunctionKind::Script { data, .. }) = &self.kind {
            if key == "length" && !self.properties.contains(key) {
                return Some(Property::Data(JsValue::number(data.params.len() as f64)));
            }
            if key == "name" && !self.properties.contains(key) {
                let name = data.id.as_ref().map(|id| id.name.clone()).unwrap_or_default();
                return Some(Property::Data(JsValue::String(name)));
            }
        }
        if let ObjectKind::Function(FunctionKind::Native { name, .. }) = &self.kind {
            if key == "name" && !self.properties.contains(key) {
                return Some(Property::Data(JsValue::string(name.as_str())));
            }
        }
        if let ObjectKind::RegExp(re) = &self.kind {
            match key {
                "source" => return Some(Property::Data(JsValue::string(re.source.as_str()))),
                "flags" => return Some(Property::Data(JsValue::string(re.flags.as_str()))),
                "global" => return Some(Property::Data(JsValue::Boolean(re.is_global()))),
                "ignoreCase" => return Some(Property::Data(JsValue::Boolean(re.flags.contains('i')))),
                "multiline" => return Some(Property::Data(JsValue::Boolean(re.flags.contains('m')))),
                _ => {}
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.get_own(key).is_some()
    }

    /// Stores a data property. Array elements and `length` write through to
    /// the element storage.
    pub fn set_own(&mut self, key: &str, value: JsValue) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if key == "length" {
                let new_len = match &value {
                    JsValue::Number(n) if n.as_f64() >= 0.0 => n.as_f64() as usize,
                    _ => elements.len(),
                };
                elements.resize(new_len, JsValue::Undefined);
                return;
            }
            if let Some(index) = array_index(key) {
                if index >= elements.len() {
                    elements.resize(index + 1, JsValue::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        self.properties.insert(key.to_string(), Property::Data(value));
    }

    pub fn define_accessor(&mut self, key: &str, getter: Option<JsValue>, setter: Option<JsValue>) {
        let (old_getter, old_setter) = match self.properties.get(key) {
            Some(Property::Accessor { getter, setter }) => (getter.clone(), setter.clone()),
            _ => (None, None),
        };
        self.properties.insert(
            key.to_string(),
            Property::Accessor {
                getter: getter.or(old_getter),
                setter: setter.or(old_setter),
            },
        );
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = array_index(key) {
                if index < elements.len() {
                    elements[index] = JsValue::Undefined;
                }
                return true;
            }
        }
        self.properties.remove(key);
        true
    }

    /// Enumerable own keys: element indices first, then named properties in
    /// insertion order.
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = vec![];
        if let ObjectKind::Array(elements) = &self.kind {
            keys.extend((0..elements.len()).map(|i| i.to_string()));
        }
        keys.extend(self.properties.keys().cloned());
        keys
    }
}

/// Parses a canonical array index such as `"3"` (but not `"03"` or `"-1"`).
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i != u32::MAX).map(|i| i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("012"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
    }

    #[test]
    fn test_array_length_writes_through() {
        let array = JsObject::new_array(vec![JsValue::number(1.0), JsValue::number(2.0)]);
        array.borrow_mut().set_own("length", JsValue::number(1.0));
        assert_eq!(array.borrow().own_keys(), vec!["0".to_string()]);
        array.borrow_mut().set_own("3", JsValue::Null);
        assert!(matches!(
            array.borrow().get_own("length"),
            Some(Property::Data(JsValue::Number(n))) if n.as_f64() == 4.0
        ));
    }

    #[test]
    fn test_named_properties_keep_insertion_order() {
        let object = JsObject::new_ordinary();
        object.borrow_mut().set_own("b", JsValue::Null);
        object.borrow_mut().set_own("a", JsValue::Null);
        object.borrow_mut().set_own("b", JsValue::Undefined);
        assert_eq!(object.borrow().own_keys(), vec!["b".to_string(), "a".to_string()]);
    }
}
