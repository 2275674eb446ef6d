use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{array_index, JsObjectType, ObjectKind, Property};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

/// Finds a property on the object or along its prototype chain.
pub fn find_property(o: &JsObjectType, key: &str) -> Option<Property> {
    let mut current = Some(o.clone());
    while let Some(object) = current {
        if let Some(p) = object.borrow().get_own(key) {
            return Some(p);
        }
        current = object.borrow().prototype.clone();
    }
    None
}

pub fn has_own_property(o: &JsObjectType, key: &str) -> bool {
    o.borrow().has_own(key)
}

/// `[[Get]]` on any value: primitives read their built-in methods, objects
/// consult own properties, then their prototype chain, then the built-ins
/// of their class.
pub fn get(ctx: &mut EvalContext, base: &JsValue, key: &str) -> Result<JsValue, JErrorType> {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            if matches!(base, JsValue::Null) { "null" } else { "undefined" },
            key
        ))),
        JsValue::String(s) => {
            if key == "length" {
                return Ok(JsValue::number(s.encode_utf16().count() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(match s.encode_utf16().nth(index) {
                    Some(unit) => JsValue::String(String::from_utf16_lossy(&[unit])),
                    None => JsValue::Undefined,
                });
            }
            Ok(ctx.prototype_property("String", key).unwrap_or(JsValue::Undefined))
        }
        JsValue::Number(_) => Ok(ctx.prototype_property("Number", key).unwrap_or(JsValue::Undefined)),
        JsValue::Boolean(_) => Ok(ctx.prototype_property("Boolean", key).unwrap_or(JsValue::Undefined)),
        JsValue::Object(o) => match find_property(o, key) {
            Some(Property::Data(v)) => Ok(v),
            Some(Property::Accessor { getter, .. }) => match getter {
                Some(g) => ctx.call_function(&g, base.clone(), vec![]),
                None => Ok(JsValue::Undefined),
            },
            None => {
                let class = o.borrow().class_name();
                Ok(ctx.prototype_property(class, key).unwrap_or(JsValue::Undefined))
            }
        },
    }
}

/// `[[Set]]`: writes on primitives are dropped, setters run, everything else
/// becomes an own data property.
pub fn set(ctx: &mut EvalContext, base: &JsValue, key: &str, value: JsValue) -> Result<(), JErrorType> {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot set properties of {} (setting '{}')",
            if matches!(base, JsValue::Null) { "null" } else { "undefined" },
            key
        ))),
        JsValue::Object(o) => {
            if let Some(Property::Accessor { setter, .. }) = find_property(o, key) {
                if let Some(s) = setter {
                    ctx.call_function(&s, base.clone(), vec![value])?;
                }
                return Ok(());
            }
            o.borrow_mut().set_own(key, value);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Keys a `for-in` loop visits: own keys first, then inherited ones not
/// already seen.
pub fn enumerable_keys(base: &JsValue) -> Vec<String> {
    match base {
        JsValue::String(s) => (0..s.encode_utf16().count()).map(|i| i.to_string()).collect(),
        JsValue::Object(o) => {
            let mut keys: Vec<String> = vec![];
            let mut current = Some(o.clone());
            while let Some(object) = current {
                let object_ref = object.borrow();
                let is_function = matches!(object_ref.kind, ObjectKind::Function(_));
                for key in object_ref.own_keys() {
                    if is_function && key == "prototype" {
                        continue;
                    }
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                current = object_ref.prototype.clone();
            }
            keys
        }
        _ => vec![],
    }
}
