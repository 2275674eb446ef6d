//! Object built-in.
//!
//! Provides Object constructor and prototype methods. `Object` is the root
//! every other built-in inherits its prototype methods from.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::operations::object::has_own_property;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Object built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let object = BuiltInObject::new("Object")
        .with_no_prototype()
        .with_constructor(object_constructor)
        .add_static_method("keys", object_keys)
        .add_static_method("create", object_create)
        .add_method("toString", object_to_string)
        .add_method("valueOf", object_value_of)
        .add_method("hasOwnProperty", object_has_own_property);

    registry.register_object(object);
}

/// Object constructor.
fn object_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match args.into_iter().next() {
        None | Some(JsValue::Null) | Some(JsValue::Undefined) => {
            Ok(JsValue::Object(JsObject::new_ordinary()))
        }
        // Primitives are not boxed; their methods resolve by type anyway.
        Some(v) => Ok(v),
    }
}

/// Object.keys
fn object_keys(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let keys: Vec<JsValue> = match args.first() {
        Some(JsValue::Object(o)) => o.borrow().own_keys().into_iter().map(JsValue::String).collect(),
        Some(JsValue::String(s)) => (0..s.encode_utf16().count())
            .map(|i| JsValue::String(i.to_string()))
            .collect(),
        None | Some(JsValue::Undefined) | Some(JsValue::Null) => {
            return Err(JErrorType::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            ))
        }
        Some(_) => vec![],
    };
    Ok(JsValue::Object(JsObject::new_array(keys)))
}

/// Object.create
fn object_create(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let object = JsObject::new_ordinary();
    match args.first() {
        Some(JsValue::Object(prototype)) => object.borrow_mut().prototype = Some(prototype.clone()),
        Some(JsValue::Null) => {}
        other => {
            return Err(JErrorType::TypeError(format!(
                "Object prototype may only be an Object or null: {}",
                to_string(other.unwrap_or(&JsValue::Undefined))
            )))
        }
    }
    Ok(JsValue::Object(object))
}

/// Object.prototype.toString
fn object_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let tag = match &this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Object(o) => o.borrow().class_name(),
    };
    Ok(JsValue::String(format!("[object {}]", tag)))
}

/// Object.prototype.valueOf
fn object_value_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(this)
}

/// Object.prototype.hasOwnProperty
fn object_has_own_property(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let key = to_string(args.first().unwrap_or(&JsValue::Undefined));
    Ok(JsValue::Boolean(match &this {
        JsValue::Object(o) => has_own_property(o, &key),
        JsValue::String(s) => {
            key == "length"
                || crate::runner::ds::object::array_index(&key)
                    .map(|i| i < s.encode_utf16().count())
                    .unwrap_or(false)
        }
        _ => false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_keys_and_own_properties() {
        assert_eq!(run("Object.keys({ b: 1, a: 2 }).join();"), JsValue::string("b,a"));
        assert_eq!(run("({ a: 1 }).hasOwnProperty('a');"), JsValue::Boolean(true));
        assert_eq!(run("({ a: 1 }).hasOwnProperty('toString');"), JsValue::Boolean(false));
    }

    #[test]
    fn test_to_string_tags() {
        assert_eq!(run("Object.prototype.toString.call([]);"), JsValue::string("[object Array]"));
        assert_eq!(run("({}).toString();"), JsValue::string("[object Object]"));
    }

    #[test]
    fn test_create_links_prototype() {
        assert_eq!(run("var p = { x: 1 }; Object.create(p).x;"), JsValue::number(1.0));
    }
}
