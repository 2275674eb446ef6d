//! JSON built-in object.
//!
//! Provides JSON.parse and JSON.stringify on top of `serde_json`.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind};
use crate::runner::ds::operations::type_conversion::{to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the JSON object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let json = BuiltInObject::new("JSON")
        .with_no_prototype()
        .add_static_method("parse", json_parse)
        .add_static_method("stringify", json_stringify);

    registry.register_object(json);
}

/// JSON.parse - Parse JSON string to JavaScript value.
fn json_parse(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let text = to_string(args.first().unwrap_or(&JsValue::Undefined));
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        JErrorType::SyntaxError(format!(
            "Unexpected token in JSON at line {} column {}",
            e.line(),
            e.column()
        ))
    })?;
    Ok(from_json(value))
}

fn from_json(value: Value) -> JsValue {
    match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Boolean(b),
        Value::Number(n) => JsValue::number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => JsValue::String(s),
        Value::Array(items) => {
            JsValue::Object(JsObject::new_array(items.into_iter().map(from_json).collect()))
        }
        Value::Object(map) => {
            let object = JsObject::new_ordinary();
            {
                let mut object_ref = object.borrow_mut();
                for (key, value) in map {
                    object_ref.set_own(&key, from_json(value));
                }
            }
            JsValue::Object(object)
        }
    }
}

/// JSON.stringify - Serialise a value; `undefined` and functions yield
/// `undefined` at the top level and are skipped inside objects.
fn json_stringify(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let value = args.first().cloned().unwrap_or(JsValue::Undefined);
    let indent = match args.get(2) {
        Some(n @ JsValue::Number(_)) => " ".repeat(to_integer(n).clamp(0.0, 10.0) as usize),
        Some(JsValue::String(s)) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let mut stack = vec![];
    let json = match to_json(ctx, &value, &mut stack)? {
        Some(json) => json,
        None => return Ok(JsValue::Undefined),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        json.serialize(&mut serializer)
            .map(|_| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(JsValue::String)
        .map_err(|e| JErrorType::TypeError(e.to_string()))
}

fn to_json(
    ctx: &mut EvalContext,
    value: &JsValue,
    stack: &mut Vec<JsObjectType>,
) -> Result<Option<Value>, JErrorType> {
    Ok(Some(match value {
        JsValue::Undefined => return Ok(None),
        JsValue::Null => Value::Null,
        JsValue::Boolean(b) => Value::Bool(*b),
        JsValue::String(s) => Value::String(s.clone()),
        JsValue::Number(n) => number_to_json(n.as_f64()),
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                return Ok(None);
            }
            if stack.iter().any(|seen| std::rc::Rc::ptr_eq(seen, o)) {
                return Err(JErrorType::TypeError(
                    "Converting circular structure to JSON".to_string(),
                ));
            }
            stack.push(o.clone());
            let elements = match &o.borrow().kind {
                ObjectKind::Array(elements) => Some(elements.clone()),
                _ => None,
            };
            let json = match elements {
                Some(elements) => {
                    let mut items = Vec::with_capacity(elements.len());
                    for element in &elements {
                        items.push(to_json(ctx, element, stack)?.unwrap_or(Value::Null));
                    }
                    Value::Array(items)
                }
                None => {
                    let keys = o.borrow().own_keys();
                    let mut map = Map::new();
                    for key in keys {
                        let property = ctx.get_property(value, &key)?;
                        if let Some(json) = to_json(ctx, &property, stack)? {
                            map.insert(key, json);
                        }
                    }
                    Value::Object(map)
                }
            };
            stack.pop();
            json
        }
    }))
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        Value::Null
    } else if n.fract() == 0.0 && n.abs() < 9007199254740992.0 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(run("JSON.parse('{\"a\": [1, 2.5, null]}').a[1];"), JsValue::number(2.5));
        assert!(EvalContext::new().run_script("JSON.parse('{');").is_err());
    }

    #[test]
    fn test_stringify_keeps_key_order() {
        assert_eq!(
            run("JSON.stringify({ b: 1, a: [true, undefined, 'x'], f: function() {} });"),
            JsValue::string("{\"b\":1,\"a\":[true,null,\"x\"]}")
        );
        assert_eq!(run("JSON.stringify([1], null, 2);"), JsValue::string("[\n  1\n]"));
    }

    #[test]
    fn test_stringify_detects_cycles() {
        assert!(EvalContext::new()
            .run_script("var o = {}; o.self = o; JSON.stringify(o);")
            .is_err());
    }
}
