//! Array built-in.
//!
//! Provides Array constructor and prototype methods.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind};
use crate::runner::ds::operations::test_and_comparison::strict_equality;
use crate::runner::ds::operations::type_conversion::{to_boolean, to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Array built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let array = BuiltInObject::new("Array")
        .with_constructor(array_constructor)
        .add_static_method("isArray", is_array)
        .add_method("push", array_push)
        .add_method("pop", array_pop)
        .add_method("shift", array_shift)
        .add_method("unshift", array_unshift)
        .add_method("slice", array_slice)
        .add_method("splice", array_splice)
        .add_method("indexOf", array_index_of)
        .add_method("forEach", array_for_each)
        .add_method("map", array_map)
        .add_method("filter", array_filter)
        .add_method("reduce", array_reduce)
        .add_method("join", array_join)
        .add_method("concat", array_concat)
        .add_method("reverse", array_reverse)
        .add_method("toString", array_to_string);

    registry.register_object(array);
}

fn this_array(this: &JsValue, method: &str) -> Result<JsObjectType, JErrorType> {
    match this {
        JsValue::Object(o) if o.borrow().is_array() => Ok(o.clone()),
        _ => Err(JErrorType::TypeError(format!(
            "Array.prototype.{} called on a non-array",
            method
        ))),
    }
}

/// Snapshot of the elements, so callbacks may mutate the array freely.
fn elements_of(array: &JsObjectType) -> Vec<JsValue> {
    match &array.borrow().kind {
        ObjectKind::Array(elements) => elements.clone(),
        _ => vec![],
    }
}

fn with_elements<R>(array: &JsObjectType, f: impl FnOnce(&mut Vec<JsValue>) -> R) -> Option<R> {
    match &mut array.borrow_mut().kind {
        ObjectKind::Array(elements) => Some(f(elements)),
        _ => None,
    }
}

fn relative_index(value: Option<&JsValue>, len: usize, default: usize) -> usize {
    match value {
        None | Some(JsValue::Undefined) => default,
        Some(v) => {
            let n = to_integer(v);
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                n.min(len as f64) as usize
            }
        }
    }
}

fn callback(args: &[JsValue], method: &str) -> Result<JsValue, JErrorType> {
    match args.first() {
        Some(JsValue::Object(o)) if o.borrow().is_callable() => Ok(JsValue::Object(o.clone())),
        Some(other) => Err(JErrorType::TypeError(format!("{} is not a function", to_string(other)))),
        None => Err(JErrorType::TypeError(format!(
            "undefined is not a function (Array.prototype.{})",
            method
        ))),
    }
}

/// Array constructor.
fn array_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if let [JsValue::Number(n)] = args.as_slice() {
        let len = n.as_f64();
        if len < 0.0 || len.fract() != 0.0 || len > u32::MAX as f64 {
            return Err(JErrorType::RangeError("Invalid array length".to_string()));
        }
        return Ok(JsValue::Object(JsObject::new_array(vec![JsValue::Undefined; len as usize])));
    }
    Ok(JsValue::Object(JsObject::new_array(args)))
}

/// Array.isArray
fn is_array(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(
        matches!(args.first(), Some(JsValue::Object(o)) if o.borrow().is_array()),
    ))
}

/// Array.prototype.push
fn array_push(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "push")?;
    let len = with_elements(&array, |elements| {
        elements.extend(args);
        elements.len()
    })
    .unwrap_or(0);
    Ok(JsValue::number(len as f64))
}

/// Array.prototype.pop
fn array_pop(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "pop")?;
    Ok(with_elements(&array, |elements| elements.pop())
        .flatten()
        .unwrap_or(JsValue::Undefined))
}

/// Array.prototype.shift
fn array_shift(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "shift")?;
    Ok(with_elements(&array, |elements| {
        if elements.is_empty() {
            None
        } else {
            Some(elements.remove(0))
        }
    })
    .flatten()
    .unwrap_or(JsValue::Undefined))
}

/// Array.prototype.unshift
fn array_unshift(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "unshift")?;
    let len = with_elements(&array, |elements| {
        elements.splice(0..0, args);
        elements.len()
    })
    .unwrap_or(0);
    Ok(JsValue::number(len as f64))
}

/// Array.prototype.slice
fn array_slice(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "slice")?);
    let start = relative_index(args.first(), elements.len(), 0);
    let end = relative_index(args.get(1), elements.len(), elements.len());
    let sliced = if start < end {
        elements[start..end].to_vec()
    } else {
        vec![]
    };
    Ok(JsValue::Object(JsObject::new_array(sliced)))
}

/// Array.prototype.splice
fn array_splice(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "splice")?;
    let len = elements_of(&array).len();
    let start = relative_index(args.first(), len, 0);
    let delete_count = match args.get(1) {
        None => len - start,
        Some(v) => (to_integer(v).max(0.0) as usize).min(len - start),
    };
    let inserted: Vec<JsValue> = args.into_iter().skip(2).collect();
    let removed = with_elements(&array, |elements| {
        elements
            .splice(start..start + delete_count, inserted)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default();
    Ok(JsValue::Object(JsObject::new_array(removed)))
}

/// Array.prototype.indexOf
fn array_index_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "indexOf")?);
    let needle = args.first().cloned().unwrap_or(JsValue::Undefined);
    let from = relative_index(args.get(1), elements.len(), 0);
    let found = elements
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, e)| strict_equality(e, &needle))
        .map(|(i, _)| i as f64)
        .unwrap_or(-1.0);
    Ok(JsValue::number(found))
}

/// Array.prototype.forEach
fn array_for_each(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "forEach")?);
    let f = callback(&args, "forEach")?;
    let this_arg = args.get(1).cloned().unwrap_or(JsValue::Undefined);
    for (i, e) in elements.into_iter().enumerate() {
        ctx.call_function(&f, this_arg.clone(), vec![e, JsValue::number(i as f64), this.clone()])?;
    }
    Ok(JsValue::Undefined)
}

/// Array.prototype.map
fn array_map(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "map")?);
    let f = callback(&args, "map")?;
    let this_arg = args.get(1).cloned().unwrap_or(JsValue::Undefined);
    let mut mapped = Vec::with_capacity(elements.len());
    for (i, e) in elements.into_iter().enumerate() {
        mapped.push(ctx.call_function(&f, this_arg.clone(), vec![e, JsValue::number(i as f64), this.clone()])?);
    }
    Ok(JsValue::Object(JsObject::new_array(mapped)))
}

/// Array.prototype.filter
fn array_filter(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "filter")?);
    let f = callback(&args, "filter")?;
    let this_arg = args.get(1).cloned().unwrap_or(JsValue::Undefined);
    let mut kept = vec![];
    for (i, e) in elements.into_iter().enumerate() {
        let keep = ctx.call_function(&f, this_arg.clone(), vec![e.clone(), JsValue::number(i as f64), this.clone()])?;
        if to_boolean(&keep) {
            kept.push(e);
        }
    }
    Ok(JsValue::Object(JsObject::new_array(kept)))
}

/// Array.prototype.reduce
fn array_reduce(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "reduce")?);
    let f = callback(&args, "reduce")?;
    let mut items = elements.into_iter().enumerate();
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(JErrorType::TypeError(
                    "Reduce of empty array with no initial value".to_string(),
                ))
            }
        },
    };
    for (i, e) in items {
        accumulator = ctx.call_function(
            &f,
            JsValue::Undefined,
            vec![accumulator, e, JsValue::number(i as f64), this.clone()],
        )?;
    }
    Ok(accumulator)
}

/// Array.prototype.join
fn array_join(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let elements = elements_of(&this_array(&this, "join")?);
    let separator = match args.first() {
        None | Some(JsValue::Undefined) => ",".to_string(),
        Some(v) => to_string(v),
    };
    let parts: Vec<String> = elements
        .iter()
        .map(|e| match e {
            JsValue::Undefined | JsValue::Null => String::new(),
            _ => to_string(e),
        })
        .collect();
    Ok(JsValue::String(parts.join(&separator)))
}

/// Array.prototype.concat
fn array_concat(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut result = elements_of(&this_array(&this, "concat")?);
    for a in args {
        match &a {
            JsValue::Object(o) if o.borrow().is_array() => result.extend(elements_of(o)),
            _ => result.push(a),
        }
    }
    Ok(JsValue::Object(JsObject::new_array(result)))
}

/// Array.prototype.reverse
fn array_reverse(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "reverse")?;
    with_elements(&array, |elements| elements.reverse());
    Ok(this)
}

/// Array.prototype.toString
fn array_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    this_array(&this, "toString")?;
    Ok(JsValue::String(to_string(&this)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_stack_and_queue_operations() {
        assert_eq!(run("var a = [1, 2]; a.push(3, 4); a.join('');"), JsValue::string("1234"));
        assert_eq!(run("var a = [1, 2, 3]; a.pop() + a.shift();"), JsValue::number(4.0));
        assert_eq!(run("var a = [3]; a.unshift(1, 2); a.join();"), JsValue::string("1,2,3"));
    }

    #[test]
    fn test_rotation_idiom() {
        // The rotation loop string-array obfuscators emit.
        let code = "var a = ['c', 'a', 'b']; (function (arr, n) { while (--n) { arr.push(arr.shift()); } })(a, 2); a.join('');";
        assert_eq!(run(code), JsValue::string("abc"));
    }

    #[test]
    fn test_splice_and_slice() {
        assert_eq!(run("var a = [1, 2, 3, 4]; var r = a.splice(1, 2, 'x'); a.join() + '|' + r.join();"), JsValue::string("1,x,4|2,3"));
        assert_eq!(run("[1, 2, 3].slice(-2).join();"), JsValue::string("2,3"));
        assert_eq!(run("[1, 2, 3].reverse().join('');"), JsValue::string("321"));
    }

    #[test]
    fn test_higher_order_methods() {
        assert_eq!(run("[1, 2, 3].map(function (x) { return x * 2; }).join();"), JsValue::string("2,4,6"));
        assert_eq!(run("[1, 2, 3, 4].filter(function (x) { return x % 2; }).join();"), JsValue::string("1,3"));
        assert_eq!(run("[1, 2, 3].reduce(function (a, b) { return a + b; });"), JsValue::number(6.0));
        assert_eq!(run("[1, [2, 3]].concat([4], 5).length;"), JsValue::number(4.0));
    }

    #[test]
    fn test_constructor() {
        assert_eq!(run("new Array(3).length;"), JsValue::number(3.0));
        assert_eq!(run("Array(1, 2).join();"), JsValue::string("1,2"));
        assert_eq!(run("Array.isArray([]);"), JsValue::Boolean(true));
    }
}
