//! Error built-in objects.
//!
//! Provides Error and the native error constructors that inherit from it.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

/// Register all error types with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let error = BuiltInObject::new("Error")
        .with_constructor(error_constructor)
        .add_method("toString", error_to_string);
    registry.register_object(error);

    let native_errors: [(&str, NativeFn); 6] = [
        ("TypeError", type_error_constructor),
        ("RangeError", range_error_constructor),
        ("SyntaxError", syntax_error_constructor),
        ("ReferenceError", reference_error_constructor),
        ("URIError", uri_error_constructor),
        ("EvalError", eval_error_constructor),
    ];
    for (name, constructor) in native_errors {
        registry.register_object(
            BuiltInObject::new(name)
                .with_prototype("Error")
                .with_constructor(constructor),
        );
    }
}

fn create_error(ctx: &EvalContext, name: &str, args: &[JsValue]) -> JsValue {
    let message = match args.first() {
        None | Some(JsValue::Undefined) => String::new(),
        Some(m) => to_string(m),
    };
    let object = JsObject::new_error(name, &message);
    object.borrow_mut().prototype = ctx.prototype_of(name);
    JsValue::Object(object)
}

fn error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "Error", &args))
}

fn type_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "TypeError", &args))
}

fn range_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "RangeError", &args))
}

fn syntax_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "SyntaxError", &args))
}

fn reference_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "ReferenceError", &args))
}

fn uri_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "URIError", &args))
}

fn eval_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(create_error(ctx, "EvalError", &args))
}

/// Error.prototype.toString
fn error_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if this.as_object().is_none() {
        return Err(JErrorType::TypeError(
            "Error.prototype.toString called on non-object".to_string(),
        ));
    }
    let name = match ctx.get_property(&this, "name")? {
        JsValue::Undefined => "Error".to_string(),
        n => to_string(&n),
    };
    let message = match ctx.get_property(&this, "message")? {
        JsValue::Undefined => String::new(),
        m => to_string(&m),
    };
    Ok(JsValue::String(if name.is_empty() {
        message
    } else if message.is_empty() {
        name
    } else {
        format!("{}: {}", name, message)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_error_to_string() {
        assert_eq!(run("new TypeError('bad').toString();"), JsValue::string("TypeError: bad"));
        assert_eq!(run("String(new Error());"), JsValue::string("Error"));
    }

    #[test]
    fn test_caught_engine_error_inherits_prototype() {
        assert_eq!(
            run("var s; try { null.x; } catch (e) { s = e.toString(); } s;"),
            JsValue::string("TypeError: Cannot read properties of null (reading 'x')")
        );
        assert_eq!(
            run("var r; try { undefinedName; } catch (e) { r = e instanceof ReferenceError && e instanceof Error; } r;"),
            JsValue::Boolean(true)
        );
    }
}
