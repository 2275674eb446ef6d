//! Function built-in.
//!
//! Provides the `Function` constructor plus `call`, `apply` and `toString`.

use crate::parser::ast::ExpressionType;
use crate::parser::JsParser;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::create_function_object;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Function built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let function = BuiltInObject::new("Function")
        .with_constructor(function_constructor)
        .add_method("call", function_call)
        .add_method("apply", function_apply)
        .add_method("toString", function_to_string);

    registry.register_object(function);
}

/// Function constructor. The body is compiled in the global scope.
fn function_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut parts: Vec<String> = args.iter().map(to_string).collect();
    let body = parts.pop().unwrap_or_default();
    let source = format!("(function anonymous({}\n) {{\n{}\n}})", parts.join(","), body);
    let expression = JsParser::parse_expression(&source)
        .map_err(|_| JErrorType::SyntaxError("Invalid function body".to_string()))?;
    match expression {
        ExpressionType::FunctionExpression(data) => Ok(create_function_object(&data, ctx.global_env.clone())),
        _ => Err(JErrorType::SyntaxError("Invalid function body".to_string())),
    }
}

/// Function.prototype.call
fn function_call(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    ctx.call_function(&this, this_arg, args.collect())
}

/// Function.prototype.apply
fn function_apply(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    let call_args = match args.next() {
        None | Some(JsValue::Undefined) | Some(JsValue::Null) => vec![],
        Some(JsValue::Object(o)) => match &o.borrow().kind {
            ObjectKind::Array(elements) => elements.clone(),
            _ => vec![],
        },
        Some(_) => {
            return Err(JErrorType::TypeError(
                "CreateListFromArrayLike called on non-object".to_string(),
            ))
        }
    };
    ctx.call_function(&this, this_arg, call_args)
}

/// Function.prototype.toString
fn function_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match &this {
        JsValue::Object(o) if o.borrow().is_callable() => Ok(JsValue::String(to_string(&this))),
        _ => Err(JErrorType::TypeError(
            "Function.prototype.toString requires that 'this' be a Function".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_call_and_apply_set_this() {
        assert_eq!(run("function f(a) { return this.v + a; } f.call({ v: 1 }, 2);"), JsValue::number(3.0));
        assert_eq!(run("function f(a, b) { return a * b; } f.apply(null, [3, 4]);"), JsValue::number(12.0));
    }

    #[test]
    fn test_function_constructor_returns_global_this() {
        assert_eq!(run("Function('return this')() === window;"), JsValue::Boolean(true));
        assert_eq!(run("new Function('a', 'b', 'return a + b')(2, 3);"), JsValue::number(5.0));
    }

    #[test]
    fn test_to_string_regenerates_source() {
        assert_eq!(
            run("(function add(a, b) { return a + b; }).toString();"),
            JsValue::string("function add(a, b) {\n    return a + b;\n}")
        );
    }
}
