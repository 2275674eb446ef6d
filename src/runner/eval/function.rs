//! Function objects, calls and `new`.

use std::rc::Rc;

use crate::parser::ast::FunctionData;
use crate::runner::ds::env_record::{EnvRef, EnvironmentRecord};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{FunctionKind, JsObject, ObjectKind, Property};
use crate::runner::ds::operations::object::find_property;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::{EvalContext, NativeFn};

use super::statement::run_function_body;
use super::types::{CompletionType, ValueResult};

enum Callee {
    Native(NativeFn),
    Script(Rc<FunctionData>, EnvRef),
}

fn resolve_callee(func: &JsValue) -> Result<Callee, JErrorType> {
    if let JsValue::Object(o) = func {
        match &o.borrow().kind {
            ObjectKind::Function(FunctionKind::Native { func, .. }) => return Ok(Callee::Native(*func)),
            ObjectKind::Function(FunctionKind::Script { data, scope }) => {
                return Ok(Callee::Script(data.clone(), scope.clone()))
            }
            _ => {}
        }
    }
    Err(JErrorType::TypeError(format!("{} is not a function", to_string(func))))
}

/// Creates a closure over `scope`. Every script function gets a fresh
/// `prototype` object for use with `new`.
pub fn create_function_object(data: &FunctionData, scope: EnvRef) -> JsValue {
    let function = JsObject::new_function(FunctionKind::Script {
        data: Rc::new(data.clone()),
        scope,
    });
    function
        .borrow_mut()
        .set_own("prototype", JsValue::Object(JsObject::new_ordinary()));
    JsValue::Object(function)
}

/// Creates the value of a function expression. A named expression sees its
/// own name through an extra scope between it and `scope`.
pub fn create_function_expression(data: &FunctionData, scope: EnvRef) -> JsValue {
    match &data.id {
        Some(id) => {
            let env = EnvironmentRecord::new_declarative(Some(scope));
            let function = create_function_object(data, env.clone());
            env.borrow_mut().create_binding(&id.name, function.clone(), true);
            function
        }
        None => create_function_object(data, scope),
    }
}

/// `[[Call]]`.
pub fn call_function(ctx: &mut EvalContext, func: &JsValue, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let callee = resolve_callee(func)?;
    if ctx.call_depth >= ctx.max_call_depth {
        return Err(JErrorType::RangeError("Maximum call stack size exceeded".to_string()));
    }
    ctx.call_depth += 1;
    let result = match callee {
        Callee::Native(f) => f(ctx, this, args),
        Callee::Script(data, scope) => call_script_function(ctx, &data, scope, this, args),
    };
    ctx.call_depth -= 1;
    result
}

fn call_script_function(
    ctx: &mut EvalContext,
    data: &FunctionData,
    scope: EnvRef,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let this_value = if this.is_nullish() {
        JsValue::Object(ctx.global_object.clone())
    } else {
        this
    };
    let env = EnvironmentRecord::new_declarative(Some(scope));
    {
        let mut record = env.borrow_mut();
        for (i, param) in data.params.iter().enumerate() {
            record.create_binding(&param.name, args.get(i).cloned().unwrap_or(JsValue::Undefined), true);
        }
        if !data.params.iter().any(|p| p.name == "arguments") {
            record.create_binding("arguments", JsValue::Object(JsObject::new_array(args)), true);
        }
    }
    let saved = ctx.enter_scope(env.clone(), env, this_value);
    let result = run_function_body(&data.body.body, ctx);
    ctx.restore_scope(saved);
    let completion = result?;
    Ok(if completion.completion_type == CompletionType::Return {
        completion.get_value()
    } else {
        JsValue::Undefined
    })
}

/// `[[Construct]]`. Native constructors build their own result; script
/// constructors receive a fresh object linked to their `prototype`.
pub fn construct(ctx: &mut EvalContext, func: &JsValue, args: Vec<JsValue>) -> ValueResult {
    match resolve_callee(func)? {
        Callee::Native(_) => call_function(ctx, func, JsValue::Undefined, args),
        Callee::Script(..) => {
            let instance = JsObject::new_ordinary();
            if let JsValue::Object(f) = func {
                if let Some(Property::Data(JsValue::Object(prototype))) = find_property(f, "prototype") {
                    instance.borrow_mut().prototype = Some(prototype);
                }
            }
            let this = JsValue::Object(instance);
            let result = call_function(ctx, func, this.clone(), args)?;
            Ok(match result {
                JsValue::Object(_) => result,
                _ => this,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursion_limit_raises_range_error() {
        let mut ctx = EvalContext::new();
        ctx.max_call_depth = 16;
        let result = ctx.run_script("function f() { return f(); } f();");
        assert!(matches!(result, Err(JErrorType::RangeError(_))));
        assert_eq!(ctx.call_depth, 0);
    }

    #[test]
    fn test_constructor_links_prototype() {
        let mut ctx = EvalContext::new();
        let result = ctx
            .run_script("function P(x) { this.x = x; } P.prototype.get = function () { return this.x; }; new P(7).get();")
            .unwrap();
        assert_eq!(result, JsValue::number(7.0));
    }

    #[test]
    fn test_named_function_expression_sees_itself() {
        let mut ctx = EvalContext::new();
        let result = ctx
            .run_script("var fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1); }; fact(5);")
            .unwrap();
        assert_eq!(result, JsValue::number(120.0));
        assert!(!ctx.has_binding("f"));
    }
}
