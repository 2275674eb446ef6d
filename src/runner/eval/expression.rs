//! Expression evaluation.
//!
//! Handles every expression kind in the AST. Assignment targets are resolved
//! to a [`Target`] first so that compound assignment and update expressions
//! evaluate the base and key exactly once.

use crate::parser::ast::{
    AssignmentOperator, ExpressionType, LiteralType, MemberExpressionType, PropertyData,
    PropertyKey, PropertyKind, UnaryOperator, UpdateOperator,
};
use crate::parser::codegen::generate_expression;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::operations::object::{get, set};
use crate::runner::ds::operations::operators::{binary_op, short_circuits, unary_op};
use crate::runner::ds::operations::type_conversion::{to_boolean, to_number, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::regexp::new_regexp;

use super::function::create_function_expression;
use super::types::ValueResult;

/// A resolved assignment target.
enum Target {
    Binding(String),
    Property(JsValue, String),
}

/// Evaluate an expression and return its value.
pub fn evaluate_expression(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expr {
        ExpressionType::Literal(lit) => evaluate_literal(&lit.value),

        ExpressionType::Identifier(id) => ctx.get_binding(&id.name),

        ExpressionType::ThisExpression { .. } => Ok(ctx.this_value.clone()),

        ExpressionType::ArrayExpression { elements, .. } => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(match element {
                    Some(e) => evaluate_expression(e, ctx)?,
                    None => JsValue::Undefined,
                });
            }
            Ok(JsValue::Object(JsObject::new_array(values)))
        }

        ExpressionType::ObjectExpression { properties, .. } => evaluate_object_expression(properties, ctx),

        ExpressionType::FunctionExpression(data) => Ok(create_function_expression(data, ctx.lex_env.clone())),

        ExpressionType::UnaryExpression { operator, argument, .. } => {
            evaluate_unary_expression(operator, argument, ctx)
        }

        ExpressionType::UpdateExpression {
            operator,
            argument,
            prefix,
            ..
        } => {
            let target = resolve_target(argument, ctx)?;
            let old = to_number(&read_target(&target, ctx)?);
            let new = match operator {
                UpdateOperator::PlusPlus => old + 1.0,
                UpdateOperator::MinusMinus => old - 1.0,
            };
            write_target(target, JsValue::number(new), ctx)?;
            Ok(JsValue::number(if *prefix { new } else { old }))
        }

        ExpressionType::BinaryExpression {
            operator, left, right, ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            let r = evaluate_expression(right, ctx)?;
            binary_op(operator, &l, &r)
        }

        ExpressionType::LogicalExpression {
            operator, left, right, ..
        } => {
            let l = evaluate_expression(left, ctx)?;
            if short_circuits(operator, &l) {
                Ok(l)
            } else {
                evaluate_expression(right, ctx)
            }
        }

        ExpressionType::AssignmentExpression {
            operator, left, right, ..
        } => evaluate_assignment_expression(operator, left, right, ctx),

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            let test_value = evaluate_expression(test, ctx)?;
            if to_boolean(&test_value) {
                evaluate_expression(consequent, ctx)
            } else {
                evaluate_expression(alternate, ctx)
            }
        }

        ExpressionType::CallExpression { callee, arguments, .. } => {
            let (func, this) = match callee.as_ref() {
                ExpressionType::MemberExpression(m) => {
                    let (base, key) = evaluate_member_parts(m, ctx)?;
                    (get(ctx, &base, &key)?, base)
                }
                _ => (evaluate_expression(callee, ctx)?, JsValue::Undefined),
            };
            let args = evaluate_arguments(arguments, ctx)?;
            ensure_callable(&func, callee)?;
            ctx.call_function(&func, this, args)
        }

        ExpressionType::NewExpression { callee, arguments, .. } => {
            let func = evaluate_expression(callee, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            ensure_callable(&func, callee)?;
            ctx.construct(&func, args)
        }

        ExpressionType::SequenceExpression { expressions, .. } => {
            let mut value = JsValue::Undefined;
            for e in expressions {
                value = evaluate_expression(e, ctx)?;
            }
            Ok(value)
        }

        ExpressionType::MemberExpression(m) => {
            let (base, key) = evaluate_member_parts(m, ctx)?;
            get(ctx, &base, &key)
        }

        ExpressionType::PendingRewrite { original, .. } => evaluate_expression(original, ctx),
    }
}

fn evaluate_literal(value: &LiteralType) -> ValueResult {
    Ok(match value {
        LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::NumberLiteral(n) => JsValue::number(n.as_f64()),
        LiteralType::RegExpLiteral(re) => new_regexp(&re.pattern, &re.flags)?,
    })
}

fn evaluate_arguments(arguments: &[ExpressionType], ctx: &mut EvalContext) -> Result<Vec<JsValue>, JErrorType> {
    let mut args = Vec::with_capacity(arguments.len());
    for a in arguments {
        args.push(evaluate_expression(a, ctx)?);
    }
    Ok(args)
}

fn ensure_callable(func: &JsValue, callee: &ExpressionType) -> Result<(), JErrorType> {
    match func {
        JsValue::Object(o) if o.borrow().is_callable() => Ok(()),
        _ => Err(JErrorType::TypeError(format!(
            "{} is not a function",
            generate_expression(callee)
        ))),
    }
}

fn property_key(key: &PropertyKey, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    Ok(match key {
        PropertyKey::Identifier(id) => id.name.clone(),
        PropertyKey::Literal(lit) => to_string(&evaluate_literal(&lit.value)?),
        PropertyKey::Computed(e) => to_string(&evaluate_expression(e, ctx)?),
    })
}

fn evaluate_object_expression(properties: &[PropertyData], ctx: &mut EvalContext) -> ValueResult {
    let object = JsObject::new_ordinary();
    for property in properties {
        let key = property_key(&property.key, ctx)?;
        let value = evaluate_expression(&property.value, ctx)?;
        let mut object_ref = object.borrow_mut();
        match property.kind {
            PropertyKind::Init => object_ref.set_own(&key, value),
            PropertyKind::Get => object_ref.define_accessor(&key, Some(value), None),
            PropertyKind::Set => object_ref.define_accessor(&key, None, Some(value)),
        }
    }
    Ok(JsValue::Object(object))
}

fn evaluate_member_parts(
    member: &MemberExpressionType,
    ctx: &mut EvalContext,
) -> Result<(JsValue, String), JErrorType> {
    match member {
        MemberExpressionType::SimpleMemberExpression { object, property, .. } => {
            let base = evaluate_expression(object, ctx)?;
            Ok((base, property.name.clone()))
        }
        MemberExpressionType::ComputedMemberExpression { object, property, .. } => {
            let base = evaluate_expression(object, ctx)?;
            let key = evaluate_expression(property, ctx)?;
            Ok((base, to_string(&key)))
        }
    }
}

fn evaluate_unary_expression(
    operator: &UnaryOperator,
    argument: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    match (operator, argument) {
        (UnaryOperator::TypeOf, ExpressionType::Identifier(id)) if !ctx.has_binding(&id.name) => {
            Ok(JsValue::string("undefined"))
        }
        (UnaryOperator::Delete, ExpressionType::MemberExpression(m)) => {
            let (base, key) = evaluate_member_parts(m, ctx)?;
            match base {
                JsValue::Object(o) => Ok(JsValue::Boolean(o.borrow_mut().delete(&key))),
                JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
                    "Cannot convert undefined or null to object (deleting '{}')",
                    key
                ))),
                _ => Ok(JsValue::Boolean(true)),
            }
        }
        (UnaryOperator::Delete, ExpressionType::Identifier(id)) => {
            let global_property = ctx.global_object.borrow().has_own(&id.name);
            if global_property {
                Ok(JsValue::Boolean(ctx.global_object.borrow_mut().delete(&id.name)))
            } else {
                Ok(JsValue::Boolean(!ctx.has_binding(&id.name)))
            }
        }
        _ => {
            let value = evaluate_expression(argument, ctx)?;
            unary_op(operator, &value)
        }
    }
}

fn evaluate_assignment_expression(
    operator: &AssignmentOperator,
    left: &ExpressionType,
    right: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    let target = resolve_target(left, ctx)?;
    let value = match operator.binary_operator() {
        None => evaluate_expression(right, ctx)?,
        Some(op) => {
            let old = read_target(&target, ctx)?;
            let r = evaluate_expression(right, ctx)?;
            binary_op(&op, &old, &r)?
        }
    };
    write_target(target, value.clone(), ctx)?;
    Ok(value)
}

/// Assigns `value` to an arbitrary assignment target expression.
pub fn assign_to_expression(target: &ExpressionType, value: JsValue, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    let target = resolve_target(target, ctx)?;
    write_target(target, value, ctx)
}

fn resolve_target(expr: &ExpressionType, ctx: &mut EvalContext) -> Result<Target, JErrorType> {
    match expr {
        ExpressionType::Identifier(id) => Ok(Target::Binding(id.name.clone())),
        ExpressionType::MemberExpression(m) => {
            let (base, key) = evaluate_member_parts(m, ctx)?;
            Ok(Target::Property(base, key))
        }
        ExpressionType::PendingRewrite { original, .. } => resolve_target(original, ctx),
        _ => Err(JErrorType::SyntaxError(
            "Invalid left-hand side in assignment".to_string(),
        )),
    }
}

fn read_target(target: &Target, ctx: &mut EvalContext) -> ValueResult {
    match target {
        Target::Binding(name) => ctx.get_binding(name),
        Target::Property(base, key) => get(ctx, base, key),
    }
}

fn write_target(target: Target, value: JsValue, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    match target {
        Target::Binding(name) => ctx.set_binding(&name, value),
        Target::Property(base, key) => set(ctx, &base, &key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(run("1 + 2 * 3;"), JsValue::number(7.0));
        assert_eq!(run("'a' + 1 + 2;"), JsValue::string("a12"));
        assert_eq!(run("'abc'.length;"), JsValue::number(3.0));
        assert_eq!(run("'abc'[1];"), JsValue::string("b"));
    }

    #[test]
    fn test_compound_assignment_and_update() {
        assert_eq!(run("var a = 1; a += 4; a;"), JsValue::number(5.0));
        assert_eq!(run("var o = { n: 1 }; o.n++; o.n;"), JsValue::number(2.0));
        assert_eq!(run("var i = 5; var j = i--; j * 10 + i;"), JsValue::number(54.0));
        assert_eq!(run("var s = 'x'; s += 1; s;"), JsValue::string("x1"));
    }

    #[test]
    fn test_logical_operators_return_operand() {
        assert_eq!(run("0 || 'fallback';"), JsValue::string("fallback"));
        assert_eq!(run("'' && unknownName;"), JsValue::string(""));
    }

    #[test]
    fn test_closures_capture_scope() {
        let code = "function counter() { var n = 0; return function () { return ++n; }; } var c = counter(); c(); c();";
        assert_eq!(run(code), JsValue::number(2.0));
    }

    #[test]
    fn test_method_calls_bind_this() {
        assert_eq!(run("var o = { v: 3, read: function () { return this.v; } }; o.read();"), JsValue::number(3.0));
        assert_eq!(run("var o = { get twice() { return 2; } }; o.twice;"), JsValue::number(2.0));
    }

    #[test]
    fn test_calling_non_function_reports_callee() {
        let err = EvalContext::new().run_script("var o = {}; o.missing();").unwrap_err();
        assert_eq!(err.describe(), "TypeError: o.missing is not a function");
    }

    #[test]
    fn test_undeclared_names() {
        assert_eq!(run("typeof nothing;"), JsValue::string("undefined"));
        assert!(matches!(
            EvalContext::new().run_script("nothing;"),
            Err(JErrorType::ReferenceError(_))
        ));
        assert_eq!(run("implicitGlobal = 4; window.implicitGlobal;"), JsValue::number(4.0));
    }

    #[test]
    fn test_delete_removes_property() {
        assert_eq!(run("var o = { a: 1 }; delete o.a; 'a' in o;"), JsValue::Boolean(false));
    }
}
