//! Operator semantics over known operand values.
//!
//! These functions never run script code, which lets the static expression
//! reducer and the sandbox interpreter share one definition of what each
//! operator means.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::parser::ast::{BinaryOperator, LogicalOperator, UnaryOperator};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{FunctionKind, JsObjectType, ObjectKind, Property};
use crate::runner::ds::operations::object::find_property;
use crate::runner::ds::operations::test_and_comparison::{
    compare_values, loose_equality, strict_equality,
};
use crate::runner::ds::operations::type_conversion::{
    get_type, to_boolean, to_int32, to_number, to_primitive, to_string, to_uint32,
};
use crate::runner::ds::value::JsValue;

pub fn binary_op(op: &BinaryOperator, left: &JsValue, right: &JsValue) -> Result<JsValue, JErrorType> {
    Ok(match op {
        BinaryOperator::Add => add_values(left, right),
        BinaryOperator::Subtract => JsValue::number(to_number(left) - to_number(right)),
        BinaryOperator::Multiply => JsValue::number(to_number(left) * to_number(right)),
        BinaryOperator::Divide => JsValue::number(to_number(left) / to_number(right)),
        BinaryOperator::Modulo => JsValue::number(to_number(left) % to_number(right)),

        BinaryOperator::LessThan => {
            JsValue::Boolean(compare_values(left, right) == Some(Ordering::Less))
        }
        BinaryOperator::GreaterThan => {
            JsValue::Boolean(compare_values(left, right) == Some(Ordering::Greater))
        }
        BinaryOperator::LessThanEqual => JsValue::Boolean(matches!(
            compare_values(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThanEqual => JsValue::Boolean(matches!(
            compare_values(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),

        BinaryOperator::StrictlyEqual => JsValue::Boolean(strict_equality(left, right)),
        BinaryOperator::StrictlyUnequal => JsValue::Boolean(!strict_equality(left, right)),
        BinaryOperator::LooselyEqual => JsValue::Boolean(loose_equality(left, right)),
        BinaryOperator::LooselyUnequal => JsValue::Boolean(!loose_equality(left, right)),

        BinaryOperator::BitwiseAnd => JsValue::number((to_int32(left) & to_int32(right)) as f64),
        BinaryOperator::BitwiseOr => JsValue::number((to_int32(left) | to_int32(right)) as f64),
        BinaryOperator::BitwiseXor => JsValue::number((to_int32(left) ^ to_int32(right)) as f64),
        BinaryOperator::BitwiseLeftShift => {
            JsValue::number(to_int32(left).wrapping_shl(to_uint32(right) & 0x1f) as f64)
        }
        BinaryOperator::BitwiseRightShift => {
            JsValue::number((to_int32(left) >> (to_uint32(right) & 0x1f)) as f64)
        }
        BinaryOperator::BitwiseUnsignedRightShift => {
            JsValue::number((to_uint32(left) >> (to_uint32(right) & 0x1f)) as f64)
        }

        BinaryOperator::In => match right {
            JsValue::Object(o) => JsValue::Boolean(find_property(o, &to_string(left)).is_some()),
            _ => {
                return Err(JErrorType::TypeError(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    to_string(left),
                    to_string(right)
                )))
            }
        },
        BinaryOperator::InstanceOf => JsValue::Boolean(instance_of(left, right)?),
    })
}

fn add_values(left: &JsValue, right: &JsValue) -> JsValue {
    let l = to_primitive(left);
    let r = to_primitive(right);
    if matches!(l, JsValue::String(_)) || matches!(r, JsValue::String(_)) {
        JsValue::String(format!("{}{}", to_string(&l), to_string(&r)))
    } else {
        JsValue::number(to_number(&l) + to_number(&r))
    }
}

fn instance_of(left: &JsValue, right: &JsValue) -> Result<bool, JErrorType> {
    let constructor = match right {
        JsValue::Object(o) if o.borrow().is_callable() => o.clone(),
        _ => {
            return Err(JErrorType::TypeError(
                "Right-hand side of 'instanceof' is not callable".to_string(),
            ))
        }
    };
    let object = match left {
        JsValue::Object(o) => o.clone(),
        _ => return Ok(false),
    };
    let native_name = match &constructor.borrow().kind {
        ObjectKind::Function(FunctionKind::Native { name, .. }) => Some(name.clone()),
        _ => None,
    };
    if let Some(name) = native_name {
        return Ok(native_instance_of(&object, &name));
    }
    let prototype = match find_property(&constructor, "prototype") {
        Some(Property::Data(JsValue::Object(p))) => p,
        _ => return Ok(false),
    };
    let mut current = object.borrow().prototype.clone();
    while let Some(p) = current {
        if Rc::ptr_eq(&p, &prototype) {
            return Ok(true);
        }
        current = p.borrow().prototype.clone();
    }
    Ok(false)
}

fn native_instance_of(object: &JsObjectType, constructor_name: &str) -> bool {
    let object = object.borrow();
    match constructor_name {
        "Object" => true,
        "Array" => object.is_array(),
        "Function" => object.is_callable(),
        "RegExp" => matches!(object.kind, ObjectKind::RegExp(_)),
        "Error" => matches!(object.kind, ObjectKind::Error),
        name if name.ends_with("Error") => {
            matches!(object.kind, ObjectKind::Error)
                && matches!(object.get_own("name"), Some(Property::Data(JsValue::String(n))) if n == name)
        }
        _ => false,
    }
}

pub fn unary_op(op: &UnaryOperator, value: &JsValue) -> Result<JsValue, JErrorType> {
    Ok(match op {
        UnaryOperator::Minus => JsValue::number(-to_number(value)),
        UnaryOperator::Plus => JsValue::number(to_number(value)),
        UnaryOperator::LogicalNot => JsValue::Boolean(!to_boolean(value)),
        UnaryOperator::BitwiseNot => JsValue::number((!to_int32(value)) as f64),
        UnaryOperator::TypeOf => JsValue::string(get_type(value)),
        UnaryOperator::Void => JsValue::Undefined,
        // Deleting something that is not a reference always succeeds.
        UnaryOperator::Delete => JsValue::Boolean(true),
    })
}

/// Whether `left` alone decides the result of the logical operator.
pub fn short_circuits(op: &LogicalOperator, left: &JsValue) -> bool {
    match op {
        LogicalOperator::And => !to_boolean(left),
        LogicalOperator::Or => to_boolean(left),
    }
}

pub fn logical_op(op: &LogicalOperator, left: JsValue, right: JsValue) -> JsValue {
    if short_circuits(op, &left) {
        left
    } else {
        right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(f: f64) -> JsValue {
        JsValue::number(f)
    }

    #[test]
    fn test_add_concatenates_when_either_side_is_string() {
        assert_eq!(
            binary_op(&BinaryOperator::Add, &num(1.0), &JsValue::string("2")).unwrap(),
            JsValue::string("12")
        );
        assert_eq!(binary_op(&BinaryOperator::Add, &num(1.0), &num(2.0)).unwrap(), num(3.0));
        assert_eq!(
            binary_op(&BinaryOperator::Add, &JsValue::Boolean(true), &JsValue::Null).unwrap(),
            num(1.0)
        );
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(binary_op(&BinaryOperator::BitwiseXor, &num(5.0), &num(3.0)).unwrap(), num(6.0));
        assert_eq!(
            binary_op(&BinaryOperator::BitwiseUnsignedRightShift, &num(-1.0), &num(0.0)).unwrap(),
            num(4294967295.0)
        );
        assert_eq!(
            binary_op(&BinaryOperator::BitwiseLeftShift, &num(1.0), &num(31.0)).unwrap(),
            num(-2147483648.0)
        );
    }

    #[test]
    fn test_in_requires_object() {
        assert!(binary_op(&BinaryOperator::In, &JsValue::string("a"), &JsValue::string("abc")).is_err());
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(unary_op(&UnaryOperator::TypeOf, &JsValue::Null).unwrap(), JsValue::string("object"));
        assert_eq!(unary_op(&UnaryOperator::BitwiseNot, &num(0.0)).unwrap(), num(-1.0));
        assert_eq!(unary_op(&UnaryOperator::LogicalNot, &JsValue::string("")).unwrap(), JsValue::Boolean(true));
        assert_eq!(unary_op(&UnaryOperator::Void, &num(0.0)).unwrap(), JsValue::Undefined);
    }

    #[test]
    fn test_logical_op_selects_operand() {
        assert_eq!(logical_op(&LogicalOperator::Or, num(0.0), JsValue::string("x")), JsValue::string("x"));
        assert_eq!(logical_op(&LogicalOperator::And, num(0.0), JsValue::string("x")), num(0.0));
    }
}
