//! Number and Boolean built-ins.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{
    number_to_radix_string, number_to_string, to_boolean, to_integer, to_number,
};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Number and Boolean built-ins with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let number = BuiltInObject::new("Number")
        .with_constructor(number_constructor)
        .add_property("MAX_VALUE", JsValue::Number(JsNumberType::Float(f64::MAX)))
        .add_property("MIN_VALUE", JsValue::Number(JsNumberType::Float(5e-324)))
        .add_property("POSITIVE_INFINITY", JsValue::Number(JsNumberType::PositiveInfinity))
        .add_property("NEGATIVE_INFINITY", JsValue::Number(JsNumberType::NegativeInfinity))
        .add_property("NaN", JsValue::Number(JsNumberType::NaN))
        .add_method("toString", number_to_string_method)
        .add_method("toFixed", number_to_fixed)
        .add_method("valueOf", number_value_of);
    registry.register_object(number);

    let boolean = BuiltInObject::new("Boolean")
        .with_constructor(boolean_constructor)
        .add_method("toString", boolean_to_string)
        .add_method("valueOf", boolean_value_of);
    registry.register_object(boolean);
}

fn this_number(this: &JsValue, method: &str) -> Result<f64, JErrorType> {
    match this {
        JsValue::Number(n) => Ok(n.as_f64()),
        _ => Err(JErrorType::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

/// Number constructor.
fn number_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(match args.first() {
        Some(v) => JsValue::number(to_number(v)),
        None => JsValue::number(0.0),
    })
}

/// Number.prototype.toString
fn number_to_string_method(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let value = this_number(&this, "toString")?;
    let radix = match args.first() {
        None | Some(JsValue::Undefined) => 10.0,
        Some(r) => to_integer(r),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JErrorType::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    Ok(JsValue::String(number_to_radix_string(value, radix as u32)))
}

/// Number.prototype.toFixed
fn number_to_fixed(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let value = this_number(&this, "toFixed")?;
    let digits = to_integer(args.first().unwrap_or(&JsValue::Undefined));
    if !(0.0..=100.0).contains(&digits) {
        return Err(JErrorType::RangeError(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    if !value.is_finite() || value.abs() >= 1e21 {
        return Ok(JsValue::String(number_to_string(value)));
    }
    Ok(JsValue::String(format!("{:.*}", digits as usize, value)))
}

/// Number.prototype.valueOf
fn number_value_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    this_number(&this, "valueOf")?;
    Ok(this)
}

/// Boolean constructor.
fn boolean_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(to_boolean(args.first().unwrap_or(&JsValue::Undefined))))
}

/// Boolean.prototype.toString
fn boolean_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match this {
        JsValue::Boolean(b) => Ok(JsValue::String(b.to_string())),
        _ => Err(JErrorType::TypeError(
            "Boolean.prototype.toString requires that 'this' be a Boolean".to_string(),
        )),
    }
}

/// Boolean.prototype.valueOf
fn boolean_value_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match this {
        JsValue::Boolean(_) => Ok(this),
        _ => Err(JErrorType::TypeError(
            "Boolean.prototype.valueOf requires that 'this' be a Boolean".to_string(),
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
    fn test_radix_conversion() {
        assert_eq!(run("(255).toString(16);"), JsValue::string("ff"));
        assert_eq!(run("(35).toString(36);"), JsValue::string("z"));
        assert!(EvalContext::new().run_script("(1).toString(1);").is_err());
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(run("(3.14159).toFixed(2);"), JsValue::string("3.14"));
        assert_eq!(run("(2).toFixed(0);"), JsValue::string("2"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(run("Number('0x10');"), JsValue::number(16.0));
        assert_eq!(run("Boolean('');"), JsValue::Boolean(false));
        assert_eq!(run("true.toString();"), JsValue::string("true"));
    }
}
