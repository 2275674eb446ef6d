//! Math built-in object.
//!
//! Provides mathematical constants and functions.

use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_number;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Math object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let math = BuiltInObject::new("Math")
        .with_no_prototype()
        // Constants
        .add_property("E", JsValue::Number(JsNumberType::Float(std::f64::consts::E)))
        .add_property("LN10", JsValue::Number(JsNumberType::Float(std::f64::consts::LN_10)))
        .add_property("LN2", JsValue::Number(JsNumberType::Float(std::f64::consts::LN_2)))
        .add_property("LOG10E", JsValue::Number(JsNumberType::Float(std::f64::consts::LOG10_E)))
        .add_property("LOG2E", JsValue::Number(JsNumberType::Float(std::f64::consts::LOG2_E)))
        .add_property("PI", JsValue::Number(JsNumberType::Float(std::f64::consts::PI)))
        .add_property("SQRT1_2", JsValue::Number(JsNumberType::Float(std::f64::consts::FRAC_1_SQRT_2)))
        .add_property("SQRT2", JsValue::Number(JsNumberType::Float(std::f64::consts::SQRT_2)))
        // Methods
        .add_static_method("abs", math_abs)
        .add_static_method("floor", math_floor)
        .add_static_method("ceil", math_ceil)
        .add_static_method("round", math_round)
        .add_static_method("trunc", math_trunc)
        .add_static_method("sign", math_sign)
        .add_static_method("min", math_min)
        .add_static_method("max", math_max)
        .add_static_method("sqrt", math_sqrt)
        .add_static_method("pow", math_pow)
        .add_static_method("exp", math_exp)
        .add_static_method("log", math_log)
        .add_static_method("sin", math_sin)
        .add_static_method("cos", math_cos)
        .add_static_method("tan", math_tan)
        .add_static_method("atan", math_atan)
        .add_static_method("atan2", math_atan2)
        .add_static_method("random", math_random);

    registry.register_object(math);
}

fn num_arg(args: &[JsValue], index: usize) -> f64 {
    args.get(index).map(to_number).unwrap_or(f64::NAN)
}

fn unary(args: &[JsValue], f: fn(f64) -> f64) -> Result<JsValue, JErrorType> {
    Ok(JsValue::number(f(num_arg(args, 0))))
}

/// Math.abs
fn math_abs(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::abs)
}

/// Math.floor
fn math_floor(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::floor)
}

/// Math.ceil
fn math_ceil(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::ceil)
}

/// Math.round rounds halves towards positive infinity.
fn math_round(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, |x| {
        if !x.is_finite() || x.fract() == 0.0 {
            x
        } else {
            (x + 0.5).floor()
        }
    })
}

/// Math.trunc
fn math_trunc(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::trunc)
}

/// Math.sign
fn math_sign(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, |x| if x.is_nan() || x == 0.0 { x } else { x.signum() })
}

/// Math.min
fn math_min(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut result = f64::INFINITY;
    for n in args.iter().map(to_number) {
        if n.is_nan() {
            return Ok(JsValue::number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(JsValue::number(result))
}

/// Math.max
fn math_max(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut result = f64::NEG_INFINITY;
    for n in args.iter().map(to_number) {
        if n.is_nan() {
            return Ok(JsValue::number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(JsValue::number(result))
}

/// Math.sqrt
fn math_sqrt(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::sqrt)
}

/// Math.pow
fn math_pow(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let base = num_arg(&args, 0);
    let exponent = num_arg(&args, 1);
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return Ok(JsValue::number(f64::NAN));
    }
    Ok(JsValue::number(base.powf(exponent)))
}

/// Math.exp
fn math_exp(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::exp)
}

/// Math.log
fn math_log(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::ln)
}

/// Math.sin
fn math_sin(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::sin)
}

/// Math.cos
fn math_cos(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::cos)
}

/// Math.tan
fn math_tan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::tan)
}

/// Math.atan
fn math_atan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    unary(&args, f64::atan)
}

/// Math.atan2
fn math_atan2(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::number(num_arg(&args, 0).atan2(num_arg(&args, 1))))
}

/// Math.random draws its 53 bits from a v4 UUID.
fn math_random(_ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let bits = Uuid::new_v4().as_u128() >> 75;
    Ok(JsValue::number(bits as f64 / (1u64 << 53) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_rounding() {
        assert_eq!(run("Math.round(2.5);"), JsValue::number(3.0));
        assert_eq!(run("Math.round(-2.5);"), JsValue::number(-2.0));
        assert_eq!(run("Math.floor(-1.5);"), JsValue::number(-2.0));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(run("Math.max(1, 5, 3);"), JsValue::number(5.0));
        assert_eq!(run("Math.min();"), JsValue::number(f64::INFINITY));
    }

    #[test]
    fn test_random_in_unit_interval() {
        let value = run("Math.random();");
        match value {
            JsValue::Number(n) => assert!((0.0..1.0).contains(&n.as_f64())),
            other => panic!("expected a number, got {:?}", other),
        }
    }
}
