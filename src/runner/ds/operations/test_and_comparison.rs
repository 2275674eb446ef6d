use std::cmp::Ordering;
use std::rc::Rc;

use crate::runner::ds::operations::type_conversion::{to_number, to_primitive};
use crate::runner::ds::value::JsValue;

pub fn strict_equality(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(x), JsValue::Boolean(y)) => x == y,
        (JsValue::String(x), JsValue::String(y)) => x == y,
        (JsValue::Number(x), JsValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// The abstract equality comparison behind `==`.
pub fn loose_equality(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
        (JsValue::Number(_), JsValue::String(_)) | (JsValue::String(_), JsValue::Number(_)) => {
            to_number(a) == to_number(b)
        }
        (JsValue::Boolean(_), _) => loose_equality(&JsValue::number(to_number(a)), b),
        (_, JsValue::Boolean(_)) => loose_equality(a, &JsValue::number(to_number(b))),
        (JsValue::Object(_), JsValue::Object(_)) => strict_equality(a, b),
        (JsValue::Object(_), _) => loose_equality(&to_primitive(a), b),
        (_, JsValue::Object(_)) => loose_equality(a, &to_primitive(b)),
        _ => strict_equality(a, b),
    }
}

/// The abstract relational comparison. `None` stands for the undefined
/// outcome produced by NaN operands.
pub fn compare_values(a: &JsValue, b: &JsValue) -> Option<Ordering> {
    let pa = to_primitive(a);
    let pb = to_primitive(b);
    if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
        return Some(x.encode_utf16().cmp(y.encode_utf16()));
    }
    let x = to_number(&pa);
    let y = to_number(&pb);
    x.partial_cmp(&y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_equality_coerces() {
        assert!(loose_equality(&JsValue::string("1"), &JsValue::number(1.0)));
        assert!(loose_equality(&JsValue::Null, &JsValue::Undefined));
        assert!(!loose_equality(&JsValue::Null, &JsValue::number(0.0)));
        assert!(loose_equality(&JsValue::Boolean(true), &JsValue::string("1")));
    }

    #[test]
    fn test_nan_is_unequal_to_itself() {
        let nan = JsValue::number(f64::NAN);
        assert!(!strict_equality(&nan, &nan));
        assert_eq!(compare_values(&nan, &JsValue::number(1.0)), None);
    }

    #[test]
    fn test_strings_compare_by_code_units() {
        assert_eq!(
            compare_values(&JsValue::string("a"), &JsValue::string("b")),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&JsValue::string("10"), &JsValue::number(9.0)),
            Some(Ordering::Greater)
        );
    }
}
