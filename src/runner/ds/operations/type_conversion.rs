use crate::parser::codegen::generate_function;
use crate::runner::ds::object::{FunctionKind, ObjectKind};
use crate::runner::ds::value::JsValue;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Nesting beyond which array-to-string conversion stops descending.
const MAX_JOIN_DEPTH: usize = 64;

/// The result of the `typeof` operator.
pub fn get_type(a: &JsValue) -> &'static str {
    match a {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_OBJECT,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(o) => {
            if (**o).borrow().is_callable() {
                TYPE_STR_FUNCTION
            } else {
                TYPE_STR_OBJECT
            }
        }
    }
}

pub fn to_boolean(v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => {
            let f = n.as_f64();
            !(f == 0.0 || f.is_nan())
        }
        JsValue::String(s) => !s.is_empty(),
        JsValue::Object(_) => true,
    }
}

/// Converts objects to a primitive. Objects never run script code here:
/// arrays join their elements, functions print their source and everything
/// else uses its built-in tag.
pub fn to_primitive(v: &JsValue) -> JsValue {
    match v {
        JsValue::Object(_) => JsValue::String(to_string(v)),
        _ => v.clone(),
    }
}

pub fn to_number(v: &JsValue) -> f64 {
    match v {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(true) => 1.0,
        JsValue::Boolean(false) => 0.0,
        JsValue::Number(n) => n.as_f64(),
        JsValue::String(s) => string_to_number(s),
        JsValue::Object(_) => to_number(&to_primitive(v)),
    }
}

/// `ToInteger`: truncation towards zero with NaN mapped to zero.
pub fn to_integer(v: &JsValue) -> f64 {
    let n = to_number(v);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

pub fn to_int32(v: &JsValue) -> i32 {
    f64_to_int32(to_number(v))
}

pub fn to_uint32(v: &JsValue) -> u32 {
    f64_to_int32(to_number(v)) as u32
}

pub fn to_uint16(v: &JsValue) -> u16 {
    f64_to_int32(to_number(v)) as u16
}

pub fn f64_to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let two_32 = 4294967296.0;
    let m = n.trunc().rem_euclid(two_32);
    if m >= 2147483648.0 {
        (m - two_32) as i32
    } else {
        m as i32
    }
}

pub fn to_string(v: &JsValue) -> String {
    to_string_with_depth(v, 0)
}

fn to_string_with_depth(v: &JsValue, depth: usize) -> String {
    match v {
        JsValue::Undefined => TYPE_STR_UNDEFINED.to_string(),
        JsValue::Null => TYPE_STR_NULL.to_string(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::Number(n) => number_to_string(n.as_f64()),
        JsValue::String(s) => s.clone(),
        JsValue::Object(o) => {
            let object = (**o).borrow();
            match &object.kind {
                ObjectKind::Array(elements) => {
                    if depth >= MAX_JOIN_DEPTH {
                        return String::new();
                    }
                    elements
                        .iter()
                        .map(|e| match e {
                            JsValue::Undefined | JsValue::Null => String::new(),
                            _ => to_string_with_depth(e, depth + 1),
                        })
                        .collect::<Vec<_>>()
                        .join(",")
                }
                ObjectKind::Function(FunctionKind::Script { data, .. }) => generate_function(data),
                ObjectKind::Function(FunctionKind::Native { name, .. }) => {
                    format!("function {}() {{ [native code] }}", name)
                }
                ObjectKind::RegExp(re) => format!("/{}/{}", re.source, re.flags),
                ObjectKind::Error => {
                    let name = match object.get_own("name") {
                        Some(crate::runner::ds::object::Property::Data(n)) => to_string(&n),
                        _ => "Error".to_string(),
                    };
                    let message = match object.get_own("message") {
                        Some(crate::runner::ds::object::Property::Data(m)) => to_string(&m),
                        _ => String::new(),
                    };
                    if message.is_empty() {
                        name
                    } else {
                        format!("{}: {}", name, message)
                    }
                }
                ObjectKind::Ordinary => "[object Object]".to_string(),
            }
        }
    }
}

pub fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{09}' | '\u{0A}' | '\u{0B}' | '\u{0C}' | '\u{0D}' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

/// `ToNumber` applied to a string.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(is_js_whitespace);
    if s.is_empty() {
        return 0.0;
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            let mut result = 0.0;
            for c in digits.chars() {
                match c.to_digit(radix) {
                    Some(d) => result = result * radix as f64 + d as f64,
                    None => return f64::NAN,
                }
            }
            return result;
        }
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// `Number::toString`: the shortest digits that round-trip, in plain
/// notation for magnitudes within `[1e-7, 1e21)` and exponent form outside.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value < 0.0 {
        return format!("-{}", number_to_string(-value));
    }
    let formatted = format!("{:e}", value);
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (formatted.as_str(), 0),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;
    if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e >= 0 { "+" } else { "-" };
        if k == 1 {
            format!("{}e{}{}", digits, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e.abs())
        }
    }
}

/// Renders a number in the given radix the way `Number.prototype.toString`
/// does for radixes other than ten.
pub fn number_to_radix_string(value: f64, radix: u32) -> String {
    if radix == 10 || !value.is_finite() {
        return number_to_string(value);
    }
    if value < 0.0 {
        return format!("-{}", number_to_radix_string(-value, radix));
    }
    let digit = |d: u32| std::char::from_digit(d, radix).unwrap_or('0');
    let mut integer = value.trunc();
    let mut fraction = value - integer;
    let mut int_digits = vec![];
    if integer == 0.0 {
        int_digits.push('0');
    }
    while integer >= 1.0 {
        let d = (integer % radix as f64) as u32;
        int_digits.push(digit(d));
        integer = (integer / radix as f64).trunc();
    }
    int_digits.reverse();
    let mut result: String = int_digits.into_iter().collect();
    if fraction > 0.0 {
        result.push('.');
        let mut count = 0;
        while fraction > 0.0 && count < 52 {
            fraction *= radix as f64;
            let d = fraction.trunc() as u32;
            result.push(digit(d));
            fraction -= d as f64;
            count += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string_matches_js() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert_eq!(string_to_number(""), 0.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn test_int32_wraps() {
        assert_eq!(f64_to_int32(4294967297.0), 1);
        assert_eq!(f64_to_int32(2147483648.0), -2147483648);
        assert_eq!(f64_to_int32(-1.5), -1);
    }

    #[test]
    fn test_radix_string() {
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(35.0, 36), "z");
        assert_eq!(number_to_radix_string(0.5, 2), "0.1");
    }
}
