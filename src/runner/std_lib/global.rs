//! Global functions and value properties.
//!
//! Registered under the reserved `global` name, so every member lands
//! directly on the global object rather than on a namespace object.

use lazy_static::lazy_static;
use regex::Regex;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{is_js_whitespace, to_int32, to_number, to_string};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, GLOBAL_SCOPE};

lazy_static! {
    static ref FLOAT_PREFIX: Regex =
        Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)")
            .expect("float prefix pattern is valid");
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const URI_UNRESERVED_MARKS: &str = "-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,#";

/// Register the global functions with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let global = BuiltInObject::new(GLOBAL_SCOPE)
        .with_no_prototype()
        .add_property("undefined", JsValue::Undefined)
        .add_property("NaN", JsValue::Number(JsNumberType::NaN))
        .add_property("Infinity", JsValue::Number(JsNumberType::PositiveInfinity))
        .add_static_method("parseInt", parse_int)
        .add_static_method("parseFloat", parse_float)
        .add_static_method("isNaN", is_nan)
        .add_static_method("isFinite", is_finite)
        .add_static_method("atob", atob)
        .add_static_method("btoa", btoa)
        .add_static_method("escape", escape)
        .add_static_method("unescape", unescape)
        .add_static_method("encodeURIComponent", encode_uri_component)
        .add_static_method("encodeURI", encode_uri)
        .add_static_method("decodeURIComponent", decode_uri_component)
        .add_static_method("decodeURI", decode_uri)
        .add_static_method("eval", eval);

    registry.register_object(global);
}

fn string_arg(args: &[JsValue]) -> String {
    to_string(args.first().unwrap_or(&JsValue::Undefined))
}

/// parseInt(string, radix)
fn parse_int(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(&args);
    let mut s = input.trim_start_matches(is_js_whitespace);
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = to_int32(args.get(1).unwrap_or(&JsValue::Undefined));
    let mut strip_prefix = true;
    if radix != 0 {
        if !(2..=36).contains(&radix) {
            return Ok(JsValue::number(f64::NAN));
        }
        if radix != 16 {
            strip_prefix = false;
        }
    } else {
        radix = 10;
    }
    if strip_prefix {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    let mut result = 0.0;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix as u32) {
            Some(d) => {
                result = result * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    Ok(JsValue::number(if any { sign * result } else { f64::NAN }))
}

/// parseFloat(string)
fn parse_float(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(&args);
    let s = input.trim_start_matches(is_js_whitespace);
    let value = match FLOAT_PREFIX.find(s) {
        Some(m) => {
            let text = m.as_str();
            if text.ends_with("Infinity") {
                if text.starts_with('-') {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                }
            } else {
                text.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        None => f64::NAN,
    };
    Ok(JsValue::number(value))
}

fn is_nan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = args.first().map(to_number).unwrap_or(f64::NAN);
    Ok(JsValue::Boolean(n.is_nan()))
}

fn is_finite(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = args.first().map(to_number).unwrap_or(f64::NAN);
    Ok(JsValue::Boolean(n.is_finite()))
}

fn invalid_base64() -> JErrorType {
    JErrorType::Error(
        "Failed to execute 'atob': The string to be decoded is not correctly encoded.".to_string(),
    )
}

/// atob(data): base64 text to a binary string, one char per byte.
fn atob(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(&args);
    let mut data: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\x0C' | b'\r'))
        .collect();
    if data.len() % 4 == 0 {
        for _ in 0..2 {
            if data.last() == Some(&b'=') {
                data.pop();
            }
        }
    }
    if data.len() % 4 == 1 {
        return Err(invalid_base64());
    }
    let mut output = String::with_capacity(data.len() * 3 / 4);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for b in data {
        let value = BASE64_ALPHABET
            .iter()
            .position(|&c| c == b)
            .ok_or_else(invalid_base64)? as u32;
        buffer = (buffer << 6) | value;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            output.push(char::from(((buffer >> bits) & 0xFF) as u8));
        }
    }
    Ok(JsValue::String(output))
}

/// btoa(data): a binary string (code units up to 0xFF) to base64 text.
fn btoa(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(&args);
    let mut bytes = Vec::with_capacity(input.len());
    for unit in input.encode_utf16() {
        if unit > 0xFF {
            return Err(JErrorType::Error(
                "Failed to execute 'btoa': The string to be encoded contains characters outside of the Latin1 range."
                    .to_string(),
            ));
        }
        bytes.push(unit as u8);
    }
    let mut output = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let n = chunk.iter().enumerate().fold(0u32, |acc, (i, &b)| acc | (b as u32) << (16 - 8 * i));
        for i in 0..4 {
            if i <= chunk.len() {
                output.push(BASE64_ALPHABET[((n >> (18 - 6 * i)) & 0x3F) as usize] as char);
            } else {
                output.push('=');
            }
        }
    }
    Ok(JsValue::String(output))
}

/// escape(string)
fn escape(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = string_arg(&args);
    let mut output = String::with_capacity(input.len());
    for unit in input.encode_utf16() {
        match char::from_u32(unit as u32) {
            Some(c) if c.is_ascii_alphanumeric() || "@*_+-./".contains(c) => output.push(c),
            _ if unit < 0x100 => output.push_str(&format!("%{:02X}", unit)),
            _ => output.push_str(&format!("%u{:04X}", unit)),
        }
    }
    Ok(JsValue::String(output))
}

fn hex_value(units: &[u16]) -> Option<u16> {
    units.iter().try_fold(0u16, |acc, &u| {
        char::from_u32(u as u32)
            .and_then(|c| c.to_digit(16))
            .map(|d| (acc << 4) | d as u16)
    })
}

/// unescape(string)
fn unescape(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let units: Vec<u16> = string_arg(&args).encode_utf16().collect();
    let mut output = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        if units[i] == b'%' as u16 {
            if units.get(i + 1) == Some(&(b'u' as u16)) && i + 6 <= units.len() {
                if let Some(v) = hex_value(&units[i + 2..i + 6]) {
                    output.push(v);
                    i += 6;
                    continue;
                }
            }
            if i + 3 <= units.len() {
                if let Some(v) = hex_value(&units[i + 1..i + 3]) {
                    output.push(v);
                    i += 3;
                    continue;
                }
            }
        }
        output.push(units[i]);
        i += 1;
    }
    Ok(JsValue::String(String::from_utf16_lossy(&output)))
}

fn encode(input: &str, keep: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || URI_UNRESERVED_MARKS.contains(c) || keep.contains(c) {
            output.push(c);
        } else {
            let mut buffer = [0u8; 4];
            for b in c.encode_utf8(&mut buffer).bytes() {
                output.push_str(&format!("%{:02X}", b));
            }
        }
    }
    output
}

fn uri_malformed() -> JErrorType {
    JErrorType::URIError("URI malformed".to_string())
}

/// Decodes `%XX` sequences as UTF-8, leaving escapes of `reserved`
/// characters untouched.
fn decode(input: &str, reserved: &str) -> Result<String, JErrorType> {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;
    let byte_at = |i: usize| -> Result<u8, JErrorType> {
        if bytes.get(i) != Some(&b'%') || i + 3 > bytes.len() {
            return Err(uri_malformed());
        }
        std::str::from_utf8(&bytes[i + 1..i + 3])
            .ok()
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(uri_malformed)
    };
    while i < bytes.len() {
        if bytes[i] != b'%' {
            let c = input[i..].chars().next().ok_or_else(uri_malformed)?;
            output.push(c);
            i += c.len_utf8();
            continue;
        }
        let first = byte_at(i)?;
        let width = match first {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(uri_malformed()),
        };
        let mut sequence = vec![first];
        for k in 1..width {
            sequence.push(byte_at(i + 3 * k)?);
        }
        let decoded = std::str::from_utf8(&sequence).map_err(|_| uri_malformed())?;
        if width == 1 && reserved.contains(first as char) {
            output.push_str(&input[i..i + 3]);
        } else {
            output.push_str(decoded);
        }
        i += 3 * width;
    }
    Ok(output)
}

fn encode_uri_component(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(encode(&string_arg(&args), "")))
}

fn encode_uri(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(encode(&string_arg(&args), URI_RESERVED)))
}

fn decode_uri_component(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    decode(&string_arg(&args), "").map(JsValue::String)
}

fn decode_uri(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    decode(&string_arg(&args), URI_RESERVED).map(JsValue::String)
}

/// eval(code): runs in the caller's scope. Non-string arguments are
/// returned unchanged.
fn eval(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    match args.into_iter().next() {
        Some(JsValue::String(code)) => ctx.run_script(&code),
        Some(other) => Ok(other),
        None => Ok(JsValue::Undefined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(run("parseInt('  42px');"), JsValue::number(42.0));
        assert_eq!(run("parseInt('0x1f');"), JsValue::number(31.0));
        assert_eq!(run("parseInt('-z', 36);"), JsValue::number(-35.0));
        assert_eq!(run("isNaN(parseInt('abc'));"), JsValue::Boolean(true));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(run("parseFloat('3.5e2abc');"), JsValue::number(350.0));
        assert_eq!(run("parseFloat('.5');"), JsValue::number(0.5));
        assert_eq!(run("parseFloat('-Infinityx');"), JsValue::number(f64::NEG_INFINITY));
    }

    #[test]
    fn test_base64() {
        assert_eq!(run("atob('aGVsbG8=');"), JsValue::string("hello"));
        assert_eq!(run("btoa('hello');"), JsValue::string("aGVsbG8="));
        assert_eq!(run("atob(btoa('\\xff\\x00a'));"), JsValue::string("\u{ff}\u{0}a"));
        assert!(EvalContext::new().run_script("atob('a');").is_err());
    }

    #[test]
    fn test_escape_round_trip() {
        assert_eq!(run("escape('a b\\u0100');"), JsValue::string("a%20b%u0100"));
        assert_eq!(run("unescape('%41%u0042%zz');"), JsValue::string("AB%zz"));
    }

    #[test]
    fn test_uri_functions() {
        assert_eq!(run("encodeURIComponent('a b/é');"), JsValue::string("a%20b%2F%C3%A9"));
        assert_eq!(run("encodeURI('/a b?x=1');"), JsValue::string("/a%20b?x=1"));
        assert_eq!(run("decodeURIComponent('%C3%A9%2F');"), JsValue::string("é/"));
        assert_eq!(run("decodeURI('%2F%20');"), JsValue::string("%2F "));
        assert!(EvalContext::new().run_script("decodeURIComponent('%E0%A4%A');").is_err());
    }

    #[test]
    fn test_eval_sees_caller_scope() {
        assert_eq!(run("function f() { var x = 2; return eval('x * 3'); } f();"), JsValue::number(6.0));
        assert_eq!(run("eval('var g = 5;'); g;"), JsValue::number(5.0));
        assert_eq!(run("eval(7);"), JsValue::number(7.0));
    }
}
