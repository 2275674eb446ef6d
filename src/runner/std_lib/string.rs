//! String built-in.
//!
//! Provides String constructor and prototype methods. Positions and lengths
//! are counted in UTF-16 code units.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::operations::type_conversion::{
    is_js_whitespace, to_integer, to_string, to_uint16, to_uint32,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};
use crate::runner::std_lib::regexp::{
    byte_to_utf16, exec_raw, match_at, match_to_array, new_regexp, MatchData,
};

/// Register the String built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let string = BuiltInObject::new("String")
        .with_constructor(string_constructor)
        .add_static_method("fromCharCode", string_from_char_code)
        .add_method("charAt", string_char_at)
        .add_method("charCodeAt", string_char_code_at)
        .add_method("indexOf", string_index_of)
        .add_method("lastIndexOf", string_last_index_of)
        .add_method("slice", string_slice)
        .add_method("substring", string_substring)
        .add_method("substr", string_substr)
        .add_method("split", string_split)
        .add_method("replace", string_replace)
        .add_method("match", string_match)
        .add_method("toUpperCase", string_to_upper_case)
        .add_method("toLowerCase", string_to_lower_case)
        .add_method("trim", string_trim)
        .add_method("concat", string_concat)
        .add_method("toString", string_value_of)
        .add_method("valueOf", string_value_of);

    registry.register_object(string);
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

/// Resolves a relative position argument (negative counts from the end).
fn relative_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer(value);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamp_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    to_integer(value).max(0.0).min(len as f64) as usize
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn as_regexp(value: &JsValue) -> Option<JsObjectType> {
    match value {
        JsValue::Object(o) if matches!(o.borrow().kind, ObjectKind::RegExp(_)) => Some(o.clone()),
        _ => None,
    }
}

fn regexp_is_global(regexp: &JsObjectType) -> bool {
    matches!(&regexp.borrow().kind, ObjectKind::RegExp(data) if data.is_global())
}

/// String constructor.
fn string_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(match args.first() {
        Some(v) => JsValue::String(to_string(v)),
        None => JsValue::string(""),
    })
}

/// String.fromCharCode
fn string_from_char_code(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let codes: Vec<u16> = args.iter().map(to_uint16).collect();
    Ok(JsValue::String(from_units(&codes)))
}

/// String.prototype.charAt
fn string_char_at(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let index = to_integer(&arg(&args, 0));
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JsValue::string(""));
    }
    Ok(JsValue::String(from_units(&s[index as usize..index as usize + 1])))
}

/// String.prototype.charCodeAt
fn string_char_code_at(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let index = to_integer(&arg(&args, 0));
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JsValue::number(f64::NAN));
    }
    Ok(JsValue::number(s[index as usize] as f64))
}

/// String.prototype.indexOf
fn string_index_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let needle = units(&to_string(&arg(&args, 0)));
    let from = clamp_index(&arg(&args, 1), s.len(), 0);
    Ok(JsValue::number(
        find_units(&s, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
    ))
}

/// String.prototype.lastIndexOf
fn string_last_index_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let needle = units(&to_string(&arg(&args, 0)));
    if needle.len() > s.len() {
        return Ok(JsValue::number(-1.0));
    }
    let last_start = s.len() - needle.len();
    let from = match arg(&args, 1) {
        JsValue::Undefined => last_start,
        v => {
            let n = crate::runner::ds::operations::type_conversion::to_number(&v);
            if n.is_nan() {
                last_start
            } else {
                (n.trunc().max(0.0) as usize).min(last_start)
            }
        }
    };
    let found = (0..=from).rev().find(|&i| s[i..i + needle.len()] == needle[..]);
    Ok(JsValue::number(found.map(|i| i as f64).unwrap_or(-1.0)))
}

/// String.prototype.slice
fn string_slice(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let start = relative_index(&arg(&args, 0), s.len(), 0);
    let end = relative_index(&arg(&args, 1), s.len(), s.len());
    if start >= end {
        return Ok(JsValue::string(""));
    }
    Ok(JsValue::String(from_units(&s[start..end])))
}

/// String.prototype.substring
fn string_substring(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let a = clamp_index(&arg(&args, 0), s.len(), 0);
    let b = clamp_index(&arg(&args, 1), s.len(), s.len());
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(JsValue::String(from_units(&s[start..end])))
}

/// String.prototype.substr
fn string_substr(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = units(&to_string(&this));
    let start = relative_index(&arg(&args, 0), s.len(), 0);
    let length = match arg(&args, 1) {
        JsValue::Undefined => s.len(),
        v => to_integer(&v).max(0.0) as usize,
    };
    let end = start.saturating_add(length).min(s.len());
    if start >= end {
        return Ok(JsValue::string(""));
    }
    Ok(JsValue::String(from_units(&s[start..end])))
}

/// String.prototype.split
fn string_split(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = to_string(&this);
    let limit = match arg(&args, 1) {
        JsValue::Undefined => u32::MAX as usize,
        v => to_uint32(&v) as usize,
    };
    let separator = arg(&args, 0);
    let mut parts: Vec<JsValue> = vec![];
    if limit == 0 {
        return Ok(JsValue::Object(crate::runner::ds::object::JsObject::new_array(parts)));
    }
    if let Some(regexp) = as_regexp(&separator) {
        let matcher = match &regexp.borrow().kind {
            ObjectKind::RegExp(data) => data.matcher.clone(),
            _ => return Err(JErrorType::TypeError("not a regular expression".to_string())),
        };
        if s.is_empty() {
            if !matcher.is_match("") {
                parts.push(JsValue::string(""));
            }
        } else {
            let mut last = 0;
            for captures in matcher.captures_iter(&s) {
                let whole = match captures.get(0) {
                    Some(m) => m,
                    None => continue,
                };
                if whole.start() == whole.end() && (whole.start() == 0 || whole.start() >= s.len()) {
                    continue;
                }
                if whole.end() == last && whole.start() == whole.end() {
                    continue;
                }
                parts.push(JsValue::string(&s[last..whole.start()]));
                for group in captures.iter().skip(1) {
                    parts.push(match group {
                        Some(g) => JsValue::string(g.as_str()),
                        None => JsValue::Undefined,
                    });
                }
                last = whole.end();
            }
            parts.push(JsValue::string(&s[last..]));
        }
    } else if matches!(separator, JsValue::Undefined) {
        parts.push(JsValue::String(s));
    } else {
        let separator = to_string(&separator);
        if separator.is_empty() {
            parts.extend(s.encode_utf16().map(|u| JsValue::String(from_units(&[u]))));
        } else {
            parts.extend(s.split(separator.as_str()).map(JsValue::string));
        }
    }
    parts.truncate(limit);
    Ok(JsValue::Object(crate::runner::ds::object::JsObject::new_array(parts)))
}

/// Expands `$` patterns of a replacement string.
fn expand_replacement(template: &str, found: &MatchData, input: &[u16]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&found.matched);
                i += 2;
            }
            '`' => {
                out.push_str(&from_units(&input[..found.index]));
                i += 2;
            }
            '\'' => {
                out.push_str(&from_units(&input[found.end..]));
                i += 2;
            }
            d if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|d2| one * 10 + d2 as usize);
                let (group, width) = match two {
                    Some(n) if n >= 1 && n <= found.groups.len() => (n, 3),
                    _ => (one, 2),
                };
                if group >= 1 && group <= found.groups.len() {
                    if let Some(text) = &found.groups[group - 1] {
                        out.push_str(text);
                    }
                    i += width;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

fn replacement_for(
    ctx: &mut EvalContext,
    replacement: &JsValue,
    found: &MatchData,
    input: &str,
    input_units: &[u16],
) -> Result<String, JErrorType> {
    let callable = matches!(replacement, JsValue::Object(o) if o.borrow().is_callable());
    if callable {
        let mut call_args = vec![JsValue::String(found.matched.clone())];
        call_args.extend(
            found
                .groups
                .iter()
                .map(|g| g.clone().map(JsValue::String).unwrap_or(JsValue::Undefined)),
        );
        call_args.push(JsValue::number(found.index as f64));
        call_args.push(JsValue::string(input));
        let result = ctx.call_function(replacement, JsValue::Undefined, call_args)?;
        Ok(to_string(&result))
    } else {
        Ok(expand_replacement(&to_string(replacement), found, input_units))
    }
}

/// String.prototype.replace
fn string_replace(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = to_string(&this);
    let s_units = units(&s);
    let pattern = arg(&args, 0);
    let replacement = arg(&args, 1);

    let mut matches: Vec<MatchData> = vec![];
    if let Some(regexp) = as_regexp(&pattern) {
        if regexp_is_global(&regexp) {
            let matcher = match &regexp.borrow().kind {
                ObjectKind::RegExp(data) => data.matcher.clone(),
                _ => return Err(JErrorType::TypeError("not a regular expression".to_string())),
            };
            let mut position = 0;
            while position <= s_units.len() {
                let found = match match_at(&matcher, &s, position) {
                    Some(m) => m,
                    None => break,
                };
                position = if found.end == found.index { found.end + 1 } else { found.end };
                matches.push(found);
            }
            regexp
                .borrow_mut()
                .set_own("lastIndex", JsValue::number(0.0));
        } else if let Some(found) = exec_raw(&regexp, &s)? {
            matches.push(found);
        }
    } else {
        let needle = to_string(&pattern);
        if let Some(byte) = s.find(needle.as_str()) {
            let index = byte_to_utf16(&s, byte);
            matches.push(MatchData {
                index,
                end: index + needle.encode_utf16().count(),
                matched: needle,
                groups: vec![],
            });
        }
    }

    let mut out: Vec<u16> = vec![];
    let mut last = 0;
    for found in &matches {
        out.extend_from_slice(&s_units[last..found.index]);
        let text = replacement_for(ctx, &replacement, found, &s, &s_units)?;
        out.extend(text.encode_utf16());
        last = found.end;
    }
    out.extend_from_slice(&s_units[last..]);
    Ok(JsValue::String(from_units(&out)))
}

/// String.prototype.match
fn string_match(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = to_string(&this);
    let pattern = arg(&args, 0);
    let regexp = match as_regexp(&pattern) {
        Some(r) => r,
        None => {
            let source = match pattern {
                JsValue::Undefined => String::new(),
                other => regex::escape(&to_string(&other)),
            };
            match new_regexp(&source, "")? {
                JsValue::Object(o) => o,
                _ => return Ok(JsValue::Null),
            }
        }
    };
    if !regexp_is_global(&regexp) {
        return Ok(match exec_raw(&regexp, &s)? {
            Some(found) => match_to_array(found, &s),
            None => JsValue::Null,
        });
    }
    let matcher = match &regexp.borrow().kind {
        ObjectKind::RegExp(data) => data.matcher.clone(),
        _ => return Ok(JsValue::Null),
    };
    let all: Vec<JsValue> = matcher
        .find_iter(&s)
        .map(|m| JsValue::string(m.as_str()))
        .collect();
    regexp
        .borrow_mut()
        .set_own("lastIndex", JsValue::number(0.0));
    if all.is_empty() {
        Ok(JsValue::Null)
    } else {
        Ok(JsValue::Object(crate::runner::ds::object::JsObject::new_array(all)))
    }
}

/// String.prototype.toUpperCase
fn string_to_upper_case(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(to_string(&this).to_uppercase()))
}

/// String.prototype.toLowerCase
fn string_to_lower_case(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(to_string(&this).to_lowercase()))
}

/// String.prototype.trim
fn string_trim(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::string(to_string(&this).trim_matches(is_js_whitespace)))
}

/// String.prototype.concat
fn string_concat(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut s = to_string(&this);
    for a in &args {
        s.push_str(&to_string(a));
    }
    Ok(JsValue::String(s))
}

/// String.prototype.valueOf
fn string_value_of(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    match this {
        JsValue::String(_) => Ok(this),
        _ => Err(JErrorType::TypeError(
            "String.prototype.valueOf requires that 'this' be a String".to_string(),
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
    fn test_char_codes() {
        assert_eq!(run("String.fromCharCode(72, 105);"), JsValue::string("Hi"));
        assert_eq!(run("'A'.charCodeAt(0);"), JsValue::number(65.0));
        assert_eq!(run("'abc'.charAt(5);"), JsValue::string(""));
    }

    #[test]
    fn test_slicing() {
        assert_eq!(run("'hello'.slice(-3);"), JsValue::string("llo"));
        assert_eq!(run("'hello'.substring(3, 1);"), JsValue::string("el"));
        assert_eq!(run("'hello'.substr(1, 3);"), JsValue::string("ell"));
        assert_eq!(run("'hello'.indexOf('l');"), JsValue::number(2.0));
        assert_eq!(run("'hello'.lastIndexOf('l');"), JsValue::number(3.0));
    }

    #[test]
    fn test_split() {
        assert_eq!(run("'a,b,c'.split(',').length;"), JsValue::number(3.0));
        assert_eq!(run("'abc'.split('').join('-');"), JsValue::string("a-b-c"));
        assert_eq!(run("'a1b22c'.split(/\\d+/).join();"), JsValue::string("a,b,c"));
        assert_eq!(run("'a,b,c'.split(',', 2).join();"), JsValue::string("a,b"));
    }

    #[test]
    fn test_replace() {
        assert_eq!(run("'aaa'.replace('a', 'b');"), JsValue::string("baa"));
        assert_eq!(run("'aaa'.replace(/a/g, 'b');"), JsValue::string("bbb"));
        assert_eq!(run("'john smith'.replace(/(\\w+) (\\w+)/, '$2 $1');"), JsValue::string("smith john"));
        assert_eq!(
            run("'x1y2'.replace(/\\d/g, function (d) { return d * 2; });"),
            JsValue::string("x2y4")
        );
    }

    #[test]
    fn test_match() {
        assert_eq!(run("'a1b2'.match(/\\d/g).join();"), JsValue::string("1,2"));
        assert_eq!(run("'abc'.match(/x/);"), JsValue::Null);
        assert_eq!(run("'abc'.match(/b(c)/)[1];"), JsValue::string("c"));
    }
}
