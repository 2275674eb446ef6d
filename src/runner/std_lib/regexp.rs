//! RegExp built-in.
//!
//! Patterns are translated to the `regex` crate's syntax. Lookaround and
//! backreferences have no counterpart there and raise a `SyntaxError`.
//! Match positions are exposed in UTF-16 units, as scripts expect.

use regex::Regex;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind, RegExpData};
use crate::runner::ds::operations::type_conversion::{to_integer, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the RegExp built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let regexp = BuiltInObject::new("RegExp")
        .with_constructor(regexp_constructor)
        .add_method("test", regexp_test)
        .add_method("exec", regexp_exec)
        .add_method("toString", regexp_to_string);

    registry.register_object(regexp);
}

/// Creates a RegExp object from pattern source and flags.
pub fn new_regexp(source: &str, flags: &str) -> Result<JsValue, JErrorType> {
    let matcher = compile(source, flags)?;
    let mut object = JsObject::new(ObjectKind::RegExp(RegExpData {
        source: source.to_string(),
        flags: flags.to_string(),
        matcher,
    }));
    object.set_own("lastIndex", JsValue::number(0.0));
    Ok(JsValue::Object(std::rc::Rc::new(std::cell::RefCell::new(object))))
}

/// Compiles a JavaScript pattern with its flags.
pub fn compile(source: &str, flags: &str) -> Result<Regex, JErrorType> {
    let mut inline = String::new();
    for (i, flag) in flags.chars().enumerate() {
        if flags[..i].contains(flag) {
            return Err(invalid_flags(flags));
        }
        match flag {
            'i' | 'm' | 's' => inline.push(flag),
            'g' | 'y' | 'u' => {}
            _ => return Err(invalid_flags(flags)),
        }
    }
    let translated = translate_pattern(source)?;
    let full = if inline.is_empty() {
        translated
    } else {
        format!("(?{}){}", inline, translated)
    };
    Regex::new(&full).map_err(|e| {
        JErrorType::SyntaxError(format!("Invalid regular expression: /{}/: {}", source, e))
    })
}

fn invalid_flags(flags: &str) -> JErrorType {
    JErrorType::SyntaxError(format!("Invalid regular expression flags '{}'", flags))
}

fn unsupported(source: &str, what: &str) -> JErrorType {
    JErrorType::SyntaxError(format!(
        "Invalid regular expression: /{}/: {} is not supported",
        source, what
    ))
}

fn take_hex(chars: &[char], start: usize, count: usize) -> Option<u32> {
    if start + count > chars.len() {
        return None;
    }
    let digits: String = chars[start..start + count].iter().collect();
    u32::from_str_radix(&digits, 16).ok()
}

/// Rewrites JavaScript regular expression syntax into `regex` syntax.
pub fn translate_pattern(source: &str) -> Result<String, JErrorType> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let next = match chars.get(i + 1) {
                    Some(n) => *n,
                    None => return Err(unsupported(source, "a trailing backslash")),
                };
                i += 2;
                match next {
                    'd' => out.push_str(if in_class { "0-9" } else { "[0-9]" }),
                    'D' => out.push_str(if in_class { "\\D" } else { "[^0-9]" }),
                    'w' => out.push_str(if in_class { "0-9A-Za-z_" } else { "[0-9A-Za-z_]" }),
                    'W' => out.push_str(if in_class { "\\W" } else { "[^0-9A-Za-z_]" }),
                    's' | 'S' | 'n' | 'r' | 't' | 'f' | 'v' => {
                        out.push('\\');
                        out.push(next);
                    }
                    'b' | 'B' if !in_class => {
                        out.push('\\');
                        out.push(next);
                    }
                    'b' => out.push_str("\\x{8}"),
                    '0' => out.push_str("\\x{0}"),
                    '1'..='9' => return Err(unsupported(source, "a backreference")),
                    'u' | 'x' => {
                        let count = if next == 'u' { 4 } else { 2 };
                        match take_hex(&chars, i, count) {
                            Some(code) => {
                                out.push_str(&format!("\\x{{{:X}}}", code));
                                i += count;
                            }
                            None => out.push(next),
                        }
                    }
                    'c' => match chars.get(i) {
                        Some(l) if l.is_ascii_alphabetic() => {
                            out.push_str(&format!("\\x{{{:X}}}", (*l as u32) % 32));
                            i += 1;
                        }
                        _ => out.push_str("\\\\c"),
                    },
                    other => out.push_str(&regex::escape(&other.to_string())),
                }
                continue;
            }
            '[' if !in_class => {
                if chars.get(i + 1) == Some(&'^') && chars.get(i + 2) == Some(&']') {
                    out.push_str("[\\s\\S]");
                    i += 3;
                    continue;
                }
                if chars.get(i + 1) == Some(&']') {
                    out.push_str("[^\\s\\S]");
                    i += 2;
                    continue;
                }
                in_class = true;
                out.push('[');
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
            }
            '[' => out.push_str("\\["),
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            ']' => out.push_str("\\]"),
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '(' if !in_class && chars.get(i + 1) == Some(&'?') => match chars.get(i + 2) {
                Some(':') => out.push('('),
                Some('<') if matches!(chars.get(i + 3), Some('=') | Some('!')) => {
                    return Err(unsupported(source, "lookbehind"))
                }
                Some('=') | Some('!') => return Err(unsupported(source, "lookahead")),
                Some('<') => out.push('('),
                _ => return Err(unsupported(source, "this group")),
            },
            _ => out.push(c),
        }
        i += 1;
    }
    Ok(out)
}

/// Converts a UTF-16 offset into a byte offset of `s`, clamped to its length.
pub fn utf16_to_byte(s: &str, index: usize) -> usize {
    let mut units = 0;
    for (byte, c) in s.char_indices() {
        if units >= index {
            return byte;
        }
        units += c.len_utf16();
    }
    s.len()
}

pub fn byte_to_utf16(s: &str, byte: usize) -> usize {
    s[..byte].encode_utf16().count()
}

/// One successful match, positions in UTF-16 units.
pub struct MatchData {
    pub index: usize,
    pub end: usize,
    pub matched: String,
    pub groups: Vec<Option<String>>,
}

fn regexp_of(value: &JsValue) -> Result<JsObjectType, JErrorType> {
    match value {
        JsValue::Object(o) if matches!(o.borrow().kind, ObjectKind::RegExp(_)) => Ok(o.clone()),
        _ => Err(JErrorType::TypeError(format!(
            "{} is not a regular expression",
            to_string(value)
        ))),
    }
}

/// Runs the matcher from `start` (a UTF-16 offset).
pub fn match_at(re: &Regex, s: &str, start: usize) -> Option<MatchData> {
    let byte_start = utf16_to_byte(s, start);
    let captures = re.captures_at(s, byte_start)?;
    let whole = captures.get(0)?;
    Some(MatchData {
        index: byte_to_utf16(s, whole.start()),
        end: byte_to_utf16(s, whole.end()),
        matched: whole.as_str().to_string(),
        groups: captures
            .iter()
            .skip(1)
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect(),
    })
}

/// `RegExpBuiltinExec`: honours and updates `lastIndex` for global and
/// sticky expressions.
pub fn exec_raw(regexp: &JsObjectType, s: &str) -> Result<Option<MatchData>, JErrorType> {
    let (matcher, uses_last_index, sticky) = match &regexp.borrow().kind {
        ObjectKind::RegExp(data) => (
            data.matcher.clone(),
            data.is_global() || data.is_sticky(),
            data.is_sticky(),
        ),
        _ => return Err(JErrorType::TypeError("not a regular expression".to_string())),
    };
    let length = s.encode_utf16().count();
    let start = if uses_last_index {
        let last_index = regexp
            .borrow()
            .get_own("lastIndex")
            .map(|p| match p {
                crate::runner::ds::object::Property::Data(v) => to_integer(&v),
                _ => 0.0,
            })
            .unwrap_or(0.0);
        if last_index < 0.0 || last_index > length as f64 {
            regexp.borrow_mut().set_own("lastIndex", JsValue::number(0.0));
            return Ok(None);
        }
        last_index as usize
    } else {
        0
    };
    let found = match_at(&matcher, s, start).filter(|m| !sticky || m.index == start);
    if uses_last_index {
        let next = found.as_ref().map(|m| m.end).unwrap_or(0);
        regexp.borrow_mut().set_own("lastIndex", JsValue::number(next as f64));
    }
    Ok(found)
}

/// Builds the array `exec` and `match` return.
pub fn match_to_array(found: MatchData, input: &str) -> JsValue {
    let mut elements = vec![JsValue::String(found.matched)];
    elements.extend(
        found
            .groups
            .into_iter()
            .map(|g| g.map(JsValue::String).unwrap_or(JsValue::Undefined)),
    );
    let array = JsObject::new_array(elements);
    {
        let mut array_ref = array.borrow_mut();
        array_ref.set_own("index", JsValue::number(found.index as f64));
        array_ref.set_own("input", JsValue::string(input));
    }
    JsValue::Object(array)
}

/// RegExp constructor.
fn regexp_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let pattern = args.first().cloned().unwrap_or(JsValue::Undefined);
    let flags = match args.get(1) {
        None | Some(JsValue::Undefined) => None,
        Some(f) => Some(to_string(f)),
    };
    if let JsValue::Object(o) = &pattern {
        if let ObjectKind::RegExp(data) = &o.borrow().kind {
            let flags = flags.unwrap_or_else(|| data.flags.clone());
            return new_regexp(&data.source, &flags);
        }
    }
    let source = match pattern {
        JsValue::Undefined => "(?:)".to_string(),
        other => to_string(&other),
    };
    new_regexp(&source, &flags.unwrap_or_default())
}

/// RegExp.prototype.test
fn regexp_test(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let regexp = regexp_of(&this)?;
    let input = to_string(args.first().unwrap_or(&JsValue::Undefined));
    Ok(JsValue::Boolean(exec_raw(&regexp, &input)?.is_some()))
}

/// RegExp.prototype.exec
fn regexp_exec(
    _ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let regexp = regexp_of(&this)?;
    let input = to_string(args.first().unwrap_or(&JsValue::Undefined));
    Ok(match exec_raw(&regexp, &input)? {
        Some(found) => match_to_array(found, &input),
        None => JsValue::Null,
    })
}

/// RegExp.prototype.toString
fn regexp_to_string(
    _ctx: &mut EvalContext,
    this: JsValue,
    _args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    regexp_of(&this)?;
    Ok(JsValue::String(to_string(&this)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_classes_and_escapes() {
        assert_eq!(translate_pattern("\\d+").unwrap(), "[0-9]+");
        assert_eq!(translate_pattern("[\\w$]").unwrap(), "[0-9A-Za-z_$]");
        assert_eq!(translate_pattern("[^]").unwrap(), "[\\s\\S]");
        assert_eq!(translate_pattern("\\u0041").unwrap(), "\\x{41}");
        assert_eq!(translate_pattern("a\\/b").unwrap(), "a/b");
    }

    #[test]
    fn test_unsupported_syntax_is_a_syntax_error() {
        assert!(matches!(translate_pattern("a(?=b)"), Err(JErrorType::SyntaxError(_))));
        assert!(matches!(translate_pattern("(a)\\1"), Err(JErrorType::SyntaxError(_))));
        assert!(matches!(compile("a", "gq"), Err(JErrorType::SyntaxError(_))));
    }

    #[test]
    fn test_flags_apply() {
        assert!(compile("abc", "i").unwrap().is_match("ABC"));
        assert!(compile("^b", "m").unwrap().is_match("a\nb"));
        assert!(!compile("^b", "").unwrap().is_match("a\nb"));
    }

    #[test]
    fn test_utf16_offsets() {
        let s = "\u{e9}a\u{1F600}b";
        assert_eq!(utf16_to_byte(s, 2), 3);
        assert_eq!(byte_to_utf16(s, 7), 4);
        let m = match_at(&compile("b", "").unwrap(), s, 0).unwrap();
        assert_eq!((m.index, m.end), (4, 5));
    }

    #[test]
    fn test_global_exec_advances_last_index() {
        let mut ctx = EvalContext::new();
        let result = ctx
            .run_script("var re = /o/g; var s = 'foo'; re.exec(s); re.lastIndex + ',' + re.exec(s).index + ',' + re.exec(s);")
            .unwrap();
        assert_eq!(result, JsValue::string("2,2,null"));
    }
}
