//! Tests for standard library built-in functions.
//!
//! These tests verify the built-ins decoders lean on: String, Array,
//! Math, Number, JSON, RegExp and the global codec functions.

extern crate jsdeob;

use jsdeob::runner::ds::value::{JsNumberType, JsValue};
use jsdeob::runner::plugin::registry::BuiltInRegistry;
use jsdeob::runner::plugin::types::EvalContext;

fn eval(code: &str) -> JsValue {
    EvalContext::new()
        .run_script(code)
        .unwrap_or_else(|e| panic!("{} failed: {:?}", code, e))
}

fn string(s: &str) -> JsValue {
    JsValue::String(s.to_string())
}

fn int(n: i64) -> JsValue {
    JsValue::Number(JsNumberType::Integer(n))
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_core_registry_contents() {
    let registry = BuiltInRegistry::with_core();
    for name in ["Array", "String", "Math", "JSON", "RegExp", "Object", "Number"] {
        assert!(registry.has_object(name), "missing {}", name);
    }
    assert!(registry.has_method("String", "charCodeAt"));
    assert!(!registry.has_method("String", "padStart"));
}

// ============================================================================
// String tests
// ============================================================================

mod string_tests {
    use super::*;

    #[test]
    fn test_char_access() {
        assert_eq!(eval("'abc'.charAt(1);"), string("b"));
        assert_eq!(eval("'abc'.charCodeAt(2);"), int(99));
        assert_eq!(eval("String.fromCharCode(104, 105);"), string("hi"));
        assert_eq!(eval("'abc'[0];"), string("a"));
        assert_eq!(eval("'abc'.length;"), int(3));
    }

    #[test]
    fn test_slicing() {
        assert_eq!(eval("'deobfuscate'.slice(2, 5);"), string("obf"));
        assert_eq!(eval("'deobfuscate'.slice(-4);"), string("cate"));
        assert_eq!(eval("'deobfuscate'.substring(5, 2);"), string("obf"));
        assert_eq!(eval("'deobfuscate'.substr(2, 3);"), string("obf"));
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(eval("'a|b|c'.split('|').join('-');"), string("a-b-c"));
        assert_eq!(eval("'abc'.split('').length;"), int(3));
        assert_eq!(eval("'a1b2c'.split(/\\d/).join('');"), string("abc"));
    }

    #[test]
    fn test_replace() {
        assert_eq!(eval("'aaa'.replace('a', 'b');"), string("baa"));
        assert_eq!(eval("'aaa'.replace(/a/g, 'b');"), string("bbb"));
        assert_eq!(
            eval("'x1y2'.replace(/\\d/g, function (d) { return '<' + d + '>'; });"),
            string("x<1>y<2>")
        );
        assert_eq!(eval("'john smith'.replace(/(\\w+) (\\w+)/, '$2 $1');"), string("smith john"));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval("' Ab '.trim().toUpperCase();"), string("AB"));
        assert_eq!(eval("'Ab'.toLowerCase();"), string("ab"));
        assert_eq!(eval("'abcabc'.lastIndexOf('b');"), int(4));
    }
}

// ============================================================================
// Array tests
// ============================================================================

mod array_tests {
    use super::*;

    #[test]
    fn test_mutation() {
        assert_eq!(eval("var a = [1, 2]; a.push(3); a.length;"), int(3));
        assert_eq!(eval("var a = [1, 2, 3]; a.shift() + a.pop();"), int(4));
        assert_eq!(eval("var a = [3, 4]; a.unshift(1, 2); a.join('');"), string("1234"));
    }

    #[test]
    fn test_rotation_loop() {
        // The classic string-array rotation prologue.
        let code = "var a = ['c', 'a', 'b']; (function (arr, n) { while (--n) { arr.push(arr.shift()); } }(a, 2)); a.join('');";
        assert_eq!(eval(code), string("abc"));
    }

    #[test]
    fn test_higher_order() {
        assert_eq!(eval("[1, 2, 3].map(function (x) { return x * 2; }).join(',');"), string("2,4,6"));
        assert_eq!(eval("[1, 2, 3, 4].filter(function (x) { return x % 2; }).length;"), int(2));
        assert_eq!(eval("[1, 2, 3].reduce(function (a, b) { return a + b; }, 0);"), int(6));
    }

    #[test]
    fn test_slice_concat_reverse() {
        assert_eq!(eval("[1, 2, 3, 4].slice(1, 3).join('');"), string("23"));
        assert_eq!(eval("[1].concat([2], 3).join('');"), string("123"));
        assert_eq!(eval("[1, 2, 3].reverse().join('');"), string("321"));
        assert_eq!(eval("[1, 2, 3].indexOf(3);"), int(2));
    }
}

// ============================================================================
// Math and Number tests
// ============================================================================

mod number_tests {
    use super::*;

    #[test]
    fn test_math() {
        assert_eq!(eval("Math.floor(7 / 2);"), int(3));
        assert_eq!(eval("Math.max(1, 9, 4);"), int(9));
        assert_eq!(eval("Math.abs(-5);"), int(5));
        assert_eq!(eval("Math.pow(2, 10);"), int(1024));
    }

    #[test]
    fn test_parsing() {
        assert_eq!(eval("parseInt('ff', 16);"), int(255));
        assert_eq!(eval("parseInt('12px');"), int(12));
        assert_eq!(eval("parseFloat('1.5e1');"), int(15));
        assert_eq!(eval("isNaN(parseInt('x'));"), JsValue::Boolean(true));
    }

    #[test]
    fn test_to_string_radix() {
        assert_eq!(eval("(255).toString(16);"), string("ff"));
        assert_eq!(eval("(35).toString(36);"), string("z"));
        assert_eq!(eval("(1.5).toFixed(2);"), string("1.50"));
    }
}

// ============================================================================
// Global codec functions
// ============================================================================

mod codec_tests {
    use super::*;

    #[test]
    fn test_base64() {
        assert_eq!(eval("atob('aGVsbG8=');"), string("hello"));
        assert_eq!(eval("btoa('hello');"), string("aGVsbG8="));
        assert!(EvalContext::new().run_script("atob('\"hi\"');").is_err());
    }

    #[test]
    fn test_uri_and_escape() {
        assert_eq!(eval("unescape('%41%42');"), string("AB"));
        assert_eq!(eval("escape('a b');"), string("a%20b"));
        assert_eq!(eval("decodeURIComponent('%E2%9C%93');"), string("\u{2713}"));
        assert_eq!(eval("encodeURIComponent('a&b');"), string("a%26b"));
    }

    #[test]
    fn test_json() {
        assert_eq!(eval("JSON.parse('{\"a\": [1, \"x\"]}').a[1];"), string("x"));
        assert_eq!(eval("JSON.stringify({a: 1, b: 'x'});"), string("{\"a\":1,\"b\":\"x\"}"));
    }

    #[test]
    fn test_regexp() {
        assert_eq!(eval("/^[a-f0-9]+$/.test('c0ffee');"), JsValue::Boolean(true));
        assert_eq!(eval("/(\\d+)-(\\d+)/.exec('10-20')[2];"), string("20"));
        assert_eq!(eval("new RegExp('a+', 'g').test('caat');"), JsValue::Boolean(true));
    }
}
