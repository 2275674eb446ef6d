//! Integration tests for the interpreter that backs the sandbox.
//!
//! These tests run JavaScript source through `EvalContext::run_script` and
//! check completion values, with an emphasis on the constructs string
//! decoders are built from.

extern crate jsdeob;

use jsdeob::runner::ds::error::JErrorType;
use jsdeob::runner::ds::value::{JsNumberType, JsValue};
use jsdeob::runner::plugin::types::EvalContext;

/// Helper to run JavaScript code, returning the last expression's value.
fn run_js(code: &str) -> Result<JsValue, JErrorType> {
    EvalContext::new().run_script(code)
}

fn int(n: i64) -> JsValue {
    JsValue::Number(JsNumberType::Integer(n))
}

fn string(s: &str) -> JsValue {
    JsValue::String(s.to_string())
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_arithmetic() {
    assert_eq!(run_js("2 * (3 + 4);").unwrap(), int(14));
    assert_eq!(run_js("7 % 3;").unwrap(), int(1));
    assert_eq!(run_js("1 / 2;").unwrap(), JsValue::Number(JsNumberType::Float(0.5)));
    assert_eq!(run_js("1 / 0;").unwrap(), JsValue::Number(JsNumberType::PositiveInfinity));
}

#[test]
fn test_string_concatenation_coerces() {
    assert_eq!(run_js("'a' + 1 + 2;").unwrap(), string("a12"));
    assert_eq!(run_js("1 + 2 + 'a';").unwrap(), string("3a"));
    assert_eq!(run_js("'' + null + undefined + true;").unwrap(), string("nullundefinedtrue"));
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(run_js("0xff ^ 0x0f;").unwrap(), int(0xf0));
    assert_eq!(run_js("-1 >>> 28;").unwrap(), int(15));
    assert_eq!(run_js("1 << 31;").unwrap(), int(-2147483648));
    assert_eq!(run_js("~5;").unwrap(), int(-6));
}

#[test]
fn test_equality() {
    assert_eq!(run_js("'1' == 1;").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("'1' === 1;").unwrap(), JsValue::Boolean(false));
    assert_eq!(run_js("null == undefined;").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("NaN == NaN;").unwrap(), JsValue::Boolean(false));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(run_js("0 || 'x';").unwrap(), string("x"));
    assert_eq!(run_js("'a' && 'b';").unwrap(), string("b"));
    assert_eq!(run_js("!'';").unwrap(), JsValue::Boolean(true));
}

#[test]
fn test_typeof() {
    assert_eq!(run_js("typeof 1;").unwrap(), string("number"));
    assert_eq!(run_js("typeof notDeclared;").unwrap(), string("undefined"));
    assert_eq!(run_js("typeof function () {};").unwrap(), string("function"));
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_loops() {
    assert_eq!(
        run_js("var s = 0; for (var i = 0; i < 5; i++) { s += i; } s;").unwrap(),
        int(10)
    );
    assert_eq!(
        run_js("var n = 3, out = ''; while (n--) { out += n; } out;").unwrap(),
        string("210")
    );
    assert_eq!(
        run_js("var keys = ''; var o = {a: 1, b: 2}; for (var k in o) { keys += k; } keys;").unwrap(),
        string("ab")
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        run_js("var s = ''; for (var i = 0; i < 10; i++) { if (i == 2) continue; if (i == 4) break; s += i; } s;").unwrap(),
        string("013")
    );
}

#[test]
fn test_switch() {
    let code = "function f(x) { switch (x) { case 1: return 'one'; case 2: case 3: return 'few'; default: return 'many'; } } f(1) + f(3) + f(9);";
    assert_eq!(run_js(code).unwrap(), string("onefewmany"));
}

#[test]
fn test_try_catch_finally() {
    assert_eq!(
        run_js("var r; try { null.x; } catch (e) { r = e.name; } r;").unwrap(),
        string("TypeError")
    );
    assert_eq!(
        run_js("var r = ''; try { throw 'x'; } catch (e) { r += e; } finally { r += 'f'; } r;").unwrap(),
        string("xf")
    );
}

#[test]
fn test_uncaught_throw_is_an_error() {
    assert!(run_js("throw new Error('boom');").is_err());
    assert!(matches!(run_js("notDeclared + 1;"), Err(JErrorType::ReferenceError(_))));
}

// ============================================================================
// Functions and objects
// ============================================================================

#[test]
fn test_hoisting() {
    assert_eq!(run_js("f(); function f() { return 1; }").unwrap(), int(1));
    assert_eq!(run_js("typeof v; var v = 1;").unwrap(), string("undefined"));
}

#[test]
fn test_closures() {
    let code = "function counter() { var n = 0; return function () { return ++n; }; } var c = counter(); c(); c();";
    assert_eq!(run_js(code).unwrap(), int(2));
}

#[test]
fn test_arguments_and_this() {
    assert_eq!(run_js("function f() { return arguments.length; } f(1, 2, 3);").unwrap(), int(3));
    assert_eq!(run_js("var o = {v: 7, get: function () { return this.v; }}; o.get();").unwrap(), int(7));
}

#[test]
fn test_constructors_and_prototypes() {
    let code = "function P(x) { this.x = x; } P.prototype.twice = function () { return this.x * 2; }; new P(4).twice();";
    assert_eq!(run_js(code).unwrap(), int(8));
}

#[test]
fn test_call_and_apply() {
    assert_eq!(
        run_js("function f(a, b) { return this.k + a + b; } f.call({k: 1}, 2, 3) + f.apply({k: 1}, [2, 3]);").unwrap(),
        int(12)
    );
}

// ============================================================================
// Globals
// ============================================================================

#[test]
fn test_window_aliases_global_object() {
    assert_eq!(run_js("var g = 5; window.g + globalThis['g'] + self.g;").unwrap(), int(15));
}

#[test]
fn test_typical_decoder() {
    let code = "var _0x = ['\\x68\\x65', 'llo'];\n\
                function dec(i) { return _0x[i ^ 1]; }\n\
                dec(1) + dec(0);";
    assert_eq!(run_js(code).unwrap(), string("hello"));
}

#[test]
fn test_char_code_decoder() {
    let code = "var s = ''; var codes = [105, 102, 106]; for (var i = 0; i < codes.length; i++) { s += String.fromCharCode(codes[i] - 1); } s;";
    assert_eq!(run_js(code).unwrap(), string("hei"));
}
