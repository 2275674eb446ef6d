//! Parser and code generator integration tests.
//!
//! Obfuscated input is parsed and regenerated; the expected text is the
//! canonical layout every technique's output is printed in.

extern crate jsdeob;

use jsdeob::parser::ast::{ExpressionType, LiteralType, StatementType};
use jsdeob::parser::codegen::generate;
use jsdeob::parser::JsParser;
use pretty_assertions::assert_eq;

fn regenerate(code: &str) -> String {
    generate(&JsParser::parse_to_ast(code).unwrap_or_else(|e| panic!("{}", e)))
}

#[test]
fn test_minified_function_is_laid_out() {
    assert_eq!(
        regenerate("function a(b,c){var d=b+c;if(d>0){return d;}return -d;}"),
        "function a(b, c) {\n    var d = b + c;\n    if (d > 0) {\n        return d;\n    }\n    return -d;\n}"
    );
}

#[test]
fn test_escaped_strings_are_normalised() {
    assert_eq!(regenerate(r#"var s = "\x68i\"";"#), "var s = 'hi\"';");
    assert_eq!(regenerate(r"f('\x0a');"), r"f('\n');");
}

#[test]
fn test_hex_and_octal_numbers_print_in_decimal() {
    assert_eq!(regenerate("f(0x1f, 017, 1e3, 2.50);"), "f(31, 15, 1000, 2.5);");
}

#[test]
fn test_regex_and_division_are_told_apart() {
    assert_eq!(regenerate("a = b / c / d;"), "a = b / c / d;");
    assert_eq!(regenerate("a = /ab+c/g.test(s);"), "a = /ab+c/g.test(s);");
}

#[test]
fn test_sequences_and_conditionals() {
    assert_eq!(regenerate("a?b:c,d;"), "a ? b : c, d;");
    assert_eq!(regenerate("!0&&(x=1);"), "!0 && (x = 1);");
    assert_eq!(regenerate("void 0===a;"), "void 0 === a;");
}

#[test]
fn test_object_literal_statement_is_parenthesised() {
    assert_eq!(regenerate("({a: 1}).a;"), "({ a: 1 }.a);");
}

#[test]
fn test_try_catch_layout() {
    assert_eq!(
        regenerate("try{a()}catch(e){b(e)}finally{c()}"),
        "try {\n    a();\n} catch (e) {\n    b(e);\n} finally {\n    c();\n}"
    );
}

#[test]
fn test_ast_shape_of_member_call() {
    let program = JsParser::parse_to_ast("window['atob']('aGk=');").unwrap();
    let expression = match &program.body[0] {
        StatementType::ExpressionStatement { expression, .. } => expression,
        other => panic!("unexpected statement {:?}", other),
    };
    let (callee, arguments) = match expression {
        ExpressionType::CallExpression { callee, arguments, .. } => (callee, arguments),
        other => panic!("unexpected expression {:?}", other),
    };
    assert!(matches!(**callee, ExpressionType::MemberExpression(ref m) if m.is_computed()));
    assert_eq!(arguments[0].as_string_literal(), Some("aGk="));
    assert!(matches!(
        arguments[0].as_literal(),
        Some(LiteralType::StringLiteral(_))
    ));
}

#[test]
fn test_syntax_errors_carry_positions() {
    let error = JsParser::parse_to_ast("var a = 1;\nvar = 2;").unwrap_err();
    assert_eq!(error.line_col().0, 2);
}
