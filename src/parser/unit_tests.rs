use super::api::JsParser;
use super::api::Rule;
use super::ast::*;

use pest::{consumes_to, parses_to};

#[test]
fn test_hex_number() {
    parses_to! {
        parser: JsParser,
        input: "0x1F",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 4, [
                hex_integer_literal(0, 4)
            ])
        ]
    };
}

#[test]
fn test_decimal_number_with_exponent() {
    parses_to! {
        parser: JsParser,
        input: "1.5e3",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 5, [
                decimal_literal(0, 5)
            ])
        ]
    };
}

#[test]
fn test_single_quoted_string_with_escaped_quote() {
    parses_to! {
        parser: JsParser,
        input: "'a\\'b'",
        rule: Rule::string_literal,
        tokens: [
            string_literal(0, 6, [
                single_string_characters(1, 5)
            ])
        ]
    };
}

#[test]
fn test_regular_expression_literal() {
    parses_to! {
        parser: JsParser,
        input: "/ab+c/gi",
        rule: Rule::regular_expression_literal,
        tokens: [
            regular_expression_literal(0, 8, [
                regular_expression_body(1, 5),
                regular_expression_flags(6, 8)
            ])
        ]
    };
}

#[test]
fn test_identifier_may_start_with_keyword() {
    parses_to! {
        parser: JsParser,
        input: "variable",
        rule: Rule::identifier,
        tokens: [
            identifier(0, 8)
        ]
    };
}

fn first_statement(code: &str) -> StatementType {
    JsParser::parse_to_ast(code).unwrap().body.remove(0)
}

fn first_expression(code: &str) -> ExpressionType {
    match first_statement(code) {
        StatementType::ExpressionStatement { expression, .. } => expression,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_string_escapes_are_decoded() {
    let expr = first_expression("'\\x61\\u0062\\143\\n';");
    assert_eq!(expr.as_string_literal(), Some("abc\n"));
}

#[test]
fn test_legacy_octal_number() {
    let expr = first_expression("017;");
    assert_eq!(
        expr.as_literal(),
        Some(&LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(15)))
    );
}

#[test]
fn test_binary_operators_are_left_associative() {
    match first_expression("a - b - c;") {
        ExpressionType::BinaryExpression { left, right, .. } => {
            assert!(matches!(*left, ExpressionType::BinaryExpression { .. }));
            assert!(right.is_identifier_named("c"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_logical_operators_build_logical_expressions() {
    assert!(matches!(
        first_expression("a || b && c;"),
        ExpressionType::LogicalExpression {
            operator: LogicalOperator::Or,
            ..
        }
    ));
}

#[test]
fn test_call_on_member_chain() {
    match first_expression("a.b['c'](1, 2);") {
        ExpressionType::CallExpression { callee, arguments, .. } => {
            assert_eq!(arguments.len(), 2);
            assert!(matches!(
                *callee,
                ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression { .. })
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_for_in_with_declaration() {
    match first_statement("for (var k in o) { f(k); }") {
        StatementType::ForInStatement { left, .. } => {
            assert!(matches!(left, VariableDeclarationOrExpression::VariableDeclaration(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_for_statement_with_all_clauses() {
    match first_statement("for (var i = 0; i < 10; i++) {}") {
        StatementType::ForStatement {
            init, test, update, ..
        } => {
            assert!(init.is_some());
            assert!(test.is_some());
            assert!(update.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_array_holes() {
    match first_expression("[1, , 2];") {
        ExpressionType::ArrayExpression { elements, .. } => {
            assert_eq!(elements.len(), 3);
            assert!(elements[1].is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_object_with_getter() {
    match first_expression("({ get x() { return 1; }, y: 2 });") {
        ExpressionType::ObjectExpression { properties, .. } => {
            assert_eq!(properties[0].kind, PropertyKind::Get);
            assert_eq!(properties[1].kind, PropertyKind::Init);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_prefix_update_from_unary_operator() {
    assert!(matches!(
        first_expression("++i;"),
        ExpressionType::UpdateExpression { prefix: true, .. }
    ));
}

#[test]
fn test_invalid_assignment_target_is_rejected() {
    assert!(JsParser::parse_to_ast("1 = 2;").is_err());
}

#[test]
fn test_syntax_error_reports_position() {
    let err = JsParser::parse_to_ast("var = ;").unwrap_err();
    assert_eq!(err.line_col().0, 1);
}

#[test]
fn test_parse_expression_rejects_statements() {
    assert!(JsParser::parse_expression("a + 1").is_ok());
    assert!(JsParser::parse_expression("var a = 1;").is_err());
}
