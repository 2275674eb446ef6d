//! Static partial evaluation of literal-only expressions.
//!
//! The reducer never runs script code. It shares operator semantics with the
//! sandbox interpreter through `runner::ds::operations`, so a folded value is
//! exactly what the engine would have computed.

use std::ops::BitOr;

use crate::parser::ast::{ExpressionType, LiteralType, NumberLiteralType};
use crate::runner::ds::operations::operators::{binary_op, short_circuits, unary_op};
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::{JsNumberType, JsValue};

/// Outcome of [`reduce`]. Never partial.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    Literal(LiteralType),
    NotReducible,
}

impl Reduction {
    pub fn literal(self) -> Option<LiteralType> {
        match self {
            Reduction::Literal(value) => Some(value),
            Reduction::NotReducible => None,
        }
    }

    pub fn is_reducible(&self) -> bool {
        matches!(self, Reduction::Literal(_))
    }
}

/// Set of node kinds a reduction may pass through. Logical expressions
/// count as `BINARY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedKinds(u8);

impl AllowedKinds {
    pub const CONDITIONAL: AllowedKinds = AllowedKinds(1);
    pub const SEQUENCE: AllowedKinds = AllowedKinds(1 << 1);
    pub const BINARY: AllowedKinds = AllowedKinds(1 << 2);
    pub const UNARY: AllowedKinds = AllowedKinds(1 << 3);
    pub const LITERAL: AllowedKinds = AllowedKinds(1 << 4);
    /// Everything the reducer understands.
    pub const GENERAL: AllowedKinds = AllowedKinds(0x1f);

    pub fn contains(self, other: AllowedKinds) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllowedKinds {
    type Output = AllowedKinds;

    fn bitor(self, rhs: AllowedKinds) -> AllowedKinds {
        AllowedKinds(self.0 | rhs.0)
    }
}

/// Folds `expr` into a literal, or reports that it cannot be folded.
///
/// Evaluation fails fast on the first node whose kind is not in `allowed`.
/// Only the branches that evaluation actually takes are inspected, so an
/// untaken conditional branch or a short-circuited right operand may contain
/// anything.
pub fn reduce(expr: &ExpressionType, allowed: AllowedKinds) -> Reduction {
    if let ExpressionType::Literal(data) = expr {
        if allowed.contains(AllowedKinds::LITERAL) {
            return Reduction::Literal(data.value.clone());
        }
        return Reduction::NotReducible;
    }
    match evaluate(expr, allowed).and_then(|value| value_to_literal(&value)) {
        Some(literal) => Reduction::Literal(literal),
        None => Reduction::NotReducible,
    }
}

/// Literal form of a primitive. `undefined` and objects have none.
pub fn value_to_literal(value: &JsValue) -> Option<LiteralType> {
    Some(match value {
        JsValue::String(s) => LiteralType::StringLiteral(s.clone()),
        JsValue::Boolean(b) => LiteralType::BooleanLiteral(*b),
        JsValue::Null => LiteralType::NullLiteral,
        JsValue::Number(JsNumberType::Integer(i)) => LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(*i)),
        JsValue::Number(n) => LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(n.as_f64())),
        JsValue::Undefined | JsValue::Object(_) => return None,
    })
}

/// Value of a primitive literal. Regular expressions are objects, so they
/// have no static value.
pub fn literal_to_value(literal: &LiteralType) -> Option<JsValue> {
    Some(match literal {
        LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::NumberLiteral(n) => JsValue::number(n.as_f64()),
        LiteralType::RegExpLiteral(_) => return None,
    })
}

fn evaluate(expr: &ExpressionType, allowed: AllowedKinds) -> Option<JsValue> {
    match expr {
        ExpressionType::Literal(data) if allowed.contains(AllowedKinds::LITERAL) => literal_to_value(&data.value),
        ExpressionType::BinaryExpression {
            operator, left, right, ..
        } if allowed.contains(AllowedKinds::BINARY) => {
            let left = evaluate(left, allowed)?;
            let right = evaluate(right, allowed)?;
            binary_op(operator, &left, &right).ok()
        }
        ExpressionType::LogicalExpression {
            operator, left, right, ..
        } if allowed.contains(AllowedKinds::BINARY) => {
            let left = evaluate(left, allowed)?;
            if short_circuits(operator, &left) {
                Some(left)
            } else {
                evaluate(right, allowed)
            }
        }
        ExpressionType::UnaryExpression { operator, argument, .. } if allowed.contains(AllowedKinds::UNARY) => {
            let argument = evaluate(argument, allowed)?;
            unary_op(operator, &argument).ok()
        }
        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } if allowed.contains(AllowedKinds::CONDITIONAL) => {
            if to_boolean(&evaluate(test, allowed)?) {
                evaluate(consequent, allowed)
            } else {
                evaluate(alternate, allowed)
            }
        }
        ExpressionType::SequenceExpression { expressions, .. } if allowed.contains(AllowedKinds::SEQUENCE) => {
            let mut last = None;
            for expression in expressions {
                last = Some(evaluate(expression, allowed)?);
            }
            last
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::RegExpLiteralData;
    use crate::parser::codegen::generate_expression;
    use crate::parser::JsParser;

    fn fold(code: &str) -> Option<String> {
        let expr = JsParser::parse_expression(code).unwrap();
        reduce(&expr, AllowedKinds::GENERAL)
            .literal()
            .map(|literal| generate_expression(&ExpressionType::new_literal(literal)))
    }

    #[test]
    fn test_folds_literal_arithmetic() {
        assert_eq!(fold("1 + 2").as_deref(), Some("3"));
        assert_eq!(fold("true ? 1 : 2").as_deref(), Some("1"));
        assert_eq!(fold("'a' + 1 + 2").as_deref(), Some("'a12'"));
        assert_eq!(fold("7 / 2").as_deref(), Some("3.5"));
        assert_eq!(fold("-(1 << 3) >>> 28").as_deref(), Some("15"));
        assert_eq!(fold("typeof null").as_deref(), Some("'object'"));
        assert_eq!(fold("!0 && 'yes'").as_deref(), Some("'yes'"));
    }

    #[test]
    fn test_nested_conditional_with_sequences() {
        assert_eq!(
            fold(
                "(434, 124) <= (72, 98) ? null : (594, 125) >= 45 ? (112, 1502002290) : (441, 776) <= (38, 233) ? 'k' : (2, 28)"
            )
            .as_deref(),
            Some("1502002290")
        );
    }

    #[test]
    fn test_untaken_branches_are_not_inspected() {
        assert_eq!(fold("true ? 1 : foo()").as_deref(), Some("1"));
        assert_eq!(fold("0 && bar").as_deref(), Some("0"));
        assert_eq!(fold("false ? 1 : foo()"), None);
        assert_eq!(fold("1 || x.y").as_deref(), Some("1"));
    }

    #[test]
    fn test_disallowed_kinds_fail() {
        let expr = JsParser::parse_expression("true ? 1 : 2").unwrap();
        assert_eq!(
            reduce(&expr, AllowedKinds::BINARY | AllowedKinds::LITERAL),
            Reduction::NotReducible
        );
        let expr = JsParser::parse_expression("1 + 2").unwrap();
        assert!(reduce(&expr, AllowedKinds::BINARY | AllowedKinds::LITERAL).is_reducible());
        assert_eq!(reduce(&expr, AllowedKinds::LITERAL), Reduction::NotReducible);
        assert_eq!(fold("a + 1"), None);
        assert_eq!(fold("[1] + 1"), None);
    }

    #[test]
    fn test_unrepresentable_results() {
        assert_eq!(fold("void 0"), None);
        assert_eq!(fold("1 in 2"), None);
        assert_eq!(fold("1 / 0").as_deref(), Some("Infinity"));
    }

    #[test]
    fn test_regexp_literal_is_only_identity() {
        let regexp = LiteralType::RegExpLiteral(RegExpLiteralData {
            pattern: "a+".to_string(),
            flags: "g".to_string(),
        });
        let expr = ExpressionType::new_literal(regexp.clone());
        assert_eq!(reduce(&expr, AllowedKinds::GENERAL), Reduction::Literal(regexp));
        assert_eq!(fold("/a/ + ''"), None);
    }
}
