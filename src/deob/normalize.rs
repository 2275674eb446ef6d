//! Folding of literal string concatenations.
//!
//! Every `+` chain is flattened into its operands, runs of adjacent string
//! literals are merged and the chain is rebuilt left-associatively. A right
//! operand that is itself a `+` chain is only spliced in when its leftmost
//! operand is a string literal: from there on every `+` concatenates, so
//! the regrouping cannot change the result.

use crate::deob::visit::{rewrite_expression, rewrite_program, Visit, Visitor};
use crate::parser::ast::{BinaryOperator, ExpressionType, LiteralType, Meta, ProgramData};

pub fn normalize(program: ProgramData) -> ProgramData {
    rewrite_program(program, &mut StringNormalizer)
}

pub fn normalize_expression(expr: ExpressionType) -> ExpressionType {
    rewrite_expression(expr, &mut StringNormalizer)
}

struct StringNormalizer;

impl Visitor for StringNormalizer {
    fn leave_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
        if !is_addition(expr) {
            return Visit::Keep;
        }
        let mut operands = vec![];
        let spliced = flatten(expr, &mut operands);
        let merged = merge_strings(operands);
        if !spliced && merged.len() == operand_count(expr) {
            return Visit::Keep;
        }
        Visit::Replace(rebuild(merged))
    }
}

fn is_addition(expr: &ExpressionType) -> bool {
    matches!(
        expr,
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            ..
        }
    )
}

fn leftmost(expr: &ExpressionType) -> &ExpressionType {
    match expr {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            left,
            ..
        } => leftmost(left),
        _ => expr,
    }
}

fn operand_count(expr: &ExpressionType) -> usize {
    match expr {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            left,
            ..
        } => operand_count(left) + 1,
        _ => 1,
    }
}

/// Collects the operands of a `+` chain in evaluation order. Returns whether
/// a right-nested group was spliced in.
fn flatten(expr: &ExpressionType, operands: &mut Vec<ExpressionType>) -> bool {
    match expr {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            left,
            right,
            ..
        } => {
            let mut spliced = flatten(left, operands);
            if is_addition(right) && leftmost(right).as_string_literal().is_some() {
                flatten(right, operands);
                spliced = true;
            } else {
                operands.push((**right).clone());
            }
            spliced
        }
        _ => {
            operands.push(expr.clone());
            false
        }
    }
}

fn merge_strings(operands: Vec<ExpressionType>) -> Vec<ExpressionType> {
    let mut merged = Vec::with_capacity(operands.len());
    let mut pending: Option<String> = None;
    for operand in operands {
        match operand.as_string_literal() {
            Some(s) => pending.get_or_insert_with(String::new).push_str(s),
            None => {
                if let Some(s) = pending.take() {
                    merged.push(ExpressionType::new_literal(LiteralType::StringLiteral(s)));
                }
                merged.push(operand);
            }
        }
    }
    if let Some(s) = pending {
        merged.push(ExpressionType::new_literal(LiteralType::StringLiteral(s)));
    }
    merged
}

fn rebuild(operands: Vec<ExpressionType>) -> ExpressionType {
    let mut operands = operands.into_iter();
    let first = match operands.next() {
        Some(first) => first,
        None => return ExpressionType::new_literal(LiteralType::StringLiteral(String::new())),
    };
    operands.fold(first, |left, right| ExpressionType::BinaryExpression {
        meta: Meta::synthetic(),
        operator: BinaryOperator::Add,
        left: Box::new(left),
        right: Box::new(right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::codegen::generate;
    use crate::parser::JsParser;

    fn run(code: &str) -> String {
        generate(&normalize(JsParser::parse_to_ast(code).unwrap()))
    }

    #[test]
    fn test_concatenates_adjacent_strings() {
        assert_eq!(run("1 + '2'"), "1 + '2';");
        assert_eq!(run("a + '1' + ('2' + b)"), "a + '12' + b;");
        assert_eq!(run("'a' + b + 'c' + 'd'"), "'a' + b + 'cd';");
        assert_eq!(run("'loca' + 'lSto' + 'rage'"), "'localStorage';");
    }

    #[test]
    fn test_keeps_non_string_groups() {
        assert_eq!(run("a + (b + 'c')"), "a + (b + 'c');");
        assert_eq!(run("'x' + (1 + 2)"), "'x' + (1 + 2);");
        assert_eq!(run("a - 'b' + 'c'"), "a - 'b' + 'c';");
    }

    #[test]
    fn test_nested_chains_fold_bottom_up() {
        assert_eq!(run("f('a' + 'b', x['c' + 'd'])"), "f('ab', x['cd']);");
    }

    #[test]
    fn test_idempotent() {
        for code in ["a + '1' + ('2' + b)", "'a' + b + 'c' + 'd'", "x + ('y' + ('z' + w)) + 'v'"] {
            let once = run(code);
            assert_eq!(run(&once), once);
        }
    }
}
