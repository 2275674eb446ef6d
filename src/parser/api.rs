use pest::error::{Error, ErrorVariant};
use pest::iterators::Pair;
use pest::{Parser, Span};
use pest_derive::Parser;
use thiserror::Error;

use super::ast::*;

#[derive(Parser)]
#[grammar = "parser/js_grammar.pest"] // relative to src
pub struct JsParser;

/// Source text that could not be turned into a syntax tree.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error\n{0}")]
    Syntax(Box<Error<Rule>>),
}

impl From<Error<Rule>> for ParseError {
    fn from(e: Error<Rule>) -> Self {
        ParseError::Syntax(Box::new(e))
    }
}

impl ParseError {
    /// One-based line and column of the failure.
    pub fn line_col(&self) -> (usize, usize) {
        match self {
            ParseError::Syntax(e) => match e.line_col {
                pest::error::LineColLocation::Pos(pos) => pos,
                pest::error::LineColLocation::Span(start, _) => start,
            },
        }
    }
}

impl JsParser {
    /// Parses a whole script.
    pub fn parse_to_ast(script: &str) -> Result<ProgramData, ParseError> {
        Ok(parse_to_ast(script)?)
    }

    /// Parses text that must consist of exactly one expression.
    pub fn parse_expression(code: &str) -> Result<ExpressionType, ParseError> {
        let mut pairs = JsParser::parse(Rule::standalone_expression, code)?;
        let root = pairs.next().ok_or_else(|| {
            Error::new_from_pos(
                ErrorVariant::CustomError {
                    message: "Empty expression".to_string(),
                },
                pest::Position::from_start(code),
            )
        })?;
        let span = root.as_span();
        let mut inner = root.into_inner();
        Ok(build_ast_from_expression(expect_pair(&mut inner, span, 1)?)?)
    }
}

pub fn parse_to_ast(script: &str) -> Result<ProgramData, Error<Rule>> {
    let mut pairs = JsParser::parse(Rule::script, script)?;
    match pairs.next() {
        Some(pair) => build_ast_from_script(pair),
        None => Ok(ProgramData {
            meta: Meta::synthetic(),
            body: vec![],
        }),
    }
}

fn get_meta(pair: &Pair<Rule>) -> Meta {
    let span = pair.as_span();
    Meta {
        start_index: span.start(),
        end_index: span.end(),
    }
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> Error<Rule> {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn get_validation_error(message: &str, span: Span) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        span,
    )
}

fn expect_pair<'i, I>(iter: &mut I, span: Span<'i>, id: i32) -> Result<Pair<'i, Rule>, Error<Rule>>
where
    I: Iterator<Item = Pair<'i, Rule>>,
{
    iter.next().ok_or_else(|| {
        let message = format!("Unexpected end of node - {}", id);
        Error::new_from_span(ErrorVariant::CustomError { message }, span)
    })
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_break
            | Rule::kw_case
            | Rule::kw_catch
            | Rule::kw_continue
            | Rule::kw_debugger
            | Rule::kw_default
            | Rule::kw_do
            | Rule::kw_else
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_in
            | Rule::kw_new
            | Rule::kw_return
            | Rule::kw_switch
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_while
            | Rule::kw_with
    )
}

/// Children of `pair` with the keyword tokens left out.
fn significant_pairs(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn build_ast_from_script(pair: Pair<Rule>) -> Result<ProgramData, Error<Rule>> {
    let meta = get_meta(&pair);
    let mut body = vec![];
    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::EOI => { /* Do nothing */ }
            _ => body.push(build_ast_from_statement(inner_pair)?),
        }
    }
    Ok(ProgramData { meta, body })
}

fn build_ast_from_statement_list<'i, I>(pairs: I) -> Result<Vec<StatementType>, Error<Rule>>
where
    I: Iterator<Item = Pair<'i, Rule>>,
{
    pairs.map(build_ast_from_statement).collect()
}

fn build_ast_from_block(pair: Pair<Rule>) -> Result<BlockStatementData, Error<Rule>> {
    let meta = get_meta(&pair);
    Ok(BlockStatementData {
        meta,
        body: build_ast_from_statement_list(pair.into_inner())?,
    })
}

fn build_ast_from_statement(pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    Ok(match pair.as_rule() {
        Rule::block_statement => StatementType::BlockStatement(build_ast_from_block(pair)?),
        Rule::variable_statement => {
            let mut inner = pair.into_inner();
            let declaration = build_ast_from_variable_declaration_list(expect_pair(&mut inner, span, 2)?)?;
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(declaration))
        }
        Rule::empty_statement => StatementType::EmptyStatement { meta },
        Rule::function_declaration => StatementType::DeclarationStatement(
            DeclarationType::FunctionDeclaration(build_ast_from_function(pair)?),
        ),
        Rule::if_statement => {
            let mut inner = significant_pairs(pair);
            let test = build_ast_from_expression(expect_pair(&mut inner, span, 3)?)?;
            let consequent = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 4)?)?);
            let alternate = match inner.next() {
                Some(p) => Some(Box::new(build_ast_from_statement(p)?)),
                None => None,
            };
            StatementType::IfStatement {
                meta,
                test,
                consequent,
                alternate,
            }
        }
        Rule::do_while_statement => {
            let mut inner = significant_pairs(pair);
            let body = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 5)?)?);
            let test = build_ast_from_expression(expect_pair(&mut inner, span, 6)?)?;
            StatementType::DoWhileStatement { meta, body, test }
        }
        Rule::while_statement => {
            let mut inner = significant_pairs(pair);
            let test = build_ast_from_expression(expect_pair(&mut inner, span, 7)?)?;
            let body = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 8)?)?);
            StatementType::WhileStatement { meta, test, body }
        }
        Rule::for_in_statement => {
            let mut inner = significant_pairs(pair);
            let left_pair = expect_pair(&mut inner, span, 9)?;
            let left = match left_pair.as_rule() {
                Rule::for_in_binding => {
                    let binding_meta = get_meta(&left_pair);
                    let binding_span = left_pair.as_span();
                    let mut binding_inner = left_pair.into_inner();
                    let kind = build_ast_from_variable_kind(expect_pair(&mut binding_inner, binding_span, 10)?)?;
                    let id = build_ast_from_identifier(expect_pair(&mut binding_inner, binding_span, 11)?);
                    VariableDeclarationOrExpression::VariableDeclaration(VariableDeclarationData {
                        meta: binding_meta.clone(),
                        declarations: vec![VariableDeclaratorData {
                            meta: binding_meta,
                            id,
                            init: None,
                        }],
                        kind,
                    })
                }
                _ => {
                    let target = build_ast_from_expression(left_pair)?;
                    validate_assignment_target(&target, span)?;
                    VariableDeclarationOrExpression::Expression(target)
                }
            };
            let right = build_ast_from_expression(expect_pair(&mut inner, span, 12)?)?;
            let body = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 13)?)?);
            StatementType::ForInStatement {
                meta,
                left,
                right,
                body,
            }
        }
        Rule::for_statement => {
            let mut init = None;
            let mut test = None;
            let mut update = None;
            let mut body = None;
            for inner_pair in significant_pairs(pair) {
                match inner_pair.as_rule() {
                    Rule::for_init => {
                        let init_span = inner_pair.as_span();
                        let mut init_inner = inner_pair.into_inner();
                        let p = expect_pair(&mut init_inner, init_span, 14)?;
                        init = Some(match p.as_rule() {
                            Rule::variable_declaration_list => {
                                VariableDeclarationOrExpression::VariableDeclaration(
                                    build_ast_from_variable_declaration_list(p)?,
                                )
                            }
                            _ => VariableDeclarationOrExpression::Expression(build_ast_from_expression(p)?),
                        });
                    }
                    Rule::for_test => test = Some(build_ast_from_wrapped_expression(inner_pair)?),
                    Rule::for_update => update = Some(build_ast_from_wrapped_expression(inner_pair)?),
                    _ => body = Some(Box::new(build_ast_from_statement(inner_pair)?)),
                }
            }
            let body = body.ok_or_else(|| get_validation_error("Missing loop body", span))?;
            StatementType::ForStatement {
                meta,
                init,
                test,
                update,
                body,
            }
        }
        Rule::continue_statement => StatementType::ContinueStatement {
            meta,
            label: significant_pairs(pair).next().map(build_ast_from_identifier),
        },
        Rule::break_statement => StatementType::BreakStatement {
            meta,
            label: significant_pairs(pair).next().map(build_ast_from_identifier),
        },
        Rule::return_statement => StatementType::ReturnStatement {
            meta,
            argument: match significant_pairs(pair).next() {
                Some(p) => Some(build_ast_from_expression(p)?),
                None => None,
            },
        },
        Rule::with_statement => {
            let mut inner = significant_pairs(pair);
            let object = build_ast_from_expression(expect_pair(&mut inner, span, 15)?)?;
            let body = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 16)?)?);
            StatementType::WithStatement { meta, object, body }
        }
        Rule::switch_statement => {
            let mut inner = significant_pairs(pair);
            let discriminant = build_ast_from_expression(expect_pair(&mut inner, span, 17)?)?;
            let mut cases = vec![];
            for case_pair in inner {
                cases.push(build_ast_from_switch_case(case_pair)?);
            }
            StatementType::SwitchStatement {
                meta,
                discriminant,
                cases,
            }
        }
        Rule::throw_statement => {
            let mut inner = significant_pairs(pair);
            StatementType::ThrowStatement {
                meta,
                argument: build_ast_from_expression(expect_pair(&mut inner, span, 18)?)?,
            }
        }
        Rule::try_statement => {
            let mut inner = significant_pairs(pair);
            let block = build_ast_from_block(expect_pair(&mut inner, span, 19)?)?;
            let mut handler = None;
            let mut finalizer = None;
            for clause in inner {
                match clause.as_rule() {
                    Rule::catch_clause => {
                        let clause_meta = get_meta(&clause);
                        let clause_span = clause.as_span();
                        let mut clause_inner = significant_pairs(clause);
                        let param = build_ast_from_identifier(expect_pair(&mut clause_inner, clause_span, 20)?);
                        let body = build_ast_from_block(expect_pair(&mut clause_inner, clause_span, 21)?)?;
                        handler = Some(CatchClauseData {
                            meta: clause_meta,
                            param,
                            body,
                        });
                    }
                    Rule::finally_clause => {
                        let clause_span = clause.as_span();
                        let mut clause_inner = significant_pairs(clause);
                        finalizer = Some(build_ast_from_block(expect_pair(&mut clause_inner, clause_span, 22)?)?);
                    }
                    _ => return Err(get_unexpected_error(23, &clause)),
                }
            }
            if handler.is_none() && finalizer.is_none() {
                return Err(get_validation_error("Missing catch or finally after try", span));
            }
            StatementType::TryStatement {
                meta,
                block,
                handler,
                finalizer,
            }
        }
        Rule::debugger_statement => StatementType::DebuggerStatement { meta },
        Rule::labelled_statement => {
            let mut inner = pair.into_inner();
            let label = build_ast_from_identifier(expect_pair(&mut inner, span, 24)?);
            let body = Box::new(build_ast_from_statement(expect_pair(&mut inner, span, 25)?)?);
            StatementType::LabeledStatement { meta, label, body }
        }
        Rule::expression_statement => StatementType::ExpressionStatement {
            meta,
            expression: build_ast_from_wrapped_expression(pair)?,
        },
        _ => return Err(get_unexpected_error(26, &pair)),
    })
}

fn build_ast_from_switch_case(pair: Pair<Rule>) -> Result<SwitchCaseData, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::case_clause => {
            let mut inner = significant_pairs(pair);
            let test = build_ast_from_expression(expect_pair(&mut inner, span, 27)?)?;
            Ok(SwitchCaseData {
                meta,
                test: Some(test),
                consequent: build_ast_from_statement_list(inner)?,
            })
        }
        Rule::default_clause => Ok(SwitchCaseData {
            meta,
            test: None,
            consequent: build_ast_from_statement_list(significant_pairs(pair))?,
        }),
        _ => Err(get_unexpected_error(28, &pair)),
    }
}

fn build_ast_from_variable_kind(pair: Pair<Rule>) -> Result<VariableDeclarationKind, Error<Rule>> {
    Ok(match pair.as_str() {
        "var" => VariableDeclarationKind::Var,
        "let" => VariableDeclarationKind::Let,
        "const" => VariableDeclarationKind::Const,
        _ => return Err(get_unexpected_error(29, &pair)),
    })
}

fn build_ast_from_variable_declaration_list(pair: Pair<Rule>) -> Result<VariableDeclarationData, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let kind = build_ast_from_variable_kind(expect_pair(&mut inner, span, 30)?)?;
    let mut declarations = vec![];
    for declarator_pair in inner {
        let declarator_meta = get_meta(&declarator_pair);
        let declarator_span = declarator_pair.as_span();
        let mut declarator_inner = declarator_pair.into_inner();
        let id = build_ast_from_identifier(expect_pair(&mut declarator_inner, declarator_span, 31)?);
        let init = match declarator_inner.next() {
            Some(p) => Some(build_ast_from_expression(p)?),
            None => None,
        };
        declarations.push(VariableDeclaratorData {
            meta: declarator_meta,
            id,
            init,
        });
    }
    Ok(VariableDeclarationData {
        meta,
        declarations,
        kind,
    })
}

fn build_ast_from_function(pair: Pair<Rule>) -> Result<FunctionData, Error<Rule>> {
    let meta = get_meta(&pair);
    let mut id = None;
    let mut params = vec![];
    let mut body = None;
    for inner_pair in significant_pairs(pair) {
        match inner_pair.as_rule() {
            Rule::identifier => id = Some(build_ast_from_identifier(inner_pair)),
            Rule::formal_parameters => {
                params = inner_pair.into_inner().map(build_ast_from_identifier).collect();
            }
            Rule::function_body => body = Some(build_ast_from_function_body(inner_pair)?),
            _ => return Err(get_unexpected_error(32, &inner_pair)),
        }
    }
    Ok(FunctionData {
        meta,
        id,
        params,
        body: body.unwrap_or(FunctionBodyData {
            meta: Meta::synthetic(),
            body: vec![],
        }),
    })
}

fn build_ast_from_function_body(pair: Pair<Rule>) -> Result<FunctionBodyData, Error<Rule>> {
    let meta = get_meta(&pair);
    Ok(FunctionBodyData {
        meta,
        body: build_ast_from_statement_list(pair.into_inner())?,
    })
}

fn build_ast_from_identifier(pair: Pair<Rule>) -> IdentifierData {
    IdentifierData {
        meta: get_meta(&pair),
        name: pair.as_str().to_string(),
    }
}

fn validate_assignment_target(target: &ExpressionType, span: Span) -> Result<(), Error<Rule>> {
    match target {
        ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_) => Ok(()),
        _ => Err(get_validation_error("Invalid assignment target", span)),
    }
}

/// Builds the single expression held by a wrapper rule such as `for_test`.
fn build_ast_from_wrapped_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    build_ast_from_expression(expect_pair(&mut inner, span, 33)?)
}

fn build_ast_from_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    match pair.as_rule() {
        Rule::expression => {
            let meta = get_meta(&pair);
            let mut expressions = pair
                .into_inner()
                .map(build_ast_from_expression)
                .collect::<Result<Vec<_>, _>>()?;
            if expressions.len() == 1 {
                if let Some(e) = expressions.pop() {
                    return Ok(e);
                }
            }
            Ok(ExpressionType::SequenceExpression { meta, expressions })
        }
        Rule::assignment_expression => build_ast_from_assignment_expression(pair),
        Rule::conditional_expression => build_ast_from_conditional_expression(pair),
        Rule::logical_or_expression
        | Rule::logical_and_expression
        | Rule::bitwise_or_expression
        | Rule::bitwise_xor_expression
        | Rule::bitwise_and_expression
        | Rule::equality_expression
        | Rule::relational_expression
        | Rule::shift_expression
        | Rule::additive_expression
        | Rule::multiplicative_expression => build_ast_from_binary_chain(pair),
        Rule::unary_expression => build_ast_from_unary_expression(pair),
        Rule::postfix_expression => build_ast_from_postfix_expression(pair),
        Rule::left_hand_side_expression | Rule::new_member_expression => {
            build_ast_from_member_or_call_chain(pair)
        }
        Rule::new_expression => build_ast_from_new_expression(pair),
        _ => build_ast_from_primary_expression(pair),
    }
}

fn build_ast_from_assignment_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let left = build_ast_from_expression(expect_pair(&mut inner, span, 34)?)?;
    match inner.next() {
        None => Ok(left),
        Some(op_pair) => {
            let operator = AssignmentOperator::from_str(op_pair.as_str())
                .ok_or_else(|| get_unexpected_error(35, &op_pair))?;
            validate_assignment_target(&left, span)?;
            let right = build_ast_from_expression(expect_pair(&mut inner, span, 36)?)?;
            Ok(ExpressionType::AssignmentExpression {
                meta,
                operator,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

fn build_ast_from_conditional_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let test = build_ast_from_expression(expect_pair(&mut inner, span, 37)?)?;
    match inner.next() {
        None => Ok(test),
        Some(consequent_pair) => {
            let consequent = build_ast_from_expression(consequent_pair)?;
            let alternate = build_ast_from_expression(expect_pair(&mut inner, span, 38)?)?;
            Ok(ExpressionType::ConditionalExpression {
                meta,
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            })
        }
    }
}

/// Folds `operand (operator operand)*` into a left-associative tree.
fn build_ast_from_binary_chain(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let span = pair.as_span();
    let start_index = span.start();
    let mut inner = pair.into_inner();
    let mut left = build_ast_from_expression(expect_pair(&mut inner, span, 39)?)?;
    while let Some(op_pair) = inner.next() {
        let right = build_ast_from_expression(expect_pair(&mut inner, span, 40)?)?;
        let meta = Meta {
            start_index,
            end_index: right.get_meta().end_index,
        };
        left = match op_pair.as_rule() {
            Rule::logical_or_operator | Rule::logical_and_operator => ExpressionType::LogicalExpression {
                meta,
                operator: if op_pair.as_rule() == Rule::logical_or_operator {
                    LogicalOperator::Or
                } else {
                    LogicalOperator::And
                },
                left: Box::new(left),
                right: Box::new(right),
            },
            _ => ExpressionType::BinaryExpression {
                meta,
                operator: BinaryOperator::from_str(op_pair.as_str())
                    .ok_or_else(|| get_unexpected_error(41, &op_pair))?,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
    }
    Ok(left)
}

fn build_ast_from_unary_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let span = pair.as_span();
    let mut operators = vec![];
    let mut argument = None;
    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::unary_operator => operators.push(inner_pair),
            _ => argument = Some(build_ast_from_expression(inner_pair)?),
        }
    }
    let mut expression = argument.ok_or_else(|| get_validation_error("Missing operand", span))?;
    while let Some(op_pair) = operators.pop() {
        let meta = Meta {
            start_index: op_pair.as_span().start(),
            end_index: expression.get_meta().end_index,
        };
        expression = match op_pair.as_str() {
            "++" | "--" => {
                validate_assignment_target(&expression, op_pair.as_span())?;
                ExpressionType::UpdateExpression {
                    meta,
                    operator: if op_pair.as_str() == "++" {
                        UpdateOperator::PlusPlus
                    } else {
                        UpdateOperator::MinusMinus
                    },
                    argument: Box::new(expression),
                    prefix: true,
                }
            }
            op => ExpressionType::UnaryExpression {
                meta,
                operator: UnaryOperator::from_str(op).ok_or_else(|| get_unexpected_error(42, &op_pair))?,
                argument: Box::new(expression),
            },
        };
    }
    Ok(expression)
}

fn build_ast_from_postfix_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let argument = build_ast_from_expression(expect_pair(&mut inner, span, 43)?)?;
    match inner.next() {
        None => Ok(argument),
        Some(op_pair) => {
            validate_assignment_target(&argument, span)?;
            Ok(ExpressionType::UpdateExpression {
                meta,
                operator: if op_pair.as_str() == "++" {
                    UpdateOperator::PlusPlus
                } else {
                    UpdateOperator::MinusMinus
                },
                argument: Box::new(argument),
                prefix: false,
            })
        }
    }
}

fn build_ast_from_arguments(pair: Pair<Rule>) -> Result<Vec<ExpressionType>, Error<Rule>> {
    pair.into_inner().map(build_ast_from_expression).collect()
}

fn build_ast_from_member_or_call_chain(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let span = pair.as_span();
    let start_index = span.start();
    let mut inner = pair.into_inner();
    let mut expression = build_ast_from_expression(expect_pair(&mut inner, span, 44)?)?;
    for suffix in inner {
        let meta = Meta {
            start_index,
            end_index: suffix.as_span().end(),
        };
        expression = match suffix.as_rule() {
            Rule::arguments => ExpressionType::CallExpression {
                meta,
                callee: Box::new(expression),
                arguments: build_ast_from_arguments(suffix)?,
            },
            Rule::member_dot => {
                let suffix_span = suffix.as_span();
                let mut suffix_inner = suffix.into_inner();
                let property = build_ast_from_identifier(expect_pair(&mut suffix_inner, suffix_span, 45)?);
                ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                    meta,
                    object: Box::new(expression),
                    property,
                })
            }
            Rule::member_computed => {
                let property = build_ast_from_wrapped_expression(suffix)?;
                ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                    meta,
                    object: Box::new(expression),
                    property: Box::new(property),
                })
            }
            _ => return Err(get_unexpected_error(46, &suffix)),
        };
    }
    Ok(expression)
}

fn build_ast_from_new_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let mut inner = significant_pairs(pair);
    let callee = build_ast_from_expression(expect_pair(&mut inner, span, 47)?)?;
    let arguments = match inner.next() {
        Some(p) => build_ast_from_arguments(p)?,
        None => vec![],
    };
    Ok(ExpressionType::NewExpression {
        meta,
        callee: Box::new(callee),
        arguments,
    })
}

fn build_ast_from_primary_expression(pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
    let meta = get_meta(&pair);
    Ok(match pair.as_rule() {
        Rule::this_expression => ExpressionType::ThisExpression { meta },
        Rule::identifier => ExpressionType::Identifier(build_ast_from_identifier(pair)),
        Rule::function_expression => ExpressionType::FunctionExpression(build_ast_from_function(pair)?),
        Rule::parenthesized_expression => build_ast_from_wrapped_expression(pair)?,
        Rule::null_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::NullLiteral,
        }),
        Rule::boolean_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::BooleanLiteral(pair.as_str() == "true"),
        }),
        Rule::numeric_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::NumberLiteral(build_ast_from_numeric_literal(pair)?),
        }),
        Rule::string_literal => ExpressionType::Literal(LiteralData {
            meta,
            value: LiteralType::StringLiteral(build_ast_from_string_literal(pair)?),
        }),
        Rule::regular_expression_literal => {
            let span = pair.as_span();
            let mut inner = pair.into_inner();
            let pattern = expect_pair(&mut inner, span, 48)?.as_str().to_string();
            let flags = expect_pair(&mut inner, span, 49)?.as_str().to_string();
            ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::RegExpLiteral(RegExpLiteralData { pattern, flags }),
            })
        }
        Rule::array_literal => {
            let mut elements = vec![];
            for inner_pair in pair.into_inner() {
                match inner_pair.as_rule() {
                    Rule::elision => elements.push(None),
                    _ => elements.push(Some(build_ast_from_expression(inner_pair)?)),
                }
            }
            ExpressionType::ArrayExpression { meta, elements }
        }
        Rule::object_literal => {
            let mut properties = vec![];
            for inner_pair in pair.into_inner() {
                properties.push(build_ast_from_property(inner_pair)?);
            }
            ExpressionType::ObjectExpression { meta, properties }
        }
        _ => return Err(get_unexpected_error(50, &pair)),
    })
}

fn build_ast_from_property(pair: Pair<Rule>) -> Result<PropertyData, Error<Rule>> {
    let meta = get_meta(&pair);
    let span = pair.as_span();
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let key = build_ast_from_property_key(expect_pair(&mut inner, span, 51)?)?;
    let (kind, value) = match rule {
        Rule::property_init => (
            PropertyKind::Init,
            build_ast_from_expression(expect_pair(&mut inner, span, 52)?)?,
        ),
        Rule::property_getter | Rule::property_setter => {
            let mut params = vec![];
            let mut body = None;
            for p in inner {
                match p.as_rule() {
                    Rule::identifier => params.push(build_ast_from_identifier(p)),
                    _ => body = Some(build_ast_from_function_body(p)?),
                }
            }
            let body = body.ok_or_else(|| get_validation_error("Missing accessor body", span))?;
            let kind = if rule == Rule::property_getter {
                PropertyKind::Get
            } else {
                PropertyKind::Set
            };
            (
                kind,
                ExpressionType::FunctionExpression(FunctionData {
                    meta: meta.clone(),
                    id: None,
                    params,
                    body,
                }),
            )
        }
        _ => return Err(get_validation_error("Unexpected property", span)),
    };
    Ok(PropertyData { meta, key, value, kind })
}

fn build_ast_from_property_key(pair: Pair<Rule>) -> Result<PropertyKey, Error<Rule>> {
    let meta = get_meta(&pair);
    Ok(match pair.as_rule() {
        Rule::identifier_name => PropertyKey::Identifier(build_ast_from_identifier(pair)),
        Rule::string_literal => PropertyKey::Literal(LiteralData {
            meta,
            value: LiteralType::StringLiteral(build_ast_from_string_literal(pair)?),
        }),
        Rule::numeric_literal => PropertyKey::Literal(LiteralData {
            meta,
            value: LiteralType::NumberLiteral(build_ast_from_numeric_literal(pair)?),
        }),
        Rule::computed_property_name => {
            PropertyKey::Computed(Box::new(build_ast_from_wrapped_expression(pair)?))
        }
        _ => return Err(get_unexpected_error(53, &pair)),
    })
}

fn build_ast_from_numeric_literal(pair: Pair<Rule>) -> Result<NumberLiteralType, Error<Rule>> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let literal = expect_pair(&mut inner, span, 54)?;
    let text = literal.as_str();
    Ok(match literal.as_rule() {
        Rule::hex_integer_literal => parse_radix_digits(&text[2..], 16),
        Rule::binary_integer_literal => parse_radix_digits(&text[2..], 2),
        Rule::octal_integer_literal => parse_radix_digits(&text[2..], 8),
        Rule::legacy_octal_integer_literal => parse_radix_digits(&text[1..], 8),
        Rule::decimal_literal => {
            if !text.contains(|c| c == '.' || c == 'e' || c == 'E') {
                if let Ok(i) = text.parse::<i64>() {
                    return Ok(NumberLiteralType::IntegerLiteral(i));
                }
            }
            let f = text
                .parse::<f64>()
                .map_err(|_| get_validation_error("Invalid number", span))?;
            NumberLiteralType::FloatLiteral(f)
        }
        _ => return Err(get_unexpected_error(55, &literal)),
    })
}

fn parse_radix_digits(digits: &str, radix: u32) -> NumberLiteralType {
    match i64::from_str_radix(digits, radix) {
        Ok(i) => NumberLiteralType::IntegerLiteral(i),
        Err(_) => NumberLiteralType::FloatLiteral(digits.chars().fold(0.0, |acc, c| {
            acc * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64
        })),
    }
}

fn build_ast_from_string_literal(pair: Pair<Rule>) -> Result<String, Error<Rule>> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let raw = expect_pair(&mut inner, span, 56)?;
    unescape_string_literal(raw.as_str()).map_err(|message| get_validation_error(&message, span))
}

/// Resolves the escape sequences of a string literal body.
///
/// Strings are assembled as UTF-16 code units so that surrogate pairs written
/// as two `\u` escapes come out as one character.
pub fn unescape_string_literal(raw: &str) -> Result<String, String> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut buf = [0u16; 2];
    while let Some(c) = chars.next() {
        if c != '\\' {
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }
        let escaped = match chars.next() {
            Some(e) => e,
            None => return Err("Unterminated escape sequence".to_string()),
        };
        match escaped {
            'n' => units.push(0x0A),
            'r' => units.push(0x0D),
            't' => units.push(0x09),
            'b' => units.push(0x08),
            'f' => units.push(0x0C),
            'v' => units.push(0x0B),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => { /* Line continuation */ }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u16::from_str_radix(&hex, 16)
                    .map_err(|_| format!("Invalid hexadecimal escape sequence \\x{}", hex))?;
                if hex.len() != 2 {
                    return Err(format!("Invalid hexadecimal escape sequence \\x{}", hex));
                }
                units.push(code);
            }
            'u' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(h) => hex.push(h),
                            None => return Err("Unterminated unicode escape".to_string()),
                        }
                    }
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| format!("Invalid unicode escape \\u{{{}}}", hex))?;
                    units.extend_from_slice(code.encode_utf16(&mut buf));
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() != 4 {
                        return Err(format!("Invalid unicode escape \\u{}", hex));
                    }
                    let code = u16::from_str_radix(&hex, 16)
                        .map_err(|_| format!("Invalid unicode escape \\u{}", hex))?;
                    units.push(code);
                }
            }
            '0'..='7' => {
                let mut value = escaped as u32 - '0' as u32;
                let max_digits = if escaped <= '3' { 3 } else { 2 };
                let mut digits = 1;
                while digits < max_digits {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            value = value * 8 + (*d as u32 - '0' as u32);
                            chars.next();
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                units.push(value as u16);
            }
            other => units.extend_from_slice(other.encode_utf16(&mut buf)),
        }
    }
    Ok(String::from_utf16_lossy(&units))
}
