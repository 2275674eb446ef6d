//! Rewriting of disguised calls through sandboxed replacements.
//!
//! A rules description is a list of `left == right` statements. `left` is a
//! call whose callee chain and argument matchers describe the calls to
//! resolve; `right` is any expression, loaded into a sandbox session of its
//! own under a reserved name. Function and variable declarations among the
//! rules form a prelude that every session runs first.
//!
//! Rewriting happens in two passes. The first swaps every matched call for
//! a placeholder and starts its evaluation; the second waits for all of them
//! and puts either the resulting literal or the untouched call back.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::deob::error::DeobError;
use crate::deob::normalize::normalize;
use crate::deob::reducer::literal_to_value;
use crate::deob::visit::{rewrite_program, Visit, Visitor};
use crate::parser::ast::{
    BinaryOperator, DeclarationType, ExpressionType, LiteralType, MemberExpressionType, ProgramData, StatementType,
};
use crate::parser::codegen::{generate_expression, generate_statement};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::sandbox::{SandboxError, SandboxSession, SandboxValue};
use crate::runner::std_lib::regexp;

/// Global binding that holds a rule's replacement inside its session.
pub const REPLACEMENT_BINDING: &str = "__jsdeob_replacement__";

#[derive(Debug, Clone)]
pub enum ArgumentMatcher {
    /// Tested against a literal argument's string value, or against the
    /// generated source of any other argument.
    Regex(Regex),
    /// Written as `undefined`.
    Anything,
}

impl ArgumentMatcher {
    pub fn matches(&self, argument: &ExpressionType) -> bool {
        match self {
            ArgumentMatcher::Anything => true,
            ArgumentMatcher::Regex(re) => re.is_match(&argument_text(argument)),
        }
    }
}

fn argument_text(argument: &ExpressionType) -> String {
    match argument.as_literal().and_then(literal_to_value) {
        Some(value) => to_string(&value),
        None => generate_expression(argument),
    }
}

/// Shape of one rule, before any session exists.
#[derive(Debug, Clone)]
pub struct RuleShape {
    /// Property names of the callee, outermost first.
    pub properties: Vec<String>,
    pub root: String,
    pub arguments: Vec<ArgumentMatcher>,
    pub replacement: ExpressionType,
}

impl RuleShape {
    fn chain(&self) -> (&[String], &str) {
        (&self.properties, &self.root)
    }
}

/// Validated rules description.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub rules: Vec<RuleShape>,
    pub prelude: Vec<StatementType>,
}

impl RuleSet {
    pub fn parse(description: &ProgramData) -> Result<RuleSet, DeobError> {
        let mut rules: Vec<RuleShape> = vec![];
        let mut prelude = vec![];
        for stmt in &description.body {
            match stmt {
                StatementType::ExpressionStatement {
                    expression:
                        ExpressionType::BinaryExpression {
                            operator: BinaryOperator::LooselyEqual,
                            left,
                            right,
                            ..
                        },
                    ..
                } => {
                    let rule = parse_rule(left, right)?;
                    if rules.iter().any(|other| other.chain() == rule.chain()) {
                        return Err(DeobError::validation(format!(
                            "two rules share the callee {}",
                            generate_expression(left)
                        )));
                    }
                    rules.push(rule);
                }
                StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(_))
                | StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(_)) => {
                    prelude.push(stmt.clone())
                }
                StatementType::EmptyStatement { .. } => {}
                _ => {
                    return Err(DeobError::validation(format!(
                        "expected a `call(...) == replacement` rule, found `{}`",
                        generate_statement(stmt)
                    )))
                }
            }
        }
        if rules.is_empty() {
            return Err(DeobError::validation("no rules given"));
        }
        Ok(RuleSet { rules, prelude })
    }
}

fn parse_rule(left: &ExpressionType, right: &ExpressionType) -> Result<RuleShape, DeobError> {
    let (callee, arguments) = match left {
        ExpressionType::CallExpression { callee, arguments, .. } => (callee, arguments),
        _ => return Err(DeobError::validation("the left side of a rule must be a call")),
    };
    let (properties, root) = rule_chain(callee)
        .ok_or_else(|| DeobError::validation("a rule callee must be a name or a chain of property names"))?;
    let arguments = arguments
        .iter()
        .map(|argument| match argument {
            ExpressionType::Literal(literal) => match &literal.value {
                LiteralType::RegExpLiteral(re) => regexp::compile(&re.pattern, &re.flags)
                    .map(ArgumentMatcher::Regex)
                    .map_err(|e| DeobError::validation(format!("invalid argument pattern: {}", e.message()))),
                _ => Err(DeobError::validation("argument matchers must be regular expressions")),
            },
            other if other.is_identifier_named("undefined") => Ok(ArgumentMatcher::Anything),
            _ => Err(DeobError::validation("argument matchers must be regular expressions")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleShape {
        properties,
        root,
        arguments,
        replacement: right.clone(),
    })
}

/// `a.b['c']` gives `(["c", "b"], "a")`.
fn rule_chain(callee: &ExpressionType) -> Option<(Vec<String>, String)> {
    let mut properties = vec![];
    let mut current = callee;
    loop {
        match current {
            ExpressionType::Identifier(ident) => return Some((properties, ident.name.clone())),
            ExpressionType::MemberExpression(member) => {
                properties.push(property_name(member)?);
                current = member.object();
            }
            _ => return None,
        }
    }
}

fn property_name(member: &MemberExpressionType) -> Option<String> {
    match member {
        MemberExpressionType::SimpleMemberExpression { property, .. } => Some(property.name.clone()),
        MemberExpressionType::ComputedMemberExpression { property, .. } => match property.as_literal()? {
            literal @ (LiteralType::StringLiteral(_) | LiteralType::NumberLiteral(_)) => {
                literal_to_value(literal).map(|value| to_string(&value))
            }
            _ => None,
        },
    }
}

/// Names along a candidate callee, outermost first. `None` marks a segment
/// that can never match, such as a computed key that is not a literal.
fn candidate_segments(callee: &ExpressionType) -> Vec<Option<String>> {
    let mut segments = vec![];
    let mut current = callee;
    loop {
        match current {
            ExpressionType::Identifier(ident) => {
                segments.push(Some(ident.name.clone()));
                return segments;
            }
            ExpressionType::MemberExpression(member) => {
                segments.push(property_name(member));
                current = member.object();
            }
            _ => {
                segments.push(None);
                return segments;
            }
        }
    }
}

/// Index of the rule a callee resolves to. Rules are tried against the
/// callee's segments from the outside in; a rule wins as soon as all its
/// property names have matched and the next segment is its root name, so
/// shorter chains win over longer ones and earlier rules over later ones.
pub fn match_callee(rules: &[RuleShape], callee: &ExpressionType) -> Option<usize> {
    let segments = candidate_segments(callee);
    for (depth, segment) in segments.iter().enumerate() {
        let name = segment.as_deref()?;
        let found = rules.iter().position(|rule| {
            rule.properties.len() == depth
                && rule.root == name
                && rule
                    .properties
                    .iter()
                    .zip(&segments)
                    .all(|(expected, actual)| actual.as_deref() == Some(expected.as_str()))
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Rules bound to live sandbox sessions, one per rule.
pub struct CallPatternRules {
    rules: Vec<RuleShape>,
    sessions: Vec<Arc<SandboxSession>>,
}

impl CallPatternRules {
    /// Validates the description and opens one session per rule with the
    /// prelude and the rule's replacement loaded.
    pub async fn build(description: &ProgramData) -> Result<CallPatternRules, DeobError> {
        let RuleSet { rules, prelude } = RuleSet::parse(description)?;
        let prelude_source = prelude.iter().map(generate_statement).collect::<Vec<_>>().join("\n");
        let mut sessions = Vec::with_capacity(rules.len());
        for rule in &rules {
            let session = SandboxSession::open().await?;
            if !prelude_source.is_empty() {
                session.evaluate(&prelude_source).await?;
            }
            session
                .evaluate(&format!(
                    "var {} = ({});",
                    REPLACEMENT_BINDING,
                    generate_expression(&rule.replacement)
                ))
                .await?;
            sessions.push(Arc::new(session));
        }
        debug!(rules = rules.len(), "call pattern sessions ready");
        Ok(CallPatternRules { rules, sessions })
    }

    pub fn rules(&self) -> &[RuleShape] {
        &self.rules
    }

    /// Resolves every matching call in `target`, then releases the sessions.
    pub async fn rewrite(self, target: ProgramData) -> ProgramData {
        let mut collector = PendingCollector {
            rules: &self.rules,
            pending: vec![],
        };
        let target = rewrite_program(target, &mut collector);
        let pending = collector.pending;
        debug!(calls = pending.len(), "resolving matched calls");

        let handles: Vec<_> = pending
            .into_iter()
            .map(|(rule, code)| {
                let session = self.sessions[rule].clone();
                tokio::spawn(async move { session.evaluate(&code).await })
            })
            .collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(SandboxError::Protocol(format!("evaluation task failed: {}", e))),
            });
        }

        let target = rewrite_program(target, &mut PendingResolver { results: &results });
        for session in &self.sessions {
            session.destroy();
        }
        normalize(target)
    }
}

/// First pass: placeholders in, evaluations out.
struct PendingCollector<'r> {
    rules: &'r [RuleShape],
    /// Rule index and script for each placeholder, by placeholder index.
    pending: Vec<(usize, String)>,
}

impl Visitor for PendingCollector<'_> {
    fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
        let (callee, arguments) = match expr {
            ExpressionType::CallExpression { callee, arguments, .. } => (callee, arguments),
            _ => return Visit::Keep,
        };
        let rule = match match_callee(self.rules, callee) {
            Some(rule) => rule,
            None => return Visit::Keep,
        };
        let matchers = &self.rules[rule].arguments;
        if matchers.len() != arguments.len() || !matchers.iter().zip(arguments).all(|(m, a)| m.matches(a)) {
            return Visit::Keep;
        }
        let code = format!(
            "{}({});",
            REPLACEMENT_BINDING,
            arguments.iter().map(generate_expression).collect::<Vec<_>>().join(", ")
        );
        self.pending.push((rule, code));
        Visit::Replace(ExpressionType::PendingRewrite {
            index: self.pending.len() - 1,
            original: Box::new(expr.clone()),
        })
    }
}

/// Second pass: placeholders out, results or originals in.
struct PendingResolver<'r> {
    results: &'r [Result<SandboxValue, SandboxError>],
}

impl Visitor for PendingResolver<'_> {
    fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
        let (index, original) = match expr {
            ExpressionType::PendingRewrite { index, original } => (*index, original),
            _ => return Visit::Keep,
        };
        match self.results.get(index) {
            Some(Ok(value)) => Visit::Replace(value.to_expression()),
            Some(Err(e)) => {
                warn!(call = %generate_expression(original), error = %e, "could not resolve call, keeping it");
                Visit::Replace((**original).clone())
            }
            None => Visit::Replace((**original).clone()),
        }
    }
}

/// Convenience wrapper: build the rules, rewrite, release.
pub async fn rewrite_calls(description: &ProgramData, target: ProgramData) -> Result<ProgramData, DeobError> {
    let rules = CallPatternRules::build(description).await?;
    Ok(rules.rewrite(target).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::codegen::generate;
    use crate::parser::JsParser;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> ProgramData {
        JsParser::parse_to_ast(code).unwrap()
    }

    fn rules(description: &str) -> Vec<RuleShape> {
        RuleSet::parse(&parse(description)).unwrap().rules
    }

    fn callee(code: &str) -> ExpressionType {
        match JsParser::parse_expression(code).unwrap() {
            ExpressionType::CallExpression { callee, .. } => *callee,
            other => other,
        }
    }

    #[test]
    fn test_parse_rules() {
        let set = RuleSet::parse(&parse("function d(s) { return s; } a.b['c'](/x/, undefined) == d;")).unwrap();
        assert_eq!(set.prelude.len(), 1);
        assert_eq!(set.rules[0].properties, vec!["c".to_string(), "b".to_string()]);
        assert_eq!(set.rules[0].root, "a");
        assert_eq!(set.rules[0].arguments.len(), 2);
    }

    #[test]
    fn test_rule_validation() {
        let invalid = |code: &str| matches!(RuleSet::parse(&parse(code)), Err(DeobError::Validation(_)));
        assert!(invalid("a.b(/x/) === c;"));
        assert!(invalid("a.b('x') == c;"));
        assert!(invalid("a().b(/x/) == c;"));
        assert!(invalid("x = 1;"));
        assert!(invalid("function f() {}"));
        assert!(invalid("a.b(/x/) == c; a.b(undefined) == d;"));
    }

    #[test]
    fn test_callee_matching() {
        let rules = rules("a.b(undefined) == x; c(undefined) == y; d.e.f(undefined) == z;");
        assert_eq!(match_callee(&rules, &callee("a.b(1)")), Some(0));
        assert_eq!(match_callee(&rules, &callee("a['b'](1)")), Some(0));
        assert_eq!(match_callee(&rules, &callee("c(1)")), Some(1));
        assert_eq!(match_callee(&rules, &callee("window.c(1)")), Some(1));
        assert_eq!(match_callee(&rules, &callee("d.e.f(1)")), Some(2));
        assert_eq!(match_callee(&rules, &callee("x.b(1)")), None);
        assert_eq!(match_callee(&rules, &callee("a[k](1)")), None);
        assert_eq!(match_callee(&rules, &callee("b(1)")), None);
    }

    #[test]
    fn test_argument_matchers() {
        let rules = rules(r#"a.b(/^".*"$/) == x;"#);
        let matcher = &rules[0].arguments[0];
        assert!(matcher.matches(&JsParser::parse_expression(r#"'"hi"'"#).unwrap()));
        assert!(!matcher.matches(&JsParser::parse_expression("'hi'").unwrap()));
        assert!(ArgumentMatcher::Anything.matches(&JsParser::parse_expression("f()").unwrap()));
    }

    #[tokio::test]
    async fn test_rewrites_matching_calls() {
        let description = parse(r#"function decode(s) { return 'decoded'; } a.b(/^".*"$/) == decode;"#);
        let output = rewrite_calls(&description, parse(r#"f(a.b('"hi"'), a.b('plain'));"#))
            .await
            .unwrap();
        assert_eq!(generate(&output), r#"f('decoded', a.b('plain'));"#);
    }

    #[tokio::test]
    async fn test_failed_evaluation_restores_call() {
        let description = parse(r#"a.b(/^".*"$/) == window.atob;"#);
        let output = rewrite_calls(&description, parse(r#"a.b('"hi"');"#)).await.unwrap();
        assert_eq!(generate(&output), r#"a.b('"hi"');"#);
    }

    #[tokio::test]
    async fn test_results_are_normalized() {
        let description = parse("d(undefined) == window.atob;");
        let output = rewrite_calls(&description, parse("x[d('Zm9v') + d('YmFy')];")).await.unwrap();
        assert_eq!(generate(&output), "x['foobar'];");
    }
}
