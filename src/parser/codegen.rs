//! Source text generation from syntax trees.
//!
//! The output layout follows the long-standing `escodegen` defaults: four
//! space indentation, single-quoted strings with non-ASCII characters escaped,
//! a semicolon after every simple statement and one statement per line.
//! Parentheses are derived from operator precedence, never from the source.

use crate::parser::ast::*;
use crate::runner::ds::operations::type_conversion::number_to_string;

const INDENT: &str = "    ";

const PREC_SEQUENCE: u8 = 0;
const PREC_ASSIGNMENT: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_LOGICAL_OR: u8 = 3;
const PREC_LOGICAL_AND: u8 = 4;
const PREC_BITWISE_OR: u8 = 5;
const PREC_BITWISE_XOR: u8 = 6;
const PREC_BITWISE_AND: u8 = 7;
const PREC_EQUALITY: u8 = 8;
const PREC_RELATIONAL: u8 = 9;
const PREC_BITWISE_SHIFT: u8 = 10;
const PREC_ADDITIVE: u8 = 11;
const PREC_MULTIPLICATIVE: u8 = 12;
const PREC_UNARY: u8 = 14;
const PREC_POSTFIX: u8 = 15;
const PREC_CALL: u8 = 17;
const PREC_NEW: u8 = 18;
const PREC_MEMBER: u8 = 20;
const PREC_PRIMARY: u8 = 21;

/// Generates the source text of a whole program.
pub fn generate(program: &ProgramData) -> String {
    let mut generator = CodeGenerator::new();
    program
        .body
        .iter()
        .map(|stmt| generator.statement(stmt))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn generate_statement(stmt: &StatementType) -> String {
    CodeGenerator::new().statement(stmt)
}

pub fn generate_expression(expr: &ExpressionType) -> String {
    CodeGenerator::new().expression(expr, PREC_SEQUENCE, Flags::default())
}

/// Text of a function as `Function.prototype.toString` reports it.
pub fn generate_function(data: &FunctionData) -> String {
    CodeGenerator::new().function(data)
}

/// Quotes a string the way the generator prints string literals.
pub fn quote_string(value: &str) -> String {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut result = String::with_capacity(units.len() + 2);
    result.push('\'');
    for (i, &code) in units.iter().enumerate() {
        match code {
            0x27 => result.push_str("\\'"),
            0x5C => result.push_str("\\\\"),
            0x0A => result.push_str("\\n"),
            0x0D => result.push_str("\\r"),
            0x2028 => result.push_str("\\u2028"),
            0x2029 => result.push_str("\\u2029"),
            0x20..=0x7E => result.push(code as u8 as char),
            0x08 => result.push_str("\\b"),
            0x0C => result.push_str("\\f"),
            0x09 => result.push_str("\\t"),
            0x00 => {
                let next_is_digit = units
                    .get(i + 1)
                    .map(|n| (0x30..=0x39).contains(n))
                    .unwrap_or(false);
                if next_is_digit {
                    result.push_str("\\x00");
                } else {
                    result.push_str("\\0");
                }
            }
            c if c > 0xFF => result.push_str(&format!("\\u{:04X}", c)),
            c => result.push_str(&format!("\\x{:02X}", c)),
        }
    }
    result.push('\'');
    result
}

#[derive(Clone, Copy)]
struct Flags {
    allow_in: bool,
    allow_call: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            allow_in: true,
            allow_call: true,
        }
    }
}

struct CodeGenerator {
    level: usize,
}

impl CodeGenerator {
    fn new() -> Self {
        CodeGenerator { level: 0 }
    }

    fn indent(&self) -> String {
        INDENT.repeat(self.level)
    }

    fn with_indent<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.level += 1;
        let r = f(self);
        self.level -= 1;
        r
    }

    fn block(&mut self, body: &[StatementType]) -> String {
        let mut result = String::from("{\n");
        self.with_indent(|g| {
            for stmt in body {
                result.push_str(&g.indent());
                result.push_str(&g.statement(stmt));
                result.push('\n');
            }
        });
        result.push_str(&self.indent());
        result.push('}');
        result
    }

    /// Body of `if`/`for`/`while`: blocks stay on the header line, anything
    /// else moves to its own indented line.
    fn maybe_block(&mut self, stmt: &StatementType) -> String {
        match stmt {
            StatementType::BlockStatement(data) => format!(" {}", self.block(&data.body)),
            StatementType::EmptyStatement { .. } => ";".to_string(),
            _ => self.with_indent(|g| format!("\n{}{}", g.indent(), g.statement(stmt))),
        }
    }

    fn maybe_block_suffix(&self, stmt: &StatementType) -> String {
        match stmt {
            StatementType::BlockStatement(_) => " ".to_string(),
            _ => format!("\n{}", self.indent()),
        }
    }

    fn statement(&mut self, stmt: &StatementType) -> String {
        match stmt {
            StatementType::ExpressionStatement { expression, .. } => {
                let text = self.expression(expression, PREC_SEQUENCE, Flags::default());
                if text.starts_with('{') || starts_with_keyword(&text, "function") {
                    format!("({});", text)
                } else {
                    format!("{};", text)
                }
            }
            StatementType::BlockStatement(data) => self.block(&data.body),
            StatementType::EmptyStatement { .. } => ";".to_string(),
            StatementType::DebuggerStatement { .. } => "debugger;".to_string(),
            StatementType::WithStatement { object, body, .. } => format!(
                "with ({}){}",
                self.expression(object, PREC_SEQUENCE, Flags::default()),
                self.maybe_block(body)
            ),
            StatementType::ReturnStatement { argument, .. } => match argument {
                Some(arg) => format!("return {};", self.expression(arg, PREC_SEQUENCE, Flags::default())),
                None => "return;".to_string(),
            },
            StatementType::LabeledStatement { label, body, .. } => {
                format!("{}:{}", label.name, self.maybe_block(body))
            }
            StatementType::BreakStatement { label, .. } => match label {
                Some(l) => format!("break {};", l.name),
                None => "break;".to_string(),
            },
            StatementType::ContinueStatement { label, .. } => match label {
                Some(l) => format!("continue {};", l.name),
                None => "continue;".to_string(),
            },
            StatementType::IfStatement {
                test,
                consequent,
                alternate,
                ..
            } => {
                let mut result = format!(
                    "if ({}){}",
                    self.expression(test, PREC_SEQUENCE, Flags::default()),
                    self.maybe_block(consequent)
                );
                if let Some(alt) = alternate {
                    result.push_str(&self.maybe_block_suffix(consequent));
                    match alt.as_ref() {
                        StatementType::IfStatement { .. } => {
                            result.push_str("else ");
                            result.push_str(&self.statement(alt));
                        }
                        _ => {
                            result.push_str("else");
                            result.push_str(&self.maybe_block(alt));
                        }
                    }
                }
                result
            }
            StatementType::SwitchStatement {
                discriminant, cases, ..
            } => {
                let mut result = format!(
                    "switch ({}) {{\n",
                    self.expression(discriminant, PREC_SEQUENCE, Flags::default())
                );
                self.with_indent(|g| {
                    for case in cases {
                        result.push_str(&g.indent());
                        match &case.test {
                            Some(test) => {
                                result.push_str("case ");
                                result.push_str(&g.expression(test, PREC_SEQUENCE, Flags::default()));
                                result.push(':');
                            }
                            None => result.push_str("default:"),
                        }
                        g.with_indent(|g| {
                            for stmt in &case.consequent {
                                result.push('\n');
                                result.push_str(&g.indent());
                                result.push_str(&g.statement(stmt));
                            }
                        });
                        result.push('\n');
                    }
                });
                result.push_str(&self.indent());
                result.push('}');
                result
            }
            StatementType::ThrowStatement { argument, .. } => {
                format!("throw {};", self.expression(argument, PREC_SEQUENCE, Flags::default()))
            }
            StatementType::TryStatement {
                block,
                handler,
                finalizer,
                ..
            } => {
                let mut result = format!("try {}", self.block(&block.body));
                if let Some(h) = handler {
                    result.push_str(&format!(" catch ({}) {}", h.param.name, self.block(&h.body.body)));
                }
                if let Some(f) = finalizer {
                    result.push_str(&format!(" finally {}", self.block(&f.body)));
                }
                result
            }
            StatementType::WhileStatement { test, body, .. } => format!(
                "while ({}){}",
                self.expression(test, PREC_SEQUENCE, Flags::default()),
                self.maybe_block(body)
            ),
            StatementType::DoWhileStatement { body, test, .. } => format!(
                "do{}{}while ({});",
                self.maybe_block(body),
                self.maybe_block_suffix(body),
                self.expression(test, PREC_SEQUENCE, Flags::default())
            ),
            StatementType::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                let no_in = Flags {
                    allow_in: false,
                    allow_call: true,
                };
                let mut result = String::from("for (");
                match init {
                    Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
                        result.push_str(&self.variable_declaration(decl, no_in))
                    }
                    Some(VariableDeclarationOrExpression::Expression(e)) => {
                        result.push_str(&self.expression(e, PREC_SEQUENCE, no_in))
                    }
                    None => {}
                }
                result.push(';');
                if let Some(t) = test {
                    result.push(' ');
                    result.push_str(&self.expression(t, PREC_SEQUENCE, Flags::default()));
                }
                result.push(';');
                if let Some(u) = update {
                    result.push(' ');
                    result.push_str(&self.expression(u, PREC_SEQUENCE, Flags::default()));
                }
                result.push(')');
                result.push_str(&self.maybe_block(body));
                result
            }
            StatementType::ForInStatement { left, right, body, .. } => {
                let no_in = Flags {
                    allow_in: false,
                    allow_call: true,
                };
                let left_text = match left {
                    VariableDeclarationOrExpression::VariableDeclaration(decl) => {
                        self.variable_declaration(decl, no_in)
                    }
                    VariableDeclarationOrExpression::Expression(e) => self.expression(e, PREC_CALL, no_in),
                };
                format!(
                    "for ({} in {}){}",
                    left_text,
                    self.expression(right, PREC_SEQUENCE, Flags::default()),
                    self.maybe_block(body)
                )
            }
            StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(data)) => {
                self.function(data)
            }
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(decl)) => {
                format!("{};", self.variable_declaration(decl, Flags::default()))
            }
        }
    }

    fn variable_declaration(&mut self, decl: &VariableDeclarationData, flags: Flags) -> String {
        let declarators = decl
            .declarations
            .iter()
            .map(|d| match &d.init {
                Some(init) => format!("{} = {}", d.id.name, self.expression(init, PREC_ASSIGNMENT, flags)),
                None => d.id.name.clone(),
            })
            .collect::<Vec<_>>();
        format!("{} {}", decl.kind.as_str(), declarators.join(", "))
    }

    fn function(&mut self, data: &FunctionData) -> String {
        let params = data
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let head = match &data.id {
            Some(id) => format!("function {}({})", id.name, params),
            None => format!("function ({})", params),
        };
        format!("{} {}", head, self.block(&data.body.body))
    }

    fn property_key(&mut self, key: &PropertyKey) -> String {
        match key {
            PropertyKey::Identifier(id) => id.name.clone(),
            PropertyKey::Literal(lit) => literal_text(&lit.value),
            PropertyKey::Computed(e) => format!("[{}]", self.expression(e, PREC_ASSIGNMENT, Flags::default())),
        }
    }

    fn property(&mut self, prop: &PropertyData) -> String {
        let key = self.property_key(&prop.key);
        match (prop.kind, &prop.value) {
            (PropertyKind::Get, ExpressionType::FunctionExpression(f)) => {
                format!("get {}() {}", key, self.block(&f.body.body))
            }
            (PropertyKind::Set, ExpressionType::FunctionExpression(f)) => {
                let param = f.params.first().map(|p| p.name.as_str()).unwrap_or("");
                format!("set {}({}) {}", key, param, self.block(&f.body.body))
            }
            (_, value) => format!("{}: {}", key, self.expression(value, PREC_ASSIGNMENT, Flags::default())),
        }
    }

    fn expression(&mut self, expr: &ExpressionType, precedence: u8, flags: Flags) -> String {
        let (text, own_precedence) = match expr {
            ExpressionType::Literal(lit) => {
                let text = literal_text(&lit.value);
                let own = if text.starts_with('-') { PREC_UNARY } else { PREC_PRIMARY };
                (text, own)
            }
            ExpressionType::Identifier(id) => (id.name.clone(), PREC_PRIMARY),
            ExpressionType::ThisExpression { .. } => ("this".to_string(), PREC_PRIMARY),
            ExpressionType::ArrayExpression { elements, .. } => (self.array(elements), PREC_PRIMARY),
            ExpressionType::ObjectExpression { properties, .. } => (self.object(properties), PREC_PRIMARY),
            ExpressionType::FunctionExpression(data) => (self.function(data), PREC_PRIMARY),
            ExpressionType::UnaryExpression { operator, argument, .. } => {
                let arg = self.expression(argument, PREC_UNARY, Flags::default());
                let op = operator.as_str();
                let needs_space = match operator {
                    UnaryOperator::TypeOf | UnaryOperator::Void | UnaryOperator::Delete => true,
                    UnaryOperator::Minus => arg.starts_with('-'),
                    UnaryOperator::Plus => arg.starts_with('+'),
                    _ => false,
                };
                let text = if needs_space {
                    format!("{} {}", op, arg)
                } else {
                    format!("{}{}", op, arg)
                };
                (text, PREC_UNARY)
            }
            ExpressionType::UpdateExpression {
                operator,
                argument,
                prefix,
                ..
            } => {
                if *prefix {
                    let arg = self.expression(argument, PREC_UNARY, Flags::default());
                    (format!("{}{}", operator.as_str(), arg), PREC_UNARY)
                } else {
                    let arg = self.expression(argument, PREC_POSTFIX, Flags::default());
                    (format!("{}{}", arg, operator.as_str()), PREC_POSTFIX)
                }
            }
            ExpressionType::BinaryExpression {
                operator, left, right, ..
            } => {
                let own = binary_precedence(operator);
                let inner_flags = Flags {
                    allow_in: flags.allow_in || precedence > own,
                    allow_call: true,
                };
                let l = self.expression(left, own, inner_flags);
                let r = self.expression(right, own + 1, inner_flags);
                let text = format!("{} {} {}", l, operator.as_str(), r);
                if *operator == BinaryOperator::In && !flags.allow_in {
                    return format!("({})", text);
                }
                (text, own)
            }
            ExpressionType::LogicalExpression {
                operator, left, right, ..
            } => {
                let own = match operator {
                    LogicalOperator::Or => PREC_LOGICAL_OR,
                    LogicalOperator::And => PREC_LOGICAL_AND,
                };
                let l = self.expression(left, own, flags);
                let r = self.expression(right, own + 1, flags);
                (format!("{} {} {}", l, operator.as_str(), r), own)
            }
            ExpressionType::AssignmentExpression {
                operator, left, right, ..
            } => {
                let l = self.expression(left, PREC_CALL, flags);
                let r = self.expression(right, PREC_ASSIGNMENT, flags);
                (format!("{} {} {}", l, operator.as_str(), r), PREC_ASSIGNMENT)
            }
            ExpressionType::ConditionalExpression {
                test,
                consequent,
                alternate,
                ..
            } => {
                let t = self.expression(test, PREC_LOGICAL_OR, flags);
                let c = self.expression(consequent, PREC_ASSIGNMENT, flags);
                let a = self.expression(alternate, PREC_ASSIGNMENT, flags);
                (format!("{} ? {} : {}", t, c, a), PREC_CONDITIONAL)
            }
            ExpressionType::CallExpression { callee, arguments, .. } => {
                let c = self.expression(callee, PREC_CALL, Flags::default());
                let text = format!("{}({})", c, self.arguments(arguments));
                if !flags.allow_call {
                    return format!("({})", text);
                }
                (text, PREC_CALL)
            }
            ExpressionType::NewExpression { callee, arguments, .. } => {
                let c = self.expression(
                    callee,
                    PREC_NEW,
                    Flags {
                        allow_in: true,
                        allow_call: false,
                    },
                );
                (format!("new {}({})", c, self.arguments(arguments)), PREC_NEW)
            }
            ExpressionType::SequenceExpression { expressions, .. } => {
                let parts = expressions
                    .iter()
                    .map(|e| self.expression(e, PREC_ASSIGNMENT, flags))
                    .collect::<Vec<_>>();
                (parts.join(", "), PREC_SEQUENCE)
            }
            ExpressionType::MemberExpression(member) => {
                let object = member.object();
                let mut object_text = self.expression(
                    object,
                    PREC_CALL,
                    Flags {
                        allow_in: true,
                        allow_call: flags.allow_call,
                    },
                );
                if let ExpressionType::Literal(LiteralData {
                    value: LiteralType::NumberLiteral(_),
                    ..
                }) = object
                {
                    if !object_text.contains(|c| c == '.' || c == 'e' || c == 'E' || c == '(')
                        && object_text.chars().all(|c| c.is_ascii_digit())
                    {
                        object_text.push('.');
                    }
                }
                let text = match member {
                    MemberExpressionType::SimpleMemberExpression { property, .. } => {
                        format!("{}.{}", object_text, property.name)
                    }
                    MemberExpressionType::ComputedMemberExpression { property, .. } => format!(
                        "{}[{}]",
                        object_text,
                        self.expression(property, PREC_SEQUENCE, Flags::default())
                    ),
                };
                (text, PREC_MEMBER)
            }
            ExpressionType::PendingRewrite { original, .. } => {
                return self.expression(original, precedence, flags);
            }
        };
        if own_precedence < precedence {
            format!("({})", text)
        } else {
            text
        }
    }

    fn arguments(&mut self, arguments: &[ExpressionType]) -> String {
        arguments
            .iter()
            .map(|a| self.expression(a, PREC_ASSIGNMENT, Flags::default()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn array(&mut self, elements: &[Option<ExpressionType>]) -> String {
        if elements.is_empty() {
            return "[]".to_string();
        }
        let multiline = elements.len() > 1;
        let mut result = String::from("[");
        if multiline {
            result.push('\n');
        }
        self.with_indent(|g| {
            for (i, element) in elements.iter().enumerate() {
                match element {
                    Some(e) => {
                        if multiline {
                            result.push_str(&g.indent());
                        }
                        result.push_str(&g.expression(e, PREC_ASSIGNMENT, Flags::default()));
                    }
                    None => {
                        if multiline {
                            result.push_str(&g.indent());
                        }
                        if i + 1 == elements.len() {
                            result.push(',');
                        }
                    }
                }
                if i + 1 < elements.len() {
                    result.push(',');
                    if multiline {
                        result.push('\n');
                    }
                }
            }
        });
        if multiline {
            result.push('\n');
            result.push_str(&self.indent());
        }
        result.push(']');
        result
    }

    fn object(&mut self, properties: &[PropertyData]) -> String {
        if properties.is_empty() {
            return "{}".to_string();
        }
        if properties.len() == 1 {
            let single = self.with_indent(|g| g.property(&properties[0]));
            if !single.contains('\n') {
                return format!("{{ {} }}", single);
            }
        }
        let mut result = String::from("{\n");
        self.with_indent(|g| {
            let parts = properties
                .iter()
                .map(|p| format!("{}{}", g.indent(), g.property(p)))
                .collect::<Vec<_>>();
            result.push_str(&parts.join(",\n"));
        });
        result.push('\n');
        result.push_str(&self.indent());
        result.push('}');
        result
    }
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.starts_with(keyword)
        && !text[keyword.len()..]
            .chars()
            .next()
            .map(|c| c.is_alphanumeric() || c == '_' || c == '$')
            .unwrap_or(false)
}

fn binary_precedence(operator: &BinaryOperator) -> u8 {
    match operator {
        BinaryOperator::BitwiseOr => PREC_BITWISE_OR,
        BinaryOperator::BitwiseXor => PREC_BITWISE_XOR,
        BinaryOperator::BitwiseAnd => PREC_BITWISE_AND,
        BinaryOperator::LooselyEqual
        | BinaryOperator::LooselyUnequal
        | BinaryOperator::StrictlyEqual
        | BinaryOperator::StrictlyUnequal => PREC_EQUALITY,
        BinaryOperator::LessThan
        | BinaryOperator::LessThanEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanEqual
        | BinaryOperator::In
        | BinaryOperator::InstanceOf => PREC_RELATIONAL,
        BinaryOperator::BitwiseLeftShift
        | BinaryOperator::BitwiseRightShift
        | BinaryOperator::BitwiseUnsignedRightShift => PREC_BITWISE_SHIFT,
        BinaryOperator::Add | BinaryOperator::Subtract => PREC_ADDITIVE,
        BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => PREC_MULTIPLICATIVE,
    }
}

fn literal_text(value: &LiteralType) -> String {
    match value {
        LiteralType::StringLiteral(s) => quote_string(s),
        LiteralType::BooleanLiteral(b) => b.to_string(),
        LiteralType::NullLiteral => "null".to_string(),
        LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(i)) => i.to_string(),
        LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(f)) => number_to_string(*f),
        LiteralType::RegExpLiteral(re) => format!("/{}/{}", re.pattern, re.flags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsParser;

    fn regenerate(code: &str) -> String {
        generate(&JsParser::parse_to_ast(code).unwrap())
    }

    #[test]
    fn test_iife_is_wrapped_in_parentheses() {
        assert_eq!(
            regenerate("(function(){ return 1; })();"),
            "(function () {\n    return 1;\n}());"
        );
    }

    #[test]
    fn test_precedence_drives_parentheses() {
        assert_eq!(regenerate("(a + b) * c;"), "(a + b) * c;");
        assert_eq!(regenerate("a + (b + c);"), "a + (b + c);");
        assert_eq!(regenerate("((a + b)) + c;"), "a + b + c;");
        assert_eq!(regenerate("-(-x);"), "- -x;");
        assert_eq!(regenerate("new (a())();"), "new (a())();");
    }

    #[test]
    fn test_strings_use_single_quotes_and_escapes() {
        assert_eq!(quote_string("it's"), "'it\\'s'");
        assert_eq!(quote_string("a\nb"), "'a\\nb'");
        assert_eq!(quote_string("\u{e9}"), "'\\xE9'");
        assert_eq!(quote_string("\u{4e2d}"), "'\\u4E2D'");
    }

    #[test]
    fn test_arrays_and_objects_layout() {
        assert_eq!(regenerate("var a = [1];"), "var a = [1];");
        assert_eq!(regenerate("var a = [1, 2];"), "var a = [\n    1,\n    2\n];");
        assert_eq!(regenerate("var o = {x: 1};"), "var o = { x: 1 };");
        assert_eq!(regenerate("var o = {x: 1, 'y': 2};"), "var o = {\n    x: 1,\n    'y': 2\n};");
    }

    #[test]
    fn test_number_member_access_keeps_dot() {
        assert_eq!(regenerate("5..toString();"), "5..toString();");
        assert_eq!(regenerate("0x1F;"), "31;");
    }

    #[test]
    fn test_control_flow_layout() {
        assert_eq!(
            regenerate("if (a) b(); else { c(); }"),
            "if (a)\n    b();\nelse {\n    c();\n}"
        );
        assert_eq!(
            regenerate("for (var i = 0; i < 3; i++) { x += i; }"),
            "for (var i = 0; i < 3; i++) {\n    x += i;\n}"
        );
        assert_eq!(
            regenerate("switch (x) { case 1: y(); break; default: z(); }"),
            "switch (x) {\n    case 1:\n        y();\n        break;\n    default:\n        z();\n}"
        );
    }
}
