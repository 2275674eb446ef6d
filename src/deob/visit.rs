//! Tree rewrite driver.
//!
//! Passes implement [`Visitor`] and return a [`Visit`] decision from each
//! hook; the driver owns the traversal order and rebuilds the tree from the
//! decisions. Every identifier slot (references, declarator ids, parameters,
//! function names and catch parameters) is numbered in traversal order.
//! The number is an [`IdentId`]: walking an unchanged tree twice hands out
//! the same ids, which is how scope analysis results are mapped back onto
//! the tree by a later rewrite.
//!
//! Property names of non-computed member accesses, object literal keys and
//! labels are not identifier slots.

use crate::parser::ast::{
    AssignmentOperator, BlockStatementData, CatchClauseData, DeclarationType, ExpressionType,
    FunctionBodyData, FunctionData, IdentifierData, LiteralType, MemberExpressionType, Meta,
    NumberLiteralType, ProgramData, PropertyData, PropertyKey, StatementType, SwitchCaseData,
    UnaryOperator, VariableDeclarationData,
    VariableDeclarationKind, VariableDeclarationOrExpression, VariableDeclaratorData,
};

/// Ordinal of an identifier slot in traversal order.
pub type IdentId = usize;

/// Decision returned by a visitor hook.
#[derive(Debug, Clone)]
pub enum Visit<T> {
    /// Leave the node alone and keep walking.
    Keep,
    /// Substitute the node. The replacement is not walked.
    Replace(T),
    /// Drop the node from its parent. Statements drop out of their list
    /// (a single-statement slot becomes `;`), declarators out of their
    /// declaration, expressions out of sequence, array and argument lists.
    /// Any other expression slot becomes `void 0`.
    Remove,
    /// Keep the node but do not walk into it.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// What an identifier slot means at the place it occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentRole {
    Reference(Access),
    /// A declarator id. `writes` is set when the declarator stores a value:
    /// it has an initializer or it is the left side of a `for-in`.
    Declarator {
        kind: VariableDeclarationKind,
        writes: bool,
    },
    Parameter,
    FunctionName {
        declaration: bool,
    },
    CatchParameter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Block,
    Catch,
}

/// Hooks called by the driver. All of them default to [`Visit::Keep`].
///
/// `identifier` is called for every identifier slot. A replacement is only
/// honoured for reference slots; declaring slots cannot be replaced.
pub trait Visitor {
    fn enter_scope(&mut self, _kind: ScopeKind) {}

    fn leave_scope(&mut self) {}

    fn enter_statement(&mut self, _stmt: &StatementType) -> Visit<StatementType> {
        Visit::Keep
    }

    fn leave_statement(&mut self, _stmt: &StatementType) -> Visit<StatementType> {
        Visit::Keep
    }

    fn enter_expression(&mut self, _expr: &ExpressionType) -> Visit<ExpressionType> {
        Visit::Keep
    }

    fn leave_expression(&mut self, _expr: &ExpressionType) -> Visit<ExpressionType> {
        Visit::Keep
    }

    fn identifier(&mut self, _id: IdentId, _ident: &IdentifierData, _role: IdentRole) -> Visit<ExpressionType> {
        Visit::Keep
    }

    /// Called after a declarator's id and initializer were walked. `id` is
    /// the declarator id's slot.
    fn declarator(&mut self, _id: IdentId, _declarator: &VariableDeclaratorData) -> Visit<VariableDeclaratorData> {
        Visit::Keep
    }
}

/// Walks a whole program, returning the rewritten tree.
pub fn rewrite_program<V: Visitor>(program: ProgramData, visitor: &mut V) -> ProgramData {
    let mut driver = Driver { visitor, next_id: 0 };
    driver.visitor.enter_scope(ScopeKind::Program);
    let body = driver.walk_statements(program.body);
    driver.visitor.leave_scope();
    ProgramData {
        meta: program.meta,
        body,
    }
}

/// Walks a program without rewriting it.
pub fn visit_program<V: Visitor>(program: &ProgramData, visitor: &mut V) {
    rewrite_program(program.clone(), visitor);
}

/// Walks a single expression as if it were a whole program.
pub fn rewrite_expression<V: Visitor>(expr: ExpressionType, visitor: &mut V) -> ExpressionType {
    let mut driver = Driver { visitor, next_id: 0 };
    driver.walk_expression(expr, Access::Read)
}

struct Noop;

impl Visitor for Noop {}

fn statement_slots(stmt: &StatementType) -> usize {
    let mut noop = Noop;
    let mut driver = Driver {
        visitor: &mut noop,
        next_id: 0,
    };
    driver.walk_statement(stmt.clone());
    driver.next_id
}

fn expression_slots(expr: &ExpressionType) -> usize {
    let mut noop = Noop;
    let mut driver = Driver {
        visitor: &mut noop,
        next_id: 0,
    };
    driver.walk_expression(expr.clone(), Access::Read);
    driver.next_id
}

fn void_zero() -> ExpressionType {
    ExpressionType::UnaryExpression {
        meta: Meta::synthetic(),
        operator: UnaryOperator::Void,
        argument: Box::new(ExpressionType::new_literal(LiteralType::NumberLiteral(
            NumberLiteralType::IntegerLiteral(0),
        ))),
    }
}

struct Driver<'v, V: Visitor> {
    visitor: &'v mut V,
    next_id: IdentId,
}

impl<'v, V: Visitor> Driver<'v, V> {
    fn take_id(&mut self) -> IdentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn walk_statements(&mut self, body: Vec<StatementType>) -> Vec<StatementType> {
        body.into_iter()
            .filter_map(|stmt| self.walk_statement(stmt))
            .collect()
    }

    /// A statement in a single-statement slot such as a loop body.
    fn walk_body(&mut self, body: Box<StatementType>) -> Box<StatementType> {
        Box::new(self.walk_statement(*body).unwrap_or_else(StatementType::empty))
    }

    fn walk_block(&mut self, block: BlockStatementData) -> BlockStatementData {
        self.visitor.enter_scope(ScopeKind::Block);
        let body = self.walk_statements(block.body);
        self.visitor.leave_scope();
        BlockStatementData {
            meta: block.meta,
            body,
        }
    }

    fn walk_statement(&mut self, stmt: StatementType) -> Option<StatementType> {
        match self.visitor.enter_statement(&stmt) {
            Visit::Keep => {}
            Visit::Replace(new) => {
                self.next_id += statement_slots(&stmt);
                return Some(new);
            }
            Visit::Remove => {
                self.next_id += statement_slots(&stmt);
                return None;
            }
            Visit::Skip => {
                self.next_id += statement_slots(&stmt);
                return Some(stmt);
            }
        }
        let stmt = self.walk_statement_children(stmt)?;
        match self.visitor.leave_statement(&stmt) {
            Visit::Keep | Visit::Skip => Some(stmt),
            Visit::Replace(new) => Some(new),
            Visit::Remove => None,
        }
    }

    fn walk_statement_children(&mut self, stmt: StatementType) -> Option<StatementType> {
        Some(match stmt {
            StatementType::ExpressionStatement { meta, expression } => StatementType::ExpressionStatement {
                meta,
                expression: self.walk_expression(expression, Access::Read),
            },
            StatementType::BlockStatement(block) => StatementType::BlockStatement(self.walk_block(block)),
            StatementType::EmptyStatement { .. } | StatementType::DebuggerStatement { .. } => stmt,
            StatementType::WithStatement { meta, object, body } => StatementType::WithStatement {
                meta,
                object: self.walk_expression(object, Access::Read),
                body: self.walk_body(body),
            },
            StatementType::ReturnStatement { meta, argument } => StatementType::ReturnStatement {
                meta,
                argument: argument.map(|a| self.walk_expression(a, Access::Read)),
            },
            StatementType::LabeledStatement { meta, label, body } => StatementType::LabeledStatement {
                meta,
                label,
                body: self.walk_body(body),
            },
            StatementType::BreakStatement { .. } | StatementType::ContinueStatement { .. } => stmt,
            StatementType::IfStatement {
                meta,
                test,
                consequent,
                alternate,
            } => StatementType::IfStatement {
                meta,
                test: self.walk_expression(test, Access::Read),
                consequent: self.walk_body(consequent),
                alternate: alternate.map(|a| self.walk_body(a)),
            },
            StatementType::SwitchStatement {
                meta,
                discriminant,
                cases,
            } => {
                let discriminant = self.walk_expression(discriminant, Access::Read);
                self.visitor.enter_scope(ScopeKind::Block);
                let cases = cases
                    .into_iter()
                    .map(|case| SwitchCaseData {
                        meta: case.meta,
                        test: case.test.map(|t| self.walk_expression(t, Access::Read)),
                        consequent: self.walk_statements(case.consequent),
                    })
                    .collect();
                self.visitor.leave_scope();
                StatementType::SwitchStatement {
                    meta,
                    discriminant,
                    cases,
                }
            }
            StatementType::ThrowStatement { meta, argument } => StatementType::ThrowStatement {
                meta,
                argument: self.walk_expression(argument, Access::Read),
            },
            StatementType::TryStatement {
                meta,
                block,
                handler,
                finalizer,
            } => {
                let block = self.walk_block(block);
                let handler = handler.map(|h| self.walk_catch(h));
                let finalizer = finalizer.map(|f| self.walk_block(f));
                StatementType::TryStatement {
                    meta,
                    block,
                    handler,
                    finalizer,
                }
            }
            StatementType::WhileStatement { meta, test, body } => StatementType::WhileStatement {
                meta,
                test: self.walk_expression(test, Access::Read),
                body: self.walk_body(body),
            },
            StatementType::DoWhileStatement { meta, body, test } => {
                let body = self.walk_body(body);
                StatementType::DoWhileStatement {
                    meta,
                    body,
                    test: self.walk_expression(test, Access::Read),
                }
            }
            StatementType::ForStatement {
                meta,
                init,
                test,
                update,
                body,
            } => {
                self.visitor.enter_scope(ScopeKind::Block);
                let init = match init {
                    Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => self
                        .walk_declaration(decl, false)
                        .map(VariableDeclarationOrExpression::VariableDeclaration),
                    Some(VariableDeclarationOrExpression::Expression(e)) => Some(
                        VariableDeclarationOrExpression::Expression(self.walk_expression(e, Access::Read)),
                    ),
                    None => None,
                };
                let test = test.map(|t| self.walk_expression(t, Access::Read));
                let update = update.map(|u| self.walk_expression(u, Access::Read));
                let body = self.walk_body(body);
                self.visitor.leave_scope();
                StatementType::ForStatement {
                    meta,
                    init,
                    test,
                    update,
                    body,
                }
            }
            StatementType::ForInStatement { meta, left, right, body } => {
                self.visitor.enter_scope(ScopeKind::Block);
                let left = match left {
                    VariableDeclarationOrExpression::VariableDeclaration(decl) => {
                        VariableDeclarationOrExpression::VariableDeclaration(self.walk_for_in_declaration(decl))
                    }
                    VariableDeclarationOrExpression::Expression(e) => {
                        VariableDeclarationOrExpression::Expression(self.walk_expression(e, Access::Write))
                    }
                };
                let right = self.walk_expression(right, Access::Read);
                let body = self.walk_body(body);
                self.visitor.leave_scope();
                StatementType::ForInStatement { meta, left, right, body }
            }
            StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(f)) => {
                StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(self.walk_function(f, true)))
            }
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(decl)) => {
                StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(
                    self.walk_declaration(decl, false)?,
                ))
            }
        })
    }

    fn walk_catch(&mut self, handler: CatchClauseData) -> CatchClauseData {
        self.visitor.enter_scope(ScopeKind::Catch);
        let id = self.take_id();
        self.visitor.identifier(id, &handler.param, IdentRole::CatchParameter);
        let body = self.walk_statements(handler.body.body);
        self.visitor.leave_scope();
        CatchClauseData {
            meta: handler.meta,
            param: handler.param,
            body: BlockStatementData {
                meta: handler.body.meta,
                body,
            },
        }
    }

    /// Returns `None` once every declarator has been removed.
    fn walk_declaration(&mut self, decl: VariableDeclarationData, for_in: bool) -> Option<VariableDeclarationData> {
        let kind = decl.kind;
        let mut declarations = Vec::with_capacity(decl.declarations.len());
        for declarator in decl.declarations {
            let id = self.take_id();
            let role = IdentRole::Declarator {
                kind,
                writes: for_in || declarator.init.is_some(),
            };
            self.visitor.identifier(id, &declarator.id, role);
            let declarator = VariableDeclaratorData {
                meta: declarator.meta,
                id: declarator.id,
                init: declarator.init.map(|e| self.walk_expression(e, Access::Read)),
            };
            match self.visitor.declarator(id, &declarator) {
                Visit::Keep | Visit::Skip => declarations.push(declarator),
                Visit::Replace(new) => declarations.push(new),
                Visit::Remove if for_in => declarations.push(declarator),
                Visit::Remove => {}
            }
        }
        if declarations.is_empty() {
            None
        } else {
            Some(VariableDeclarationData {
                meta: decl.meta,
                declarations,
                kind,
            })
        }
    }

    /// The left side of a `for-in` always keeps its declaration.
    fn walk_for_in_declaration(&mut self, decl: VariableDeclarationData) -> VariableDeclarationData {
        let fallback = VariableDeclarationData {
            meta: decl.meta.clone(),
            declarations: vec![],
            kind: decl.kind,
        };
        self.walk_declaration(decl, true).unwrap_or(fallback)
    }

    fn walk_function(&mut self, f: FunctionData, declaration: bool) -> FunctionData {
        if declaration {
            if let Some(name) = &f.id {
                let id = self.take_id();
                self.visitor
                    .identifier(id, name, IdentRole::FunctionName { declaration: true });
            }
        }
        self.visitor.enter_scope(ScopeKind::Function);
        if !declaration {
            if let Some(name) = &f.id {
                let id = self.take_id();
                self.visitor
                    .identifier(id, name, IdentRole::FunctionName { declaration: false });
            }
        }
        for param in &f.params {
            let id = self.take_id();
            self.visitor.identifier(id, param, IdentRole::Parameter);
        }
        let body = self.walk_statements(f.body.body);
        self.visitor.leave_scope();
        FunctionData {
            meta: f.meta,
            id: f.id,
            params: f.params,
            body: FunctionBodyData {
                meta: f.body.meta,
                body,
            },
        }
    }

    fn walk_expression(&mut self, expr: ExpressionType, access: Access) -> ExpressionType {
        self.walk_expression_item(expr, access).unwrap_or_else(void_zero)
    }

    fn walk_expression_list(&mut self, list: Vec<ExpressionType>) -> Vec<ExpressionType> {
        list.into_iter()
            .filter_map(|e| self.walk_expression_item(e, Access::Read))
            .collect()
    }

    /// Returns `None` when the visitor removed the expression.
    fn walk_expression_item(&mut self, expr: ExpressionType, access: Access) -> Option<ExpressionType> {
        match self.visitor.enter_expression(&expr) {
            Visit::Keep => {}
            Visit::Replace(new) => {
                self.next_id += expression_slots(&expr);
                return Some(new);
            }
            Visit::Remove => {
                self.next_id += expression_slots(&expr);
                return None;
            }
            Visit::Skip => {
                self.next_id += expression_slots(&expr);
                return Some(expr);
            }
        }
        let expr = match expr {
            ExpressionType::Identifier(ident) => {
                let id = self.take_id();
                match self.visitor.identifier(id, &ident, IdentRole::Reference(access)) {
                    Visit::Replace(new) => return Some(new),
                    Visit::Remove => return None,
                    Visit::Keep | Visit::Skip => ExpressionType::Identifier(ident),
                }
            }
            ExpressionType::Literal(_) | ExpressionType::ThisExpression { .. } => expr,
            // Scaffolding of an in-flight rewrite owns no live slots.
            ExpressionType::PendingRewrite { .. } => expr,
            ExpressionType::ArrayExpression { meta, elements } => ExpressionType::ArrayExpression {
                meta,
                elements: elements
                    .into_iter()
                    .filter_map(|element| match element {
                        Some(e) => self.walk_expression_item(e, Access::Read).map(Some),
                        None => Some(None),
                    })
                    .collect(),
            },
            ExpressionType::ObjectExpression { meta, properties } => ExpressionType::ObjectExpression {
                meta,
                properties: properties
                    .into_iter()
                    .map(|p| self.walk_property(p))
                    .collect(),
            },
            ExpressionType::FunctionExpression(f) => ExpressionType::FunctionExpression(self.walk_function(f, false)),
            ExpressionType::UnaryExpression {
                meta,
                operator,
                argument,
            } => ExpressionType::UnaryExpression {
                meta,
                operator,
                argument: Box::new(self.walk_expression(*argument, Access::Read)),
            },
            ExpressionType::UpdateExpression {
                meta,
                operator,
                argument,
                prefix,
            } => ExpressionType::UpdateExpression {
                meta,
                operator,
                argument: Box::new(self.walk_expression(*argument, Access::ReadWrite)),
                prefix,
            },
            ExpressionType::BinaryExpression {
                meta,
                operator,
                left,
                right,
            } => {
                let left = self.walk_expression(*left, Access::Read);
                let right = self.walk_expression(*right, Access::Read);
                ExpressionType::BinaryExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            ExpressionType::LogicalExpression {
                meta,
                operator,
                left,
                right,
            } => {
                let left = self.walk_expression(*left, Access::Read);
                let right = self.walk_expression(*right, Access::Read);
                ExpressionType::LogicalExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            ExpressionType::AssignmentExpression {
                meta,
                operator,
                left,
                right,
            } => {
                let target_access = if operator == AssignmentOperator::Equals {
                    Access::Write
                } else {
                    Access::ReadWrite
                };
                let left = self.walk_expression(*left, target_access);
                let right = self.walk_expression(*right, Access::Read);
                ExpressionType::AssignmentExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            ExpressionType::ConditionalExpression {
                meta,
                test,
                consequent,
                alternate,
            } => {
                let test = self.walk_expression(*test, Access::Read);
                let consequent = self.walk_expression(*consequent, Access::Read);
                let alternate = self.walk_expression(*alternate, Access::Read);
                ExpressionType::ConditionalExpression {
                    meta,
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                }
            }
            ExpressionType::CallExpression { meta, callee, arguments } => {
                let callee = self.walk_expression(*callee, Access::Read);
                ExpressionType::CallExpression {
                    meta,
                    callee: Box::new(callee),
                    arguments: self.walk_expression_list(arguments),
                }
            }
            ExpressionType::NewExpression { meta, callee, arguments } => {
                let callee = self.walk_expression(*callee, Access::Read);
                ExpressionType::NewExpression {
                    meta,
                    callee: Box::new(callee),
                    arguments: self.walk_expression_list(arguments),
                }
            }
            ExpressionType::SequenceExpression { meta, expressions } => ExpressionType::SequenceExpression {
                meta,
                expressions: self.walk_expression_list(expressions),
            },
            ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                meta,
                object,
                property,
            }) => ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                meta,
                object: Box::new(self.walk_expression(*object, Access::Read)),
                property,
            }),
            ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                meta,
                object,
                property,
            }) => {
                let object = self.walk_expression(*object, Access::Read);
                let property = self.walk_expression(*property, Access::Read);
                ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                    meta,
                    object: Box::new(object),
                    property: Box::new(property),
                })
            }
        };
        match self.visitor.leave_expression(&expr) {
            Visit::Keep | Visit::Skip => Some(expr),
            Visit::Replace(new) => Some(new),
            Visit::Remove => None,
        }
    }

    fn walk_property(&mut self, property: PropertyData) -> PropertyData {
        let key = match property.key {
            PropertyKey::Computed(e) => PropertyKey::Computed(Box::new(self.walk_expression(*e, Access::Read))),
            key => key,
        };
        PropertyData {
            meta: property.meta,
            key,
            value: self.walk_expression(property.value, Access::Read),
            kind: property.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::codegen::generate;
    use crate::parser::JsParser;

    fn parse(code: &str) -> ProgramData {
        JsParser::parse_to_ast(code).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        slots: Vec<(IdentId, String, IdentRole)>,
    }

    impl Visitor for Recorder {
        fn identifier(&mut self, id: IdentId, ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
            self.slots.push((id, ident.name.clone(), role));
            Visit::Keep
        }
    }

    #[test]
    fn test_slots_are_numbered_in_order() {
        let program = parse("var a = b; function f(x) { a = x; obj.prop; a += 1; } try {} catch (e) {}");
        let mut recorder = Recorder::default();
        visit_program(&program, &mut recorder);
        let names: Vec<_> = recorder.slots.iter().map(|(id, name, _)| (*id, name.as_str())).collect();
        assert_eq!(
            names,
            vec![(0, "a"), (1, "b"), (2, "f"), (3, "x"), (4, "a"), (5, "x"), (6, "obj"), (7, "a"), (8, "e")]
        );
        assert_eq!(recorder.slots[4].2, IdentRole::Reference(Access::Write));
        assert_eq!(recorder.slots[7].2, IdentRole::Reference(Access::ReadWrite));
        assert_eq!(
            recorder.slots[0].2,
            IdentRole::Declarator {
                kind: VariableDeclarationKind::Var,
                writes: true
            }
        );
    }

    struct ReplaceCalls;

    impl Visitor for ReplaceCalls {
        fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
            match expr {
                ExpressionType::CallExpression { .. } => Visit::Replace(ExpressionType::new_literal(
                    LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(7)),
                )),
                _ => Visit::Keep,
            }
        }
    }

    #[test]
    fn test_replace_keeps_later_ids_stable() {
        let program = parse("f(a, b); c;");
        let mut recorder = Recorder::default();
        visit_program(&program, &mut recorder);
        assert_eq!(recorder.slots.last().map(|s| s.0), Some(3));

        struct Both(ReplaceCalls, Recorder);
        impl Visitor for Both {
            fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
                self.0.enter_expression(expr)
            }
            fn identifier(&mut self, id: IdentId, ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
                self.1.identifier(id, ident, role)
            }
        }
        let mut both = Both(ReplaceCalls, Recorder::default());
        let rewritten = rewrite_program(program, &mut both);
        assert_eq!(generate(&rewritten), "7;\nc;");
        assert_eq!(both.1.slots, vec![(3, "c".to_string(), IdentRole::Reference(Access::Read))]);
    }

    struct RemoveDeclarators(&'static str);

    impl Visitor for RemoveDeclarators {
        fn declarator(&mut self, _id: IdentId, declarator: &VariableDeclaratorData) -> Visit<VariableDeclaratorData> {
            if declarator.id.name == self.0 {
                Visit::Remove
            } else {
                Visit::Keep
            }
        }
    }

    #[test]
    fn test_removing_declarators() {
        let rewrite = |code: &str| generate(&rewrite_program(parse(code), &mut RemoveDeclarators("a")));
        assert_eq!(rewrite("var a = 1, b = 2; x();"), "var b = 2;\nx();");
        assert_eq!(rewrite("var a = 1; x();"), "x();");
        assert_eq!(rewrite("if (x) var a = 1;"), "if (x);");
        assert_eq!(rewrite("for (var a = 0; x;) {}"), "for (; x;) {\n}");
        assert_eq!(rewrite("for (var a in o) {}"), "for (var a in o) {\n}");
    }

    struct RemoveIdentifier(&'static str);

    impl Visitor for RemoveIdentifier {
        fn identifier(&mut self, _id: IdentId, ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
            if ident.name == self.0 && matches!(role, IdentRole::Reference(_)) {
                Visit::Remove
            } else {
                Visit::Keep
            }
        }
    }

    #[test]
    fn test_removed_expressions_leave_lists() {
        let rewrite = |code: &str| generate(&rewrite_program(parse(code), &mut RemoveIdentifier("x")));
        assert_eq!(rewrite("f(x, y);"), "f(y);");
        assert_eq!(rewrite("(x, y);"), "y;");
        assert_eq!(rewrite("y = x;"), "y = void 0;");
    }

    #[test]
    fn test_member_property_names_are_not_slots() {
        let program = parse("a.b; a['c']; ({ d: e });");
        let mut recorder = Recorder::default();
        visit_program(&program, &mut recorder);
        let names: Vec<_> = recorder.slots.iter().map(|(_, name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "a", "e"]);
    }
}
