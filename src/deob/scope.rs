//! Lexical scope analysis.
//!
//! A single walk of the program records scopes, the variables each scope
//! declares and every identifier slot that refers to them. References and
//! definitions point back into the tree by [`IdentId`], never by node
//! address, so the tree can be rewritten with the analysis in hand.

use std::collections::HashMap;

use crate::deob::visit::{visit_program, Access, IdentId, IdentRole, ScopeKind, Visit, Visitor};
use crate::parser::ast::{
    ExpressionType, IdentifierData, ProgramData, StatementType, VariableDeclarationKind, VariableDeclaratorData,
};

pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Variable(VariableDeclarationKind),
    Parameter,
    FunctionName,
    CatchParameter,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub id: IdentId,
    pub kind: DefinitionKind,
    /// Initializer of a variable declarator.
    pub init: Option<ExpressionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub id: IdentId,
    pub access: Access,
}

impl Reference {
    pub fn is_write(&self) -> bool {
        matches!(self.access, Access::Write | Access::ReadWrite)
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub definitions: Vec<Definition>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub variables: Vec<Variable>,
    /// Set when a direct `eval` or a `with` statement can reach the scope's
    /// bindings by name.
    pub poisoned: bool,
    names: HashMap<String, usize>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Scope {
            kind,
            parent,
            variables: vec![],
            poisoned: false,
            names: HashMap::new(),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.names.get(name).map(|&index| &self.variables[index])
    }

    fn variable_index(&mut self, name: &str) -> usize {
        if let Some(&index) = self.names.get(name) {
            return index;
        }
        self.variables.push(Variable {
            name: name.to_string(),
            definitions: vec![],
            references: vec![],
        });
        let index = self.variables.len() - 1;
        self.names.insert(name.to_string(), index);
        index
    }
}

/// Result of analysing one program. Scope `0` is the program scope; names
/// that no scope declares are resolved to implicit variables there.
#[derive(Debug, Clone)]
pub struct ScopeManager {
    pub scopes: Vec<Scope>,
}

impl ScopeManager {
    pub fn analyze(program: &ProgramData) -> ScopeManager {
        let mut analyzer = Analyzer::default();
        visit_program(program, &mut analyzer);
        analyzer.finish()
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Every variable together with the scope that declares it.
    pub fn variables(&self) -> impl Iterator<Item = (ScopeId, &Variable)> {
        self.scopes
            .iter()
            .enumerate()
            .flat_map(|(id, scope)| scope.variables.iter().map(move |v| (id, v)))
    }

    /// Variables with the given name, innermost scopes last.
    pub fn variables_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (ScopeId, &'a Variable)> + 'a {
        self.variables().filter(move |(_, v)| v.name == name)
    }
}

struct PendingReference {
    scope: ScopeId,
    name: String,
    reference: Reference,
}

#[derive(Default)]
struct Analyzer {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
    references: Vec<PendingReference>,
    /// Declarator slot to the definition it created.
    declarators: HashMap<IdentId, (ScopeId, usize, usize)>,
}

impl Analyzer {
    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(0)
    }

    /// Nearest function or program scope, where `var` and function
    /// declarations land.
    fn hoisting_scope(&self) -> ScopeId {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&id| matches!(self.scopes[id].kind, ScopeKind::Function | ScopeKind::Program))
            .unwrap_or(0)
    }

    /// Whether a catch parameter between the current scope and `hoisted`
    /// binds `name`. A `var` initializer there assigns the parameter.
    fn caught_between(&self, hoisted: ScopeId, name: &str) -> bool {
        self.stack
            .iter()
            .rev()
            .take_while(|&&id| id != hoisted)
            .any(|&id| self.scopes[id].kind == ScopeKind::Catch && self.scopes[id].names.contains_key(name))
    }

    fn define(&mut self, scope: ScopeId, name: &str, definition: Definition) -> (ScopeId, usize, usize) {
        let scope_ref = &mut self.scopes[scope];
        let index = scope_ref.variable_index(name);
        let definitions = &mut scope_ref.variables[index].definitions;
        definitions.push(definition);
        (scope, index, definitions.len() - 1)
    }

    fn refer(&mut self, name: &str, id: IdentId, access: Access) {
        self.references.push(PendingReference {
            scope: self.current(),
            name: name.to_string(),
            reference: Reference { id, access },
        });
    }

    fn poison(&mut self) {
        let mut scope = Some(self.current());
        while let Some(id) = scope {
            self.scopes[id].poisoned = true;
            scope = self.scopes[id].parent;
        }
    }

    fn resolve(&self, mut scope: ScopeId, name: &str) -> ScopeId {
        loop {
            if self.scopes[scope].names.contains_key(name) {
                return scope;
            }
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => return scope,
            }
        }
    }

    fn finish(mut self) -> ScopeManager {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::new(ScopeKind::Program, None));
        }
        let references = std::mem::take(&mut self.references);
        for pending in references {
            let scope = self.resolve(pending.scope, &pending.name);
            let target = &mut self.scopes[scope];
            let index = target.variable_index(&pending.name);
            target.variables[index].references.push(pending.reference);
        }
        ScopeManager { scopes: self.scopes }
    }
}

impl Visitor for Analyzer {
    fn enter_scope(&mut self, kind: ScopeKind) {
        let parent = self.stack.last().copied();
        self.scopes.push(Scope::new(kind, parent));
        self.stack.push(self.scopes.len() - 1);
    }

    fn leave_scope(&mut self) {
        self.stack.pop();
    }

    fn enter_statement(&mut self, stmt: &StatementType) -> Visit<StatementType> {
        if let StatementType::WithStatement { .. } = stmt {
            self.poison();
        }
        Visit::Keep
    }

    fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
        if let ExpressionType::CallExpression { callee, .. } = expr {
            if callee.is_identifier_named("eval") {
                self.poison();
            }
        }
        Visit::Keep
    }

    fn identifier(&mut self, id: IdentId, ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
        match role {
            IdentRole::Reference(access) => self.refer(&ident.name, id, access),
            IdentRole::Declarator { kind, writes } => {
                let scope = match kind {
                    VariableDeclarationKind::Var => self.hoisting_scope(),
                    VariableDeclarationKind::Let | VariableDeclarationKind::Const => self.current(),
                };
                let definition = Definition {
                    id,
                    kind: DefinitionKind::Variable(kind),
                    init: None,
                };
                let caught = kind == VariableDeclarationKind::Var && self.caught_between(scope, &ident.name);
                let location = self.define(scope, &ident.name, definition);
                // The initializer of `catch (e) { var e = v; }` writes the
                // parameter, so the hoisted `e` gets no initializer.
                if !caught {
                    self.declarators.insert(id, location);
                }
                if writes {
                    self.refer(&ident.name, id, Access::Write);
                }
            }
            IdentRole::Parameter => {
                let scope = self.current();
                self.define(scope, &ident.name, simple_definition(id, DefinitionKind::Parameter));
            }
            IdentRole::FunctionName { declaration } => {
                let scope = if declaration { self.hoisting_scope() } else { self.current() };
                self.define(scope, &ident.name, simple_definition(id, DefinitionKind::FunctionName));
            }
            IdentRole::CatchParameter => {
                let scope = self.current();
                self.define(scope, &ident.name, simple_definition(id, DefinitionKind::CatchParameter));
            }
        }
        Visit::Keep
    }

    fn declarator(&mut self, id: IdentId, declarator: &VariableDeclaratorData) -> Visit<VariableDeclaratorData> {
        if let Some(&(scope, variable, definition)) = self.declarators.get(&id) {
            self.scopes[scope].variables[variable].definitions[definition].init = declarator.init.clone();
        }
        Visit::Keep
    }
}

fn simple_definition(id: IdentId, kind: DefinitionKind) -> Definition {
    Definition { id, kind, init: None }
}
