//! Inlining of single-assignment variables with literal values.
//!
//! Each sweep analyses scopes from scratch, picks every variable that is
//! declared exactly once with a reducible initializer and never written
//! afterwards, substitutes the folded literal for each of its reads and
//! removes the declarator. Sweeps repeat until one changes nothing, since
//! inlining one variable can make another's initializer reducible.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::deob::normalize::normalize;
use crate::deob::reducer::{reduce, AllowedKinds, Reduction};
use crate::deob::scope::{DefinitionKind, ScopeManager, Variable};
use crate::deob::visit::{rewrite_program, IdentId, IdentRole, Visit, Visitor};
use crate::parser::ast::{ExpressionType, IdentifierData, LiteralType, ProgramData, VariableDeclaratorData};

/// Node kinds an initializer may be built from.
pub const INLINE_KINDS: AllowedKinds = AllowedKinds::GENERAL;

#[derive(Debug, Clone, Copy)]
pub struct InlineOptions {
    pub max_sweeps: usize,
}

impl Default for InlineOptions {
    fn default() -> Self {
        InlineOptions { max_sweeps: 64 }
    }
}

pub fn inline_scope_literals(program: ProgramData, options: &InlineOptions) -> ProgramData {
    let mut program = program;
    for sweep in 0..options.max_sweeps {
        let manager = ScopeManager::analyze(&program);
        let plan = InlinePlan::from_scopes(&manager);
        if plan.is_empty() {
            break;
        }
        debug!(sweep, variables = plan.declarators.len(), "inlining literal variables");
        program = rewrite_program(program, &mut Inliner { plan: &plan });
    }
    normalize(program)
}

#[derive(Debug, Default)]
struct InlinePlan {
    /// Read slots to the literal that replaces them.
    reads: HashMap<IdentId, LiteralType>,
    /// Declarator slots to drop.
    declarators: HashSet<IdentId>,
}

impl InlinePlan {
    fn from_scopes(manager: &ScopeManager) -> InlinePlan {
        let mut plan = InlinePlan::default();
        for (scope, variable) in manager.variables() {
            if manager.scopes[scope].poisoned {
                continue;
            }
            if let Some((declarator, literal)) = inlinable(variable) {
                for reference in &variable.references {
                    if reference.id != declarator {
                        plan.reads.insert(reference.id, literal.clone());
                    }
                }
                plan.declarators.insert(declarator);
            }
        }
        plan
    }

    fn is_empty(&self) -> bool {
        self.declarators.is_empty()
    }
}

/// The declarator slot and folded value of a variable that can be inlined.
fn inlinable(variable: &Variable) -> Option<(IdentId, LiteralType)> {
    let [definition] = variable.definitions.as_slice() else {
        return None;
    };
    if !matches!(definition.kind, DefinitionKind::Variable(_)) {
        return None;
    }
    let literal = match reduce(definition.init.as_ref()?, INLINE_KINDS) {
        Reduction::Literal(LiteralType::RegExpLiteral(_)) | Reduction::NotReducible => return None,
        Reduction::Literal(literal) => literal,
    };
    let written_elsewhere = variable
        .references
        .iter()
        .any(|r| r.id != definition.id && r.is_write());
    if written_elsewhere {
        None
    } else {
        Some((definition.id, literal))
    }
}

struct Inliner<'p> {
    plan: &'p InlinePlan,
}

impl Visitor for Inliner<'_> {
    fn identifier(&mut self, id: IdentId, _ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
        match (role, self.plan.reads.get(&id)) {
            (IdentRole::Reference(_), Some(literal)) => Visit::Replace(ExpressionType::new_literal(literal.clone())),
            _ => Visit::Keep,
        }
    }

    fn declarator(&mut self, id: IdentId, _declarator: &VariableDeclaratorData) -> Visit<VariableDeclaratorData> {
        if self.plan.declarators.contains(&id) {
            Visit::Remove
        } else {
            Visit::Keep
        }
    }
}
