//! Table-driven substitution of known values.
//!
//! A description declares the values an obfuscator hid behind a lookup: the
//! properties of one object literal, the elements of one array literal, or a
//! handful of string variables. [`SubstitutionTable::build`] checks that the
//! description has exactly that shape and records each key with its folded
//! literal. [`SubstitutionTable::apply`] swaps every matching access in the
//! target for a copy of the literal.

use std::collections::HashSet;

use tracing::debug;

use crate::deob::error::DeobError;
use crate::deob::normalize::normalize;
use crate::deob::reducer::{literal_to_value, reduce, AllowedKinds, Reduction};
use crate::deob::scope::ScopeManager;
use crate::deob::visit::{rewrite_expression, rewrite_program, Access, IdentId, IdentRole, Visit, Visitor};
use crate::parser::ast::{
    DeclarationType, ExpressionType, IdentifierData, LiteralType, MemberExpressionType, ProgramData, PropertyKey,
    PropertyKind, StatementType, VariableDeclarationData,
};
use crate::runner::ds::operations::type_conversion::{f64_to_int32, to_number, to_string};

/// Node kinds a described value may be built from.
pub const VALUE_KINDS: AllowedKinds = AllowedKinds::GENERAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    /// `var name = { key: value, ... }`; rewrites `name.key` and `name['key']`.
    ObjectProperty,
    /// `var name = [lit, lit, ...]`; rewrites `name[i]` and `name['i']`.
    Indexed,
    /// `var a = value, b = value, ...`; rewrites reads of the program-level
    /// `a` and `b`, declared in the target or not.
    StringVariables,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    family: RuleFamily,
    /// Name of the described object or array.
    binding: Option<String>,
    entries: Vec<(Matcher, LiteralType)>,
}

impl SubstitutionTable {
    pub fn build(family: RuleFamily, description: &ProgramData) -> Result<SubstitutionTable, DeobError> {
        let declaration = single_declaration(description)?;
        let table = match family {
            RuleFamily::ObjectProperty => build_object_property(declaration)?,
            RuleFamily::Indexed => build_indexed(declaration)?,
            RuleFamily::StringVariables => build_string_variables(declaration)?,
        };
        debug!(?family, entries = table.entries.len(), "built substitution table");
        Ok(table)
    }

    pub fn family(&self) -> RuleFamily {
        self.family
    }

    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    pub fn entries(&self) -> &[(Matcher, LiteralType)] {
        &self.entries
    }

    pub fn lookup(&self, matcher: &Matcher) -> Option<&LiteralType> {
        self.entries.iter().find(|(m, _)| m == matcher).map(|(_, literal)| literal)
    }

    pub fn apply(&self, target: ProgramData) -> ProgramData {
        let rewritten = match self.family {
            RuleFamily::StringVariables => {
                let reads = global_reads(&target, self);
                rewrite_program(target, &mut GlobalReadSubstituter { table: self, reads })
            }
            RuleFamily::ObjectProperty | RuleFamily::Indexed => rewrite_program(target, &mut MemberSubstituter { table: self }),
        };
        normalize(rewritten)
    }

    /// Matcher for the property of an access to the described binding.
    fn member_matcher(&self, member: &MemberExpressionType) -> Option<Matcher> {
        let binding = self.binding.as_deref()?;
        if !member.object().is_identifier_named(binding) {
            return None;
        }
        match (self.family, member) {
            (RuleFamily::ObjectProperty, MemberExpressionType::SimpleMemberExpression { property, .. }) => {
                Some(Matcher::Name(property.name.clone()))
            }
            (RuleFamily::ObjectProperty, MemberExpressionType::ComputedMemberExpression { property, .. }) => {
                let value = literal_to_value(property.as_literal()?)?;
                Some(Matcher::Name(to_string(&value)))
            }
            (RuleFamily::Indexed, MemberExpressionType::ComputedMemberExpression { property, .. }) => {
                canonical_index(property.as_literal()?).map(Matcher::Index)
            }
            _ => None,
        }
    }
}

fn single_declaration(description: &ProgramData) -> Result<&VariableDeclarationData, DeobError> {
    match description.body.as_slice() {
        [StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(declaration))] => Ok(declaration),
        _ => Err(DeobError::validation("expected exactly one variable declaration")),
    }
}

/// Folds a described value into the literal that replaces its accesses.
fn described_value(value: &ExpressionType, what: &str) -> Result<LiteralType, DeobError> {
    match reduce(value, VALUE_KINDS) {
        Reduction::Literal(LiteralType::RegExpLiteral(_)) => Err(regexp_value(what)),
        Reduction::Literal(literal) => Ok(literal),
        Reduction::NotReducible => Err(DeobError::validation(format!(
            "value of {} does not reduce to a literal",
            what
        ))),
    }
}

/// A regexp literal is a fresh object each time it is evaluated.
fn regexp_value(what: &str) -> DeobError {
    DeobError::validation(format!("value of {} is a regular expression", what))
}

fn build_object_property(declaration: &VariableDeclarationData) -> Result<SubstitutionTable, DeobError> {
    let declarator = match declaration.declarations.as_slice() {
        [declarator] => declarator,
        _ => return Err(DeobError::validation("expected a single declarator")),
    };
    let properties = match &declarator.init {
        Some(ExpressionType::ObjectExpression { properties, .. }) => properties,
        _ => return Err(DeobError::validation("expected an object literal initializer")),
    };
    let mut entries: Vec<(Matcher, LiteralType)> = Vec::with_capacity(properties.len());
    for property in properties {
        if property.kind != PropertyKind::Init {
            return Err(DeobError::validation("accessor properties are not supported"));
        }
        let key = match &property.key {
            PropertyKey::Identifier(ident) => ident.name.clone(),
            PropertyKey::Literal(literal) => match literal_to_value(&literal.value) {
                Some(value) => to_string(&value),
                None => return Err(DeobError::validation("unsupported property key")),
            },
            PropertyKey::Computed(_) => return Err(DeobError::validation("computed keys are not supported")),
        };
        let literal = described_value(&property.value, &format!("key '{}'", key))?;
        // A repeated key overrides the earlier one, as in the object itself.
        entries.retain(|(matcher, _)| *matcher != Matcher::Name(key.clone()));
        entries.push((Matcher::Name(key), literal));
    }
    Ok(SubstitutionTable {
        family: RuleFamily::ObjectProperty,
        binding: Some(declarator.id.name.clone()),
        entries,
    })
}

fn build_indexed(declaration: &VariableDeclarationData) -> Result<SubstitutionTable, DeobError> {
    let declarator = match declaration.declarations.as_slice() {
        [declarator] => declarator,
        _ => return Err(DeobError::validation("expected a single declarator")),
    };
    let elements = match &declarator.init {
        Some(ExpressionType::ArrayExpression { elements, .. }) => elements,
        _ => return Err(DeobError::validation("expected an array literal initializer")),
    };
    let entries = elements
        .iter()
        .enumerate()
        .map(|(index, element)| match element {
            Some(ExpressionType::Literal(literal)) => match &literal.value {
                LiteralType::RegExpLiteral(_) => Err(regexp_value(&format!("element {}", index))),
                value => Ok((Matcher::Index(index), value.clone())),
            },
            Some(_) => Err(DeobError::validation(format!("element {} is not a literal", index))),
            None => Err(DeobError::validation(format!("element {} is a hole", index))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SubstitutionTable {
        family: RuleFamily::Indexed,
        binding: Some(declarator.id.name.clone()),
        entries,
    })
}

fn build_string_variables(declaration: &VariableDeclarationData) -> Result<SubstitutionTable, DeobError> {
    let mut entries: Vec<(Matcher, LiteralType)> = Vec::with_capacity(declaration.declarations.len());
    for declarator in &declaration.declarations {
        let name = &declarator.id.name;
        let init = declarator
            .init
            .as_ref()
            .ok_or_else(|| DeobError::validation(format!("variable '{}' has no initializer", name)))?;
        let literal = described_value(init, &format!("variable '{}'", name))?;
        entries.retain(|(matcher, _)| *matcher != Matcher::Name(name.clone()));
        entries.push((Matcher::Name(name.clone()), literal));
    }
    Ok(SubstitutionTable {
        family: RuleFamily::StringVariables,
        binding: None,
        entries,
    })
}

/// Index named by a literal, accepted only in canonical form: a non-negative
/// integer literal or its exact decimal string, so `'01'`, `'1.0'` and `-1`
/// are rejected.
pub fn canonical_index(literal: &LiteralType) -> Option<usize> {
    let value = literal_to_value(literal)?;
    if matches!(literal, LiteralType::BooleanLiteral(_) | LiteralType::NullLiteral) {
        return None;
    }
    let index = f64_to_int32(to_number(&value)).unsigned_abs();
    if to_string(&value) == index.to_string() {
        Some(index as usize)
    } else {
        None
    }
}

/// Read slots that resolve to the program-level variable of a name in the
/// table. Reads of locals that shadow the name resolve elsewhere.
fn global_reads(target: &ProgramData, table: &SubstitutionTable) -> HashSet<IdentId> {
    let manager = ScopeManager::analyze(target);
    let global = manager.global_scope();
    table
        .entries
        .iter()
        .filter_map(|(matcher, _)| match matcher {
            Matcher::Name(name) => global.variable(name),
            Matcher::Index(_) => None,
        })
        .flat_map(|variable| variable.references.iter())
        .filter(|reference| reference.access == Access::Read)
        .map(|reference| reference.id)
        .collect()
}

struct GlobalReadSubstituter<'t> {
    table: &'t SubstitutionTable,
    reads: HashSet<IdentId>,
}

impl Visitor for GlobalReadSubstituter<'_> {
    fn identifier(&mut self, id: IdentId, ident: &IdentifierData, role: IdentRole) -> Visit<ExpressionType> {
        if role != IdentRole::Reference(Access::Read) || !self.reads.contains(&id) {
            return Visit::Keep;
        }
        match self.table.lookup(&Matcher::Name(ident.name.clone())) {
            Some(literal) => Visit::Replace(ExpressionType::new_literal(literal.clone())),
            None => Visit::Keep,
        }
    }
}

struct MemberSubstituter<'t> {
    table: &'t SubstitutionTable,
}

impl MemberSubstituter<'_> {
    fn is_tracked(&self, expr: &ExpressionType) -> bool {
        match expr {
            ExpressionType::MemberExpression(member) => self
                .table
                .member_matcher(member)
                .map_or(false, |matcher| self.table.lookup(&matcher).is_some()),
            _ => false,
        }
    }
}

impl Visitor for MemberSubstituter<'_> {
    fn enter_expression(&mut self, expr: &ExpressionType) -> Visit<ExpressionType> {
        match expr {
            ExpressionType::MemberExpression(member) => {
                let literal = self
                    .table
                    .member_matcher(member)
                    .and_then(|matcher| self.table.lookup(&matcher));
                match literal {
                    Some(literal) => Visit::Replace(ExpressionType::new_literal(literal.clone())),
                    None => Visit::Keep,
                }
            }
            // Stores into the described binding stay as they are.
            ExpressionType::UpdateExpression { argument, .. } if self.is_tracked(argument) => Visit::Skip,
            ExpressionType::AssignmentExpression {
                meta,
                operator,
                left,
                right,
            } if self.is_tracked(left) => Visit::Replace(ExpressionType::AssignmentExpression {
                meta: meta.clone(),
                operator: *operator,
                left: left.clone(),
                right: Box::new(rewrite_expression((**right).clone(), self)),
            }),
            _ => Visit::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::codegen::generate;
    use crate::parser::JsParser;
    use pretty_assertions::assert_eq;

    fn run(family: RuleFamily, description: &str, target: &str) -> String {
        let description = JsParser::parse_to_ast(description).unwrap();
        let table = SubstitutionTable::build(family, &description).unwrap();
        generate(&table.apply(JsParser::parse_to_ast(target).unwrap()))
    }

    fn build_error(family: RuleFamily, description: &str) -> bool {
        let description = JsParser::parse_to_ast(description).unwrap();
        matches!(SubstitutionTable::build(family, &description), Err(DeobError::Validation(_)))
    }

    #[test]
    fn test_object_property_accesses() {
        assert_eq!(
            run(RuleFamily::ObjectProperty, "var a = {x: 1, y: 2};", "console.log(a.x + a.y);"),
            "console.log(1 + 2);"
        );
        assert_eq!(
            run(RuleFamily::ObjectProperty, "var o = {'k': 'v' + 'w', 3: true ? 'p' : 'q'};", "f(o['k'], o[3], o.z, b.k);"),
            "f('vw', 'p', o.z, b.k);"
        );
    }

    #[test]
    fn test_object_property_leaves_stores_alone() {
        assert_eq!(
            run(RuleFamily::ObjectProperty, "var a = {x: 'p'};", "a.x = a.x + 1; a.x++;"),
            "a.x = 'p' + 1;\na.x++;"
        );
    }

    #[test]
    fn test_object_property_validation() {
        assert!(build_error(RuleFamily::ObjectProperty, "var a = {x: b};"));
        assert!(build_error(RuleFamily::ObjectProperty, "var a = {get x() { return 1; }};"));
        assert!(build_error(RuleFamily::ObjectProperty, "var a = {x: 1}, b = {};"));
        assert!(build_error(RuleFamily::ObjectProperty, "var a = [1];"));
        assert!(build_error(RuleFamily::ObjectProperty, "var a = {x: 1}; var b = 2;"));
        assert!(build_error(RuleFamily::ObjectProperty, "var o = {r: /a/g};"));
    }

    #[test]
    fn test_indexed_accesses() {
        assert_eq!(
            run(RuleFamily::Indexed, "var arr = ['\\x61', '\\x62'];", "arr[0]+arr[1]"),
            "'ab';"
        );
        assert_eq!(
            run(RuleFamily::Indexed, "var t = ['a', 'b'];", "f(t['1'], t[2], t['01'], t[-1], t[1.5], t.length);"),
            "f('b', t[2], t['01'], t[-1], t[1.5], t.length);"
        );
    }

    #[test]
    fn test_indexed_validation() {
        assert!(build_error(RuleFamily::Indexed, "var a = [1, x];"));
        assert!(build_error(RuleFamily::Indexed, "var a = [1, , 2];"));
        assert!(build_error(RuleFamily::Indexed, "var a = {};"));
        assert!(build_error(RuleFamily::Indexed, "var a = ['x', /a/g];"));
    }

    #[test]
    fn test_canonical_index() {
        let number = |n| LiteralType::NumberLiteral(crate::parser::ast::NumberLiteralType::IntegerLiteral(n));
        let string = |s: &str| LiteralType::StringLiteral(s.to_string());
        assert_eq!(canonical_index(&number(3)), Some(3));
        assert_eq!(canonical_index(&number(-3)), None);
        assert_eq!(canonical_index(&string("12")), Some(12));
        assert_eq!(canonical_index(&string("1e1")), None);
        assert_eq!(canonical_index(&string(" 1")), None);
        assert_eq!(canonical_index(&LiteralType::BooleanLiteral(true)), None);
    }

    #[test]
    fn test_string_variables() {
        assert_eq!(
            run(RuleFamily::StringVariables, "var a = 'lSto', b = 'tIt';", "window['loca'+a]"),
            "window['localSto'];"
        );
        assert_eq!(
            run(RuleFamily::StringVariables, "var a = 'x';", "foo.a; ({ a: a }); a = 2; function g(a) { return a; }"),
            "foo.a;\n({ a: 'x' });\na = 2;\nfunction g(a) {\n    return a;\n}"
        );
    }

    #[test]
    fn test_string_variables_in_their_own_declaring_file() {
        assert_eq!(
            run(
                RuleFamily::StringVariables,
                "var a = 'lSto', b = 'tIt';",
                "var a = 'lSto', b = 'tIt'; window['loca' + a]['ge' + b];"
            ),
            "var a = 'lSto', b = 'tIt';\nwindow['localSto']['getIt'];"
        );
        assert_eq!(
            run(
                RuleFamily::StringVariables,
                "var a = 'x';",
                "var a = 'x'; function g() { var a = 1; return a; } a += 'y'; h(a);"
            ),
            "var a = 'x';\nfunction g() {\n    var a = 1;\n    return a;\n}\na += 'y';\nh('x');"
        );
    }

    #[test]
    fn test_string_variables_validation() {
        assert!(build_error(RuleFamily::StringVariables, "var a;"));
        assert!(build_error(RuleFamily::StringVariables, "var a = b;"));
        assert!(build_error(RuleFamily::StringVariables, "a = 1;"));
        assert!(build_error(RuleFamily::StringVariables, "var a = 'x', r = /a/;"));
    }
}
