//! Statement execution.
//!
//! Statements produce completion records; exceptions propagate as `Err`.
//! The value of a statement list is the value of its last statement that
//! produced one, which is what `eval` and the sandbox report back.

use crate::parser::ast::{
    BlockStatementData, CatchClauseData, DeclarationType, ExpressionType, ProgramData,
    StatementType, SwitchCaseData, VariableDeclarationData, VariableDeclarationKind,
    VariableDeclarationOrExpression,
};
use crate::runner::ds::env_record::EnvironmentRecord;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::object::{enumerable_keys, find_property};
use crate::runner::ds::operations::test_and_comparison::strict_equality;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use super::expression::{assign_to_expression, evaluate_expression};
use super::function::create_function_object;
use super::types::{Completion, CompletionType, EvalResult, ValueResult};

/// Runs a whole program in the context's current scope.
pub fn run_program(program: &ProgramData, ctx: &mut EvalContext) -> ValueResult {
    instantiate_declarations(&program.body, ctx);
    let completion = execute_statement_list(&program.body, ctx)?;
    Ok(completion.get_value())
}

/// Runs a function body; the caller has already entered the function scope.
pub fn run_function_body(body: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    instantiate_declarations(body, ctx);
    execute_statement_list(body, ctx)
}

/// Hoists `var` names and function declarations of a program or function
/// body into the variable environment.
fn instantiate_declarations(body: &[StatementType], ctx: &mut EvalContext) {
    let mut names = vec![];
    for stmt in body {
        collect_var_names(stmt, &mut names);
    }
    {
        let mut var_env = ctx.var_env.borrow_mut();
        for name in &names {
            var_env.create_var_binding(name);
        }
    }
    instantiate_function_declarations(body, ctx);
}

/// Binds the function declarations directly inside `body` in the current
/// lexical scope and in the variable scope.
fn instantiate_function_declarations(body: &[StatementType], ctx: &mut EvalContext) {
    for stmt in body {
        if let StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(f)) = stmt {
            let name = match &f.id {
                Some(id) => id.name.clone(),
                None => continue,
            };
            let function = create_function_object(f, ctx.lex_env.clone());
            if !std::rc::Rc::ptr_eq(&ctx.lex_env, &ctx.var_env) {
                ctx.lex_env.borrow_mut().create_binding(&name, function.clone(), true);
            }
            ctx.var_env.borrow_mut().initialize_var_binding(&name, function);
        }
    }
}

fn push(name: &str, names: &mut Vec<String>) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn collect_var_names(stmt: &StatementType, names: &mut Vec<String>) {
    match stmt {
        StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(decl)) => {
            if decl.kind == VariableDeclarationKind::Var {
                for d in &decl.declarations {
                    push(&d.id.name, names);
                }
            }
        }
        StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(f)) => {
            if let Some(id) = &f.id {
                push(&id.name, names);
            }
        }
        StatementType::BlockStatement(block) => {
            for s in &block.body {
                collect_var_names(s, names);
            }
        }
        StatementType::WithStatement { body, .. }
        | StatementType::LabeledStatement { body, .. }
        | StatementType::WhileStatement { body, .. }
        | StatementType::DoWhileStatement { body, .. } => collect_var_names(body, names),
        StatementType::IfStatement { consequent, alternate, .. } => {
            collect_var_names(consequent, names);
            if let Some(alternate) = alternate {
                collect_var_names(alternate, names);
            }
        }
        StatementType::SwitchStatement { cases, .. } => {
            for case in cases {
                for s in &case.consequent {
                    collect_var_names(s, names);
                }
            }
        }
        StatementType::TryStatement { block, handler, finalizer, .. } => {
            for s in &block.body {
                collect_var_names(s, names);
            }
            if let Some(handler) = handler {
                for s in &handler.body.body {
                    collect_var_names(s, names);
                }
            }
            if let Some(finalizer) = finalizer {
                for s in &finalizer.body {
                    collect_var_names(s, names);
                }
            }
        }
        StatementType::ForStatement { init, body, .. } => {
            if let Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) = init {
                if decl.kind == VariableDeclarationKind::Var {
                    for d in &decl.declarations {
                        push(&d.id.name, names);
                    }
                }
            }
            collect_var_names(body, names);
        }
        StatementType::ForInStatement { left, body, .. } => {
            if let VariableDeclarationOrExpression::VariableDeclaration(decl) = left {
                if decl.kind == VariableDeclarationKind::Var {
                    for d in &decl.declarations {
                        push(&d.id.name, names);
                    }
                }
            }
            collect_var_names(body, names);
        }
        _ => {}
    }
}

fn has_lexical_declarations(body: &[StatementType]) -> bool {
    body.iter().any(|s| {
        matches!(
            s,
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(VariableDeclarationData {
                kind: VariableDeclarationKind::Let | VariableDeclarationKind::Const,
                ..
            })) | StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(_))
        )
    })
}

/// Runs `body` in a fresh block scope when it declares anything lexically.
fn with_block_scope<F>(body: &[StatementType], ctx: &mut EvalContext, run: F) -> EvalResult
where
    F: FnOnce(&mut EvalContext) -> EvalResult,
{
    if !has_lexical_declarations(body) {
        return run(ctx);
    }
    let env = EnvironmentRecord::new_declarative(Some(ctx.lex_env.clone()));
    let var_env = ctx.var_env.clone();
    let this_value = ctx.this_value.clone();
    let saved = ctx.enter_scope(env, var_env, this_value);
    instantiate_function_declarations(body, ctx);
    let result = run(ctx);
    ctx.restore_scope(saved);
    result
}

/// Executes statements in order, stopping at the first abrupt completion.
pub fn execute_statement_list(stmts: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    let mut value: Option<JsValue> = None;
    for stmt in stmts {
        let completion = execute_statement(stmt, ctx)?;
        if completion.value.is_some() {
            value = completion.value.clone();
        }
        if completion.is_abrupt() {
            return Ok(completion.update_empty(value));
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value,
        target: None,
    })
}

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    execute_labelled_statement(stmt, ctx, &[])
}

fn execute_labelled_statement(stmt: &StatementType, ctx: &mut EvalContext, labels: &[String]) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement { .. } | StatementType::DebuggerStatement { .. } => {
            Ok(Completion::normal())
        }

        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(expression, ctx)?;
            Ok(Completion::normal_with_value(value))
        }

        StatementType::BlockStatement(block) => execute_block_statement(block, ctx),

        StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(decl)) => {
            execute_variable_declaration(decl, ctx)?;
            Ok(Completion::normal())
        }

        // Function declarations are bound when their enclosing body or block
        // is entered.
        StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(_)) => {
            Ok(Completion::normal())
        }

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            let test_value = evaluate_expression(test, ctx)?;
            if to_boolean(&test_value) {
                execute_statement(consequent, ctx)
            } else if let Some(alternate) = alternate {
                execute_statement(alternate, ctx)
            } else {
                Ok(Completion::normal())
            }
        }

        StatementType::WhileStatement { test, body, .. } => {
            let mut value = None;
            loop {
                let test_value = evaluate_expression(test, ctx)?;
                if !to_boolean(&test_value) {
                    break;
                }
                let completion = execute_statement(body, ctx)?;
                if let LoopAction::Exit(c) = loop_action(completion, labels, &mut value) {
                    return Ok(c);
                }
            }
            Ok(Completion::normal().update_empty(value))
        }

        StatementType::DoWhileStatement { body, test, .. } => {
            let mut value = None;
            loop {
                let completion = execute_statement(body, ctx)?;
                if let LoopAction::Exit(c) = loop_action(completion, labels, &mut value) {
                    return Ok(c);
                }
                let test_value = evaluate_expression(test, ctx)?;
                if !to_boolean(&test_value) {
                    break;
                }
            }
            Ok(Completion::normal().update_empty(value))
        }

        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => execute_for_statement(init.as_ref(), test.as_ref(), update.as_ref(), body, ctx, labels),

        StatementType::ForInStatement { left, right, body, .. } => {
            execute_for_in_statement(left, right, body, ctx, labels)
        }

        StatementType::SwitchStatement {
            discriminant, cases, ..
        } => execute_switch_statement(discriminant, cases, ctx),

        StatementType::LabeledStatement { label, body, .. } => {
            let mut nested = labels.to_vec();
            nested.push(label.name.clone());
            let completion = execute_labelled_statement(body, ctx, &nested)?;
            if completion.completion_type == CompletionType::Break
                && completion.target.as_deref() == Some(label.name.as_str())
            {
                Ok(Completion {
                    completion_type: CompletionType::Normal,
                    value: completion.value,
                    target: None,
                })
            } else {
                Ok(completion)
            }
        }

        StatementType::BreakStatement { label, .. } => {
            Ok(Completion::break_completion(label.as_ref().map(|l| l.name.clone())))
        }

        StatementType::ContinueStatement { label, .. } => {
            Ok(Completion::continue_completion(label.as_ref().map(|l| l.name.clone())))
        }

        StatementType::ReturnStatement { argument, .. } => {
            let value = match argument {
                Some(arg) => evaluate_expression(arg, ctx)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(argument, ctx)?;
            Err(JErrorType::Thrown(value))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => execute_try_statement(block, handler.as_ref(), finalizer.as_ref(), ctx),

        StatementType::WithStatement { object, body, .. } => {
            let value = evaluate_expression(object, ctx)?;
            let target = match value {
                JsValue::Object(o) => o,
                JsValue::Undefined | JsValue::Null => {
                    return Err(JErrorType::TypeError(
                        "Cannot convert undefined or null to object".to_string(),
                    ))
                }
                _ => JsObject::new_ordinary(),
            };
            let env = EnvironmentRecord::new_object(target, Some(ctx.lex_env.clone()));
            let var_env = ctx.var_env.clone();
            let this_value = ctx.this_value.clone();
            let saved = ctx.enter_scope(env, var_env, this_value);
            let result = execute_statement(body, ctx);
            ctx.restore_scope(saved);
            result
        }
    }
}

fn execute_block_statement(block: &BlockStatementData, ctx: &mut EvalContext) -> EvalResult {
    with_block_scope(&block.body, ctx, |ctx| execute_statement_list(&block.body, ctx))
}

fn execute_variable_declaration(decl: &VariableDeclarationData, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    for declarator in &decl.declarations {
        match decl.kind {
            VariableDeclarationKind::Var => {
                if let Some(init) = &declarator.init {
                    let value = evaluate_expression(init, ctx)?;
                    ctx.set_binding(&declarator.id.name, value)?;
                }
            }
            VariableDeclarationKind::Let | VariableDeclarationKind::Const => {
                let value = match &declarator.init {
                    Some(init) => evaluate_expression(init, ctx)?,
                    None => JsValue::Undefined,
                };
                let mutable = decl.kind == VariableDeclarationKind::Let;
                ctx.lex_env
                    .borrow_mut()
                    .create_binding(&declarator.id.name, value, mutable);
            }
        }
    }
    Ok(())
}

enum LoopAction {
    Next,
    Exit(Completion),
}

/// Decides whether a loop keeps going after its body produced `completion`.
fn loop_action(completion: Completion, labels: &[String], value: &mut Option<JsValue>) -> LoopAction {
    if completion.value.is_some() {
        *value = completion.value.clone();
    }
    match completion.completion_type {
        CompletionType::Normal => LoopAction::Next,
        CompletionType::Continue => match &completion.target {
            Some(t) if !labels.contains(t) => LoopAction::Exit(completion.update_empty(value.clone())),
            _ => LoopAction::Next,
        },
        CompletionType::Break if completion.target.is_none() => {
            LoopAction::Exit(Completion::normal().update_empty(value.clone()))
        }
        _ => LoopAction::Exit(completion.update_empty(value.clone())),
    }
}

fn execute_for_statement(
    init: Option<&VariableDeclarationOrExpression>,
    test: Option<&ExpressionType>,
    update: Option<&ExpressionType>,
    body: &StatementType,
    ctx: &mut EvalContext,
    labels: &[String],
) -> EvalResult {
    let lexical = matches!(
        init,
        Some(VariableDeclarationOrExpression::VariableDeclaration(VariableDeclarationData {
            kind: VariableDeclarationKind::Let | VariableDeclarationKind::Const,
            ..
        }))
    );
    let saved = if lexical {
        let env = EnvironmentRecord::new_declarative(Some(ctx.lex_env.clone()));
        let var_env = ctx.var_env.clone();
        let this_value = ctx.this_value.clone();
        Some(ctx.enter_scope(env, var_env, this_value))
    } else {
        None
    };
    let result = run_for_loop(init, test, update, body, ctx, labels);
    if let Some(saved) = saved {
        ctx.restore_scope(saved);
    }
    result
}

fn run_for_loop(
    init: Option<&VariableDeclarationOrExpression>,
    test: Option<&ExpressionType>,
    update: Option<&ExpressionType>,
    body: &StatementType,
    ctx: &mut EvalContext,
    labels: &[String],
) -> EvalResult {
    match init {
        Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
            execute_variable_declaration(decl, ctx)?
        }
        Some(VariableDeclarationOrExpression::Expression(expr)) => {
            evaluate_expression(expr, ctx)?;
        }
        None => {}
    }
    let mut value = None;
    loop {
        if let Some(test) = test {
            let test_value = evaluate_expression(test, ctx)?;
            if !to_boolean(&test_value) {
                break;
            }
        }
        let completion = execute_statement(body, ctx)?;
        if let LoopAction::Exit(c) = loop_action(completion, labels, &mut value) {
            return Ok(c);
        }
        if let Some(update) = update {
            evaluate_expression(update, ctx)?;
        }
    }
    Ok(Completion::normal().update_empty(value))
}

fn execute_for_in_statement(
    left: &VariableDeclarationOrExpression,
    right: &ExpressionType,
    body: &StatementType,
    ctx: &mut EvalContext,
    labels: &[String],
) -> EvalResult {
    let object = evaluate_expression(right, ctx)?;
    let mut value = None;
    for key in enumerable_keys(&object) {
        if let JsValue::Object(o) = &object {
            // Keys deleted by an earlier iteration are skipped.
            if find_property(o, &key).is_none() {
                continue;
            }
        }
        let key_value = JsValue::String(key);
        match left {
            VariableDeclarationOrExpression::VariableDeclaration(decl) => {
                if let Some(declarator) = decl.declarations.first() {
                    if decl.kind == VariableDeclarationKind::Var {
                        ctx.set_binding(&declarator.id.name, key_value)?;
                    } else {
                        ctx.lex_env
                            .borrow_mut()
                            .create_binding(&declarator.id.name, key_value, true);
                    }
                }
            }
            VariableDeclarationOrExpression::Expression(target) => {
                assign_to_expression(target, key_value, ctx)?;
            }
        }
        let completion = execute_statement(body, ctx)?;
        if let LoopAction::Exit(c) = loop_action(completion, labels, &mut value) {
            return Ok(c);
        }
    }
    Ok(Completion::normal().update_empty(value))
}

fn execute_switch_statement(
    discriminant: &ExpressionType,
    cases: &[SwitchCaseData],
    ctx: &mut EvalContext,
) -> EvalResult {
    let value = evaluate_expression(discriminant, ctx)?;
    let all_statements: Vec<StatementType> = cases.iter().flat_map(|c| c.consequent.iter().cloned()).collect();
    with_block_scope(&all_statements, ctx, |ctx| {
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let case_value = evaluate_expression(test, ctx)?;
                if strict_equality(&value, &case_value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Completion::normal()),
        };
        let mut result_value = None;
        for case in &cases[start..] {
            let completion = execute_statement_list(&case.consequent, ctx)?;
            if completion.value.is_some() {
                result_value = completion.value.clone();
            }
            match completion.completion_type {
                CompletionType::Normal => {}
                CompletionType::Break if completion.target.is_none() => {
                    return Ok(Completion::normal().update_empty(result_value));
                }
                _ => return Ok(completion.update_empty(result_value)),
            }
        }
        Ok(Completion::normal().update_empty(result_value))
    })
}

fn execute_try_statement(
    block: &BlockStatementData,
    handler: Option<&CatchClauseData>,
    finalizer: Option<&BlockStatementData>,
    ctx: &mut EvalContext,
) -> EvalResult {
    let result = execute_block_statement(block, ctx);
    let result = match (result, handler) {
        (Err(error), Some(handler)) => {
            let env = EnvironmentRecord::new_declarative(Some(ctx.lex_env.clone()));
            let value = ctx.error_value(error);
            env.borrow_mut().create_binding(&handler.param.name, value, true);
            let var_env = ctx.var_env.clone();
            let this_value = ctx.this_value.clone();
            let saved = ctx.enter_scope(env, var_env, this_value);
            let caught = execute_block_statement(&handler.body, ctx);
            ctx.restore_scope(saved);
            caught
        }
        (result, _) => result,
    };
    if let Some(finalizer) = finalizer {
        let completion = execute_block_statement(finalizer, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> JsValue {
        EvalContext::new().run_script(code).unwrap()
    }

    #[test]
    fn test_program_value_is_last_expression() {
        assert_eq!(run("var a = 1; a + 1;"), JsValue::number(2.0));
        assert_eq!(run("1; var b = 2;"), JsValue::number(1.0));
        assert_eq!(run("var c;"), JsValue::Undefined);
    }

    #[test]
    fn test_hoisting() {
        assert_eq!(run("f(); function f() { return 3; }"), JsValue::number(3.0));
        assert_eq!(run("typeof x; var x = 1; typeof y;"), JsValue::string("undefined"));
    }

    #[test]
    fn test_labelled_continue_and_break() {
        let code = "var s = ''; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { if (j == 1) continue outer; if (i == 2) break outer; s += i + '' + j; } } s;";
        assert_eq!(run(code), JsValue::string("0010"));
    }

    #[test]
    fn test_switch_falls_through() {
        let code = "var r = ''; switch (2) { case 1: r += 'a'; case 2: r += 'b'; case 3: r += 'c'; break; default: r += 'd'; } r;";
        assert_eq!(run(code), JsValue::string("bc"));
        assert_eq!(run("var r; switch ('x') { case 'y': r = 1; break; default: r = 2; } r;"), JsValue::number(2.0));
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(run("var r; try { throw 'boom'; } catch (e) { r = e; } r;"), JsValue::string("boom"));
        assert_eq!(
            run("var r = []; try { null.x; } catch (e) { r.push(e instanceof TypeError); } finally { r.push('f'); } r.join();"),
            JsValue::string("true,f")
        );
        assert_eq!(run("function f() { try { return 1; } finally { return 2; } } f();"), JsValue::number(2.0));
    }

    #[test]
    fn test_uncaught_throw_propagates() {
        let result = EvalContext::new().run_script("throw new Error('bad');");
        match result {
            Err(e) => assert_eq!(e.describe(), "Error: bad"),
            Ok(v) => panic!("expected an exception, got {:?}", v),
        }
    }

    #[test]
    fn test_for_in_visits_own_and_inherited_keys() {
        let code = "function P() { this.a = 1; } P.prototype.b = 2; var o = new P(); var k = []; for (var key in o) k.push(key); k.join();";
        assert_eq!(run(code), JsValue::string("a,b"));
    }

    #[test]
    fn test_block_scoped_let_and_const() {
        assert_eq!(run("var x = 1; { let x = 2; } x;"), JsValue::number(1.0));
        assert!(EvalContext::new().run_script("const k = 1; k = 2;").is_err());
    }

    #[test]
    fn test_with_statement_resolves_against_object() {
        assert_eq!(run("var o = { a: 5 }; var r; with (o) { r = a; } r;"), JsValue::number(5.0));
    }
}
