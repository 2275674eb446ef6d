//! Unpacking of `eval(...)` packers.
//!
//! Packers hand `eval` a string built at run time. Evaluating `String(...)`
//! over the same arguments in a sandbox yields that string without running
//! it.

use tracing::debug;

use crate::deob::error::DeobError;
use crate::parser::ast::{ExpressionType, ProgramData, StatementType};
use crate::parser::codegen::{generate, generate_expression};
use crate::parser::JsParser;
use crate::runner::sandbox::{SandboxError, SandboxSession, SandboxValue};

/// Arguments of the single `eval(...)` call the description must consist of.
pub fn packed_arguments(description: &ProgramData) -> Result<&[ExpressionType], DeobError> {
    match description.body.as_slice() {
        [StatementType::ExpressionStatement {
            expression: ExpressionType::CallExpression { callee, arguments, .. },
            ..
        }] if callee.is_identifier_named("eval") => Ok(arguments),
        _ => Err(DeobError::validation("expected a single `eval(...)` statement")),
    }
}

/// Produces the text the packer would have evaluated, reformatted when it
/// parses and verbatim otherwise.
pub async fn unpack(description: &ProgramData) -> Result<String, DeobError> {
    let arguments = packed_arguments(description)?;
    let code = format!(
        "String({});",
        arguments.iter().map(generate_expression).collect::<Vec<_>>().join(", ")
    );
    let session = SandboxSession::open().await?;
    let result = session.evaluate(&code).await;
    session.destroy();
    let text = match result? {
        SandboxValue::String(text) => text,
        other => {
            return Err(SandboxError::Protocol(format!("expected a string, got {:?}", other)).into());
        }
    };
    debug!(length = text.len(), "unpacked eval payload");
    Ok(match JsParser::parse_to_ast(&text) {
        Ok(program) => generate(&program),
        Err(_) => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ProgramData {
        JsParser::parse_to_ast(code).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(packed_arguments(&parse("eval('x');")).is_ok());
        assert!(packed_arguments(&parse("window.eval('x');")).is_err());
        assert!(packed_arguments(&parse("eval('x'); eval('y');")).is_err());
        assert!(packed_arguments(&parse("var a = eval('x');")).is_err());
    }

    #[tokio::test]
    async fn test_unpacks_generated_source() {
        let description = parse(
            "eval(function (p, k) { for (var i = 0; i < k.length; i++) { p = p.split(String(i)).join(k[i]); } return p; }('0 1 = 2;', ['var', 'a', '1']));",
        );
        assert_eq!(unpack(&description).await.unwrap(), "var a = 1;");
    }

    #[tokio::test]
    async fn test_unparsable_payload_is_returned_verbatim() {
        let description = parse("eval('not ' + 'javascript (');");
        assert_eq!(unpack(&description).await.unwrap(), "not javascript (");
    }

    #[tokio::test]
    async fn test_throwing_packer_fails() {
        let description = parse("eval(undefinedDecoder('x'));");
        assert!(matches!(
            unpack(&description).await,
            Err(DeobError::Sandbox(SandboxError::Evaluation(_)))
        ));
    }
}
