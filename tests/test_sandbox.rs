//! Tests for the sandboxed paths: sessions, call-pattern rewriting and
//! eval-packer unwrapping.

extern crate jsdeob;

use jsdeob::deob::call_pattern::{rewrite_calls, CallPatternRules};
use jsdeob::deob::{DeobError, Technique};
use jsdeob::parser::codegen::generate;
use jsdeob::parser::JsParser;
use jsdeob::runner::sandbox::{SandboxError, SandboxSession, SandboxValue, SessionState};
use pretty_assertions::assert_eq;

async fn call_pattern(description: &str, target: &str) -> String {
    Technique::CallPattern
        .deobfuscate_async(description, target)
        .await
        .unwrap_or_else(|e| panic!("call-pattern failed: {}", e))
}

// ============================================================================
// Sessions
// ============================================================================

mod sessions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_globals_persist_between_requests() {
        let session = SandboxSession::open().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.evaluate("var k = 40; function add(n) { return k + n; }").await.unwrap();
        assert_eq!(session.evaluate("add(2);").await.unwrap(), SandboxValue::Number(42.0));
        session.destroy();
    }

    #[tokio::test]
    async fn test_clones_structured_values() {
        let session = SandboxSession::open().await.unwrap();
        assert_eq!(
            session.evaluate("[1, 'a', null, {b: true}];").await.unwrap(),
            SandboxValue::Array(vec![
                SandboxValue::Number(1.0),
                SandboxValue::String("a".to_string()),
                SandboxValue::Null,
                SandboxValue::Object(vec![("b".to_string(), SandboxValue::Boolean(true))]),
            ])
        );
        assert!(matches!(
            session.evaluate("(function () {});").await,
            Err(SandboxError::Evaluation(_))
        ));
    }

    #[tokio::test]
    async fn test_errors_do_not_poison_the_session() {
        let session = SandboxSession::open().await.unwrap();
        assert!(matches!(
            session.evaluate("throw new Error('boom');").await,
            Err(SandboxError::Evaluation(message)) if message.contains("boom")
        ));
        assert_eq!(session.evaluate("1 + 1;").await.unwrap(), SandboxValue::Number(2.0));
    }

    #[tokio::test]
    async fn test_destroyed_session_rejects_requests() {
        let session = SandboxSession::open().await.unwrap();
        session.destroy();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert_eq!(session.evaluate("1;").await, Err(SandboxError::Closed));
    }

    #[tokio::test]
    async fn test_overlapping_requests_are_correlated() {
        let session = SandboxSession::open().await.unwrap();
        let (a, b, c) = tokio::join!(
            session.evaluate("'a' + 1;"),
            session.evaluate("throw new TypeError('b');"),
            session.evaluate("[3];")
        );
        assert_eq!(a.unwrap(), SandboxValue::String("a1".to_string()));
        assert!(matches!(b, Err(SandboxError::Evaluation(message)) if message.contains("TypeError")));
        assert_eq!(c.unwrap(), SandboxValue::Array(vec![SandboxValue::Number(3.0)]));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let first = SandboxSession::open().await.unwrap();
        let second = SandboxSession::open().await.unwrap();
        first.evaluate("var shared = 1;").await.unwrap();
        assert!(matches!(
            second.evaluate("shared;").await,
            Err(SandboxError::Evaluation(_))
        ));
        assert_ne!(first.origin(), second.origin());
    }
}

// ============================================================================
// Call patterns
// ============================================================================

mod call_patterns {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_replaces_matched_call_with_result() {
        assert_eq!(
            call_pattern(
                "function decode(s) { return 'decoded'; } a.b(/^\".*\"$/) == decode;",
                "a.b('\"hi\"');"
            )
            .await,
            "'decoded';"
        );
    }

    #[tokio::test]
    async fn test_failed_evaluation_restores_call() {
        assert_eq!(
            call_pattern("a.b(/^\".*\"$/) == window.atob;", "a.b('\"hi\"');").await,
            "a.b('\"hi\"');"
        );
    }

    #[tokio::test]
    async fn test_arguments_must_match() {
        assert_eq!(
            call_pattern("d(/^[a-z]+$/) == function (s) { return s.toUpperCase(); };", "d('ab'); d('A1'); d('ab', 1);").await,
            "'AB';\nd('A1');\nd('ab', 1);"
        );
    }

    #[tokio::test]
    async fn test_results_fold_into_surrounding_strings() {
        assert_eq!(
            call_pattern("d(undefined) == window.atob;", "x[d('Zm9v') + d('YmFy')];").await,
            "x['foobar'];"
        );
    }

    #[tokio::test]
    async fn test_rules_with_shared_prelude() {
        let description = "var table = ['log', 'info'];\n\
                           function pick(i) { return table[i]; }\n\
                           _0x1(undefined) == pick;\n\
                           _0x2(undefined) == function (i) { return pick(i).length; };";
        assert_eq!(
            call_pattern(description, "console[_0x1(1)](_0x2(0));").await,
            "console['info'](3);"
        );
    }

    #[tokio::test]
    async fn test_outer_call_is_evaluated_as_written() {
        assert_eq!(
            call_pattern("d(undefined) == function (s) { return s + '!'; };", "d(d('a'));").await,
            "d(d('a'));"
        );
    }

    #[tokio::test]
    async fn test_rewrite_calls_on_ast() {
        let description = JsParser::parse_to_ast("f(undefined) == String;").unwrap();
        let target = JsParser::parse_to_ast("g(f(1), f(true));").unwrap();
        let rewritten = rewrite_calls(&description, target).await.unwrap();
        assert_eq!(generate(&rewritten), "g('1', 'true');");
    }

    #[tokio::test]
    async fn test_invalid_rule_sets() {
        for description in ["f(1) == g;", "f(undefined);", "f(undefined) == g; f(undefined) == h;", "var x = 1;"] {
            let program = JsParser::parse_to_ast(description).unwrap();
            assert!(
                matches!(CallPatternRules::build(&program).await, Err(DeobError::Validation(_))),
                "accepted {}",
                description
            );
        }
    }

    #[tokio::test]
    async fn test_replacement_that_throws_at_build_fails() {
        let program = JsParser::parse_to_ast("f(undefined) == missing.decoder;").unwrap();
        assert!(matches!(
            CallPatternRules::build(&program).await,
            Err(DeobError::Sandbox(SandboxError::Evaluation(_)))
        ));
    }
}

// ============================================================================
// Eval packer
// ============================================================================

mod eval_packer {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unpacks_dictionary_packer() {
        let packed = "eval(function (p, a, c, k) { while (c--) { if (k[c]) { p = p.replace(new RegExp('\\\\b' + c.toString(a) + '\\\\b', 'g'), k[c]); } } return p; }('0 1=\\'2\\';3(1);', 10, 4, 'var|msg|hello|alert'.split('|')));";
        assert_eq!(
            Technique::EvalPacker.deobfuscate_async(packed, "").await.unwrap(),
            "var msg = 'hello';\nalert(msg);"
        );
    }

    #[tokio::test]
    async fn test_rejects_other_descriptions() {
        assert!(matches!(
            Technique::EvalPacker.deobfuscate_async("f('x');", "").await,
            Err(DeobError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_non_string_payload_is_stringified() {
        assert_eq!(
            Technique::EvalPacker.deobfuscate_async("eval(1 + 1);", "").await.unwrap(),
            "2;"
        );
    }
}
