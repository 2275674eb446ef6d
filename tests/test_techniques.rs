//! End-to-end tests for the synchronous techniques: description and target
//! text in, rewritten target text out.

extern crate jsdeob;

use jsdeob::deob::inline::InlineOptions;
use jsdeob::deob::{beautify, DeobError, Technique, TechniqueOptions};
use pretty_assertions::assert_eq;

fn run(technique: Technique, description: &str, target: &str) -> String {
    technique
        .deobfuscate(description, target)
        .unwrap_or_else(|e| panic!("{} failed: {}", technique, e))
}

// ============================================================================
// Object-property tables
// ============================================================================

mod object_property {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolves_member_reads() {
        assert_eq!(
            run(Technique::ObjectProperty, "var a = {x: 1, y: 2};", "console.log(a.x + a.y);"),
            "console.log(1 + 2);"
        );
    }

    #[test]
    fn test_computed_keys_and_string_folding() {
        assert_eq!(
            run(
                Technique::ObjectProperty,
                "var _t = {'k1': 'getEl', k2: 'ementById', 3: 'doc'};",
                "window[_t[3] + 'ument'][_t.k1 + _t['k2']]('main');"
            ),
            "window['document']['getElementById']('main');"
        );
    }

    #[test]
    fn test_rejects_regexp_values() {
        assert!(matches!(
            Technique::ObjectProperty.deobfuscate("var o = {r: /a/g};", "o.r.test(s); o.r.test(t);"),
            Err(DeobError::Validation(_))
        ));
    }

    #[test]
    fn test_absent_keys_untouched() {
        assert_eq!(
            run(Technique::ObjectProperty, "var a = {x: 1};", "f(a.x, a.y, b.x);"),
            "f(1, a.y, b.x);"
        );
    }

    #[test]
    fn test_values_are_folded_when_the_table_is_built() {
        assert_eq!(
            run(Technique::ObjectProperty, "var a = {x: 'a' + 'b', y: 2 * 3};", "f(a.x, a.y);"),
            "f('ab', 6);"
        );
    }

    #[test]
    fn test_rejects_non_table_descriptions() {
        for description in ["var a = 1;", "var a = {x: f()};", "f(); var a = {};", "var a = {x: 1}, b = {};"] {
            assert!(
                matches!(
                    Technique::ObjectProperty.deobfuscate(description, "a.x;"),
                    Err(DeobError::Validation(_))
                ),
                "accepted {}",
                description
            );
        }
    }
}

// ============================================================================
// Indexed arrays
// ============================================================================

mod indexed_array {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hex_escaped_elements() {
        assert_eq!(
            run(Technique::IndexedArray, r"var arr = ['\x61', '\x62'];", "arr[0]+arr[1];"),
            "'ab';"
        );
    }

    #[test]
    fn test_numeric_and_string_indices() {
        assert_eq!(
            run(
                Technique::IndexedArray,
                "var _0x12 = ['log', 'hello', 42];",
                "console[_0x12[0]](_0x12['1'], _0x12[0x2], _0x12[3]);"
            ),
            "console['log']('hello', 42, _0x12[3]);"
        );
    }

    #[test]
    fn test_rejects_holes_and_expressions() {
        assert!(Technique::IndexedArray.deobfuscate("var a = [1, , 2];", "a[0];").is_err());
        assert!(Technique::IndexedArray.deobfuscate("var a = [x];", "a[0];").is_err());
        assert!(Technique::IndexedArray.deobfuscate("var a = {};", "a[0];").is_err());
    }
}

// ============================================================================
// String variables
// ============================================================================

mod string_variables {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replaces_global_reads() {
        assert_eq!(
            run(Technique::StringVariables, "var a = 'lSto', b = 'tIt';", "window['loca'+a];"),
            "window['localSto'];"
        );
    }

    #[test]
    fn test_target_redeclaring_the_table() {
        assert_eq!(
            run(
                Technique::StringVariables,
                "var a = 'lSto', b = 'tIt';",
                "var a = 'lSto', b = 'tIt'; window['loca' + a]['ge' + b];"
            ),
            "var a = 'lSto', b = 'tIt';\nwindow['localSto']['getIt'];"
        );
    }

    #[test]
    fn test_local_bindings_shadow_the_table() {
        assert_eq!(
            run(
                Technique::StringVariables,
                "var s = 'x';",
                "f(s); function g(s) { return s; } (function () { var s = 1; f(s); }());"
            ),
            "f('x');\nfunction g(s) {\n    return s;\n}\n(function () {\n    var s = 1;\n    f(s);\n}());"
        );
    }

    #[test]
    fn test_rejects_uninitialized_variables() {
        assert!(matches!(
            Technique::StringVariables.deobfuscate("var a;", "a;"),
            Err(DeobError::Validation(_))
        ));
    }
}

// ============================================================================
// Scope literals
// ============================================================================

mod scope_literals {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inlines_to_a_fixed_point() {
        assert_eq!(
            run(
                Technique::ScopeLiterals,
                "",
                "(function(){ var a='lSto',b='tIt',c='em',d='rage'; return window['loca'+a+d]['ge'+b+c]('date'); })();"
            ),
            "(function () {\n    return window['localStorage']['getItem']('date');\n}());"
        );
    }

    #[test]
    fn test_reassigned_variables_survive() {
        assert_eq!(
            run(Technique::ScopeLiterals, "", "var n = 0; while (n < 3) { n += 1; }"),
            "var n = 0;\nwhile (n < 3) {\n    n += 1;\n}"
        );
    }

    #[test]
    fn test_sweep_limit_from_options() {
        let options = TechniqueOptions {
            inline: InlineOptions { max_sweeps: 0 },
        };
        assert_eq!(
            Technique::ScopeLiterals
                .deobfuscate_with("", "var a = 'x'; f(a);", &options)
                .unwrap(),
            "var a = 'x';\nf(a);"
        );
    }
}

// ============================================================================
// Beautify and failure modes
// ============================================================================

#[test]
fn test_beautify_merges_strings() {
    assert_eq!(
        beautify("var u='ht'+'tp://'+host+'/a'+'b';").unwrap(),
        "var u = 'http://' + host + '/ab';"
    );
}

#[test]
fn test_target_parse_errors_are_reported() {
    assert!(matches!(
        Technique::ObjectProperty.deobfuscate("var a = {x: 1};", "a.x +"),
        Err(DeobError::Parse(_))
    ));
    assert!(matches!(beautify("function ("), Err(DeobError::Parse(_))));
}

#[test]
fn test_sandboxed_techniques_refuse_sync_entry() {
    for technique in [Technique::CallPattern, Technique::EvalPacker] {
        assert!(technique.is_async());
        assert!(matches!(technique.deobfuscate("", ""), Err(DeobError::Asynchronous(_))));
    }
}
