use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deob::call_pattern::CallPatternRules;
use crate::deob::error::DeobError;
use crate::deob::evalpacker::unpack;
use crate::deob::inline::{inline_scope_literals, InlineOptions};
use crate::deob::normalize::normalize;
use crate::deob::substitution::{RuleFamily, SubstitutionTable};
use crate::parser::codegen::generate;
use crate::parser::JsParser;

/// A deobfuscation method, applied to a description and a target script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    ObjectProperty,
    IndexedArray,
    StringVariables,
    ScopeLiterals,
    CallPattern,
    EvalPacker,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TechniqueOptions {
    pub inline: InlineOptions,
}

impl Technique {
    pub const ALL: [Technique; 6] = [
        Technique::ObjectProperty,
        Technique::IndexedArray,
        Technique::StringVariables,
        Technique::ScopeLiterals,
        Technique::CallPattern,
        Technique::EvalPacker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Technique::ObjectProperty => "object-property",
            Technique::IndexedArray => "indexed-array",
            Technique::StringVariables => "string-variables",
            Technique::ScopeLiterals => "scope-literals",
            Technique::CallPattern => "call-pattern",
            Technique::EvalPacker => "eval-packer",
        }
    }

    /// Whether the technique needs a sandbox and therefore a runtime.
    pub fn is_async(&self) -> bool {
        matches!(self, Technique::CallPattern | Technique::EvalPacker)
    }

    pub fn deobfuscate(&self, description: &str, target: &str) -> Result<String, DeobError> {
        self.deobfuscate_with(description, target, &TechniqueOptions::default())
    }

    /// Runs a synchronous technique on the caller's thread.
    pub fn deobfuscate_with(
        &self,
        description: &str,
        target: &str,
        options: &TechniqueOptions,
    ) -> Result<String, DeobError> {
        info!(technique = self.name(), "deobfuscating");
        let family = match self {
            Technique::ObjectProperty => RuleFamily::ObjectProperty,
            Technique::IndexedArray => RuleFamily::Indexed,
            Technique::StringVariables => RuleFamily::StringVariables,
            Technique::ScopeLiterals => {
                let program = JsParser::parse_to_ast(target)?;
                return Ok(generate(&inline_scope_literals(program, &options.inline)));
            }
            Technique::CallPattern | Technique::EvalPacker => return Err(DeobError::Asynchronous(self.name())),
        };
        let table = SubstitutionTable::build(family, &JsParser::parse_to_ast(description)?)?;
        let program = JsParser::parse_to_ast(target)?;
        Ok(generate(&table.apply(program)))
    }

    pub async fn deobfuscate_async(&self, description: &str, target: &str) -> Result<String, DeobError> {
        self.deobfuscate_async_with(description, target, &TechniqueOptions::default())
            .await
    }

    /// Runs any technique. Synchronous ones complete without suspending.
    pub async fn deobfuscate_async_with(
        &self,
        description: &str,
        target: &str,
        options: &TechniqueOptions,
    ) -> Result<String, DeobError> {
        match self {
            Technique::CallPattern => {
                info!(technique = self.name(), "deobfuscating");
                let description = JsParser::parse_to_ast(description)?;
                let program = JsParser::parse_to_ast(target)?;
                let rules = CallPatternRules::build(&description).await?;
                Ok(generate(&rules.rewrite(program).await))
            }
            Technique::EvalPacker => {
                info!(technique = self.name(), "deobfuscating");
                unpack(&JsParser::parse_to_ast(description)?).await
            }
            _ => self.deobfuscate_with(description, target, options),
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Technique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Technique::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Technique::ALL.iter().map(Technique::name).collect();
                format!("unknown technique '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Reformats code, folding literal string concatenations on the way.
pub fn beautify(code: &str) -> Result<String, DeobError> {
    Ok(generate(&normalize(JsParser::parse_to_ast(code)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_names_round_trip() {
        for technique in Technique::ALL {
            assert_eq!(technique.name().parse::<Technique>(), Ok(technique));
        }
        assert!("rot13".parse::<Technique>().is_err());
    }

    #[test]
    fn test_sync_techniques() {
        assert_eq!(
            Technique::ObjectProperty
                .deobfuscate("var a = {x: 1, y: 2};", "console.log(a.x + a.y);")
                .unwrap(),
            "console.log(1 + 2);"
        );
        assert_eq!(
            Technique::ScopeLiterals
                .deobfuscate("ignored (", "var a = 'lSto'; window['loca' + a];")
                .unwrap(),
            "window['localSto'];"
        );
    }

    #[test]
    fn test_validation_and_parse_failures() {
        assert!(matches!(
            Technique::IndexedArray.deobfuscate("var a = 1;", "a[0];"),
            Err(DeobError::Validation(_))
        ));
        assert!(matches!(
            Technique::StringVariables.deobfuscate("var a = 'x';", "a +"),
            Err(DeobError::Parse(_))
        ));
        assert!(matches!(
            Technique::CallPattern.deobfuscate("a(undefined) == b;", "a(1);"),
            Err(DeobError::Asynchronous("call-pattern"))
        ));
    }

    #[test]
    fn test_beautify() {
        assert_eq!(beautify("var s='a'+'b';if(s){f(s)}").unwrap(), "var s = 'ab';\nif (s) {\n    f(s);\n}");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Technique::EvalPacker).unwrap(), "\"eval-packer\"");
    }

    #[tokio::test]
    async fn test_async_dispatch() {
        assert_eq!(
            Technique::StringVariables
                .deobfuscate_async("var a = 'x';", "f(a);")
                .await
                .unwrap(),
            "f('x');"
        );
        assert_eq!(
            Technique::EvalPacker
                .deobfuscate_async("eval('var b' + ' = 2;');", "")
                .await
                .unwrap(),
            "var b = 2;"
        );
    }
}
