//! Run configuration, read from a JSON file and overridden by command-line
//! flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deob::inline::InlineOptions;
use crate::deob::{Technique, TechniqueOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Expected format:
/// ```json
/// {
///     "technique": "call-pattern",
///     "description": "rules.js",
///     "target": "obfuscated.js",
///     "sandbox_timeout_ms": 5000,
///     "max_sweeps": 64,
///     "log_filter": "jsdeob=debug"
/// }
/// ```
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub technique: Option<Technique>,
    pub description: Option<PathBuf>,
    pub target: Option<PathBuf>,
    /// Limit for a whole sandboxed technique. None waits forever.
    pub sandbox_timeout_ms: Option<u64>,
    pub max_sweeps: usize,
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            technique: None,
            description: None,
            target: None,
            sandbox_timeout_ms: None,
            max_sweeps: InlineOptions::default().max_sweeps,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn sandbox_timeout(&self) -> Option<Duration> {
        self.sandbox_timeout_ms.map(Duration::from_millis)
    }

    pub fn technique_options(&self) -> TechniqueOptions {
        TechniqueOptions {
            inline: InlineOptions {
                max_sweeps: self.max_sweeps,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_sweeps, 64);
        assert_eq!(config.sandbox_timeout(), None);
    }

    #[test]
    fn test_parse_all_keys() {
        let config = Config::parse(
            r#"{
                "technique": "indexed-array",
                "description": "d.js",
                "target": "t.js",
                "sandbox_timeout_ms": 250,
                "max_sweeps": 3,
                "log_filter": "debug"
            }"#,
        )
        .unwrap();
        assert_eq!(config.technique, Some(Technique::IndexedArray));
        assert_eq!(config.description, Some(PathBuf::from("d.js")));
        assert_eq!(config.sandbox_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.technique_options().inline.max_sweeps, 3);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(Config::parse(r#"{"technique": "rot13"}"#), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::parse(r#"{"sweeps": 1}"#), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::load(Path::new("/nonexistent/jsdeob.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
