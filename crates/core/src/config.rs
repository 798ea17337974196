//! Core processing configuration.
//!
//! Configuration is resolved once at process startup (typically from a YAML file) and then
//! passed into the core components as an immutable `Arc<ProcessingConfig>`. Nothing in the
//! request path reads files or environment variables.
//!
//! ```yaml
//! test_users:
//!   ids: [test-int, test-ext]
//!   fallback_destination: "1.99.99."
//!   sender_is_destination: false
//! outcome_threshold: warning
//! cache_reload_interval_secs: 300
//! code_mapping:
//!   provider: cache
//! ```

use crate::constants::{
    DEFAULT_CACHE_RELOAD_INTERVAL_SECS, DEFAULT_DISEASE_CONCEPT_MAP,
    DEFAULT_LABORATORY_CONCEPT_MAP,
};
use crate::test_user::TestUserConfiguration;
use crate::{ProcessingError, ProcessingResult};
use fhir::Severity;
use nps_types::NonEmptyText;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Which code-mapping provider serves transmission-category lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeMappingProvider {
    /// Periodically reloaded concept maps held in memory.
    #[default]
    Cache,
    /// Per-code lookups against an external service.
    External,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeMappingConfig {
    pub provider: CodeMappingProvider,
    pub disease_concept_map: NonEmptyText,
    pub laboratory_concept_map: NonEmptyText,
}

impl CodeMappingConfig {
    pub fn new(provider: CodeMappingProvider) -> ProcessingResult<Self> {
        Ok(Self {
            provider,
            disease_concept_map: concept_map_name(DEFAULT_DISEASE_CONCEPT_MAP)?,
            laboratory_concept_map: concept_map_name(DEFAULT_LABORATORY_CONCEPT_MAP)?,
        })
    }
}

/// Processing configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    test_users: TestUserConfiguration,
    outcome_threshold: Severity,
    cache_reload_interval: Duration,
    code_mapping: CodeMappingConfig,
}

impl ProcessingConfig {
    /// Create a new `ProcessingConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidConfig`] if the reload interval is zero or the outcome
    /// threshold would filter out error issues.
    pub fn new(
        test_users: TestUserConfiguration,
        outcome_threshold: Severity,
        cache_reload_interval: Duration,
        code_mapping: CodeMappingConfig,
    ) -> ProcessingResult<Self> {
        if cache_reload_interval.is_zero() {
            return Err(ProcessingError::InvalidConfig(
                "cache_reload_interval_secs must be greater than zero".into(),
            ));
        }

        if outcome_threshold > Severity::Error {
            return Err(ProcessingError::InvalidConfig(format!(
                "outcome_threshold '{outcome_threshold}' would hide error issues"
            )));
        }

        Ok(Self {
            test_users,
            outcome_threshold,
            cache_reload_interval,
            code_mapping,
        })
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// Unknown keys are rejected; the error message carries the path of the failing field.
    pub fn from_yaml(yaml_text: &str) -> ProcessingResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: ConfigWire = serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            ProcessingError::InvalidConfig(format!("config schema mismatch at {path}: {source}"))
        })?;
        wire.into_config()
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn load(path: &Path) -> ProcessingResult<Self> {
        let text = std::fs::read_to_string(path).map_err(ProcessingError::ConfigRead)?;
        Self::from_yaml(&text)
    }

    pub fn test_users(&self) -> &TestUserConfiguration {
        &self.test_users
    }

    pub fn outcome_threshold(&self) -> Severity {
        self.outcome_threshold
    }

    pub fn cache_reload_interval(&self) -> Duration {
        self.cache_reload_interval
    }

    pub fn code_mapping(&self) -> &CodeMappingConfig {
        &self.code_mapping
    }
}

fn concept_map_name(name: &str) -> ProcessingResult<NonEmptyText> {
    NonEmptyText::new(name)
        .map_err(|_| ProcessingError::InvalidConfig("concept map name cannot be empty".into()))
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigWire {
    test_users: TestUsersWire,

    #[serde(default)]
    outcome_threshold: Option<String>,

    #[serde(default)]
    cache_reload_interval_secs: Option<u64>,

    #[serde(default)]
    code_mapping: Option<CodeMappingWire>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TestUsersWire {
    #[serde(default)]
    ids: Vec<String>,

    fallback_destination: String,

    #[serde(default)]
    sender_is_destination: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CodeMappingWire {
    #[serde(default)]
    provider: CodeMappingProvider,

    #[serde(default)]
    disease_concept_map: Option<String>,

    #[serde(default)]
    laboratory_concept_map: Option<String>,
}

impl ConfigWire {
    fn into_config(self) -> ProcessingResult<ProcessingConfig> {
        let fallback = NonEmptyText::new(&self.test_users.fallback_destination).map_err(|_| {
            ProcessingError::InvalidConfig("test_users.fallback_destination cannot be empty".into())
        })?;
        let ids: HashSet<String> = self
            .test_users
            .ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let test_users =
            TestUserConfiguration::new(ids, fallback, self.test_users.sender_is_destination);

        let outcome_threshold = match self.outcome_threshold {
            Some(value) => value.parse::<Severity>().map_err(|e| {
                ProcessingError::InvalidConfig(format!("outcome_threshold: {e}"))
            })?,
            None => Severity::Warning,
        };

        let interval = Duration::from_secs(
            self.cache_reload_interval_secs
                .unwrap_or(DEFAULT_CACHE_RELOAD_INTERVAL_SECS),
        );

        let code_mapping = match self.code_mapping {
            Some(wire) => CodeMappingConfig {
                provider: wire.provider,
                disease_concept_map: concept_map_name(
                    wire.disease_concept_map
                        .as_deref()
                        .unwrap_or(DEFAULT_DISEASE_CONCEPT_MAP),
                )?,
                laboratory_concept_map: concept_map_name(
                    wire.laboratory_concept_map
                        .as_deref()
                        .unwrap_or(DEFAULT_LABORATORY_CONCEPT_MAP),
                )?,
            },
            None => CodeMappingConfig::new(CodeMappingProvider::Cache)?,
        };

        ProcessingConfig::new(test_users, outcome_threshold, interval, code_mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
test_users:
  ids: [test-int, " test-ext ", ""]
  fallback_destination: "1.99.99."
  sender_is_destination: true
outcome_threshold: ERROR
cache_reload_interval_secs: 60
code_mapping:
  provider: external
  disease_concept_map: DiseaseMap
"#;

    #[test]
    fn parses_a_full_configuration() {
        let config = ProcessingConfig::from_yaml(FULL).expect("parse config");
        assert!(config.test_users().is_test_user(Some("test-ext")));
        assert!(!config.test_users().is_test_user(Some("")));
        assert!(config.test_users().sender_is_destination());
        assert_eq!(config.outcome_threshold(), Severity::Error);
        assert_eq!(config.cache_reload_interval(), Duration::from_secs(60));
        assert_eq!(
            config.code_mapping().provider,
            CodeMappingProvider::External
        );
        assert_eq!(config.code_mapping().disease_concept_map, "DiseaseMap");
        assert_eq!(
            config.code_mapping().laboratory_concept_map,
            DEFAULT_LABORATORY_CONCEPT_MAP
        );
    }

    #[test]
    fn applies_defaults() {
        let config = ProcessingConfig::from_yaml("test_users:\n  fallback_destination: fb\n")
            .expect("parse config");
        assert_eq!(config.outcome_threshold(), Severity::Warning);
        assert_eq!(
            config.cache_reload_interval(),
            Duration::from_secs(DEFAULT_CACHE_RELOAD_INTERVAL_SECS)
        );
        assert_eq!(config.code_mapping().provider, CodeMappingProvider::Cache);
        assert!(!config.test_users().sender_is_destination());
    }

    #[test]
    fn rejects_unknown_keys_with_a_path() {
        let err = ProcessingConfig::from_yaml(
            "test_users:\n  fallback_destination: fb\n  forward: true\n",
        )
        .expect_err("unknown key");
        match err {
            ProcessingError::InvalidConfig(msg) => {
                assert!(msg.contains("test_users"), "unexpected message: {msg}");
                assert!(msg.contains("forward"), "unexpected message: {msg}");
            }
            other => panic!("expected InvalidConfig error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let blank = ProcessingConfig::from_yaml("test_users:\n  fallback_destination: \"  \"\n");
        assert!(matches!(blank, Err(ProcessingError::InvalidConfig(_))));

        let zero = ProcessingConfig::from_yaml(
            "test_users:\n  fallback_destination: fb\ncache_reload_interval_secs: 0\n",
        );
        assert!(matches!(zero, Err(ProcessingError::InvalidConfig(_))));

        let severity = ProcessingConfig::from_yaml(
            "test_users:\n  fallback_destination: fb\noutcome_threshold: severe\n",
        );
        assert!(matches!(severity, Err(ProcessingError::InvalidConfig(_))));

        let fatal = ProcessingConfig::from_yaml(
            "test_users:\n  fallback_destination: fb\noutcome_threshold: fatal\n",
        );
        assert!(matches!(fatal, Err(ProcessingError::InvalidConfig(_))));
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(FULL.as_bytes()).expect("write config");

        let config = ProcessingConfig::load(file.path()).expect("load config");
        assert_eq!(config.outcome_threshold(), Severity::Error);

        let missing = ProcessingConfig::load(Path::new("/nonexistent/nps.yaml"));
        assert!(matches!(missing, Err(ProcessingError::ConfigRead(_))));
    }
}
