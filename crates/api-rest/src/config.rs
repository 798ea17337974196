//! Service configuration resolved from the process environment.
//!
//! | Variable                | Default          |
//! |-------------------------|------------------|
//! | `NPS_REST_ADDR`         | `0.0.0.0:3000`   |
//! | `NPS_CONFIG_FILE`       | `nps.yaml`       |
//! | `NPS_ROUTING_URL`       | required         |
//! | `NPS_STORAGE_URL`       | required         |
//! | `NPS_CONCEPT_MAP_URL`   | required for the `cache` code-mapping provider |
//! | `NPS_CODE_LOOKUP_URL`   | required for the `external` code-mapping provider |
//! | `NPS_ENRICHMENT_URL`    | unset disables context enrichment |
//! | `NPS_HTTP_TIMEOUT_SECS` | `10`             |

use nps_core::{ProcessingError, ProcessingResult};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CONFIG_FILE: &str = "nps.yaml";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub rest_addr: String,
    pub config_file: PathBuf,
    pub routing_url: String,
    pub storage_url: String,
    pub concept_map_url: Option<String>,
    pub code_lookup_url: Option<String>,
    pub enrichment_url: Option<String>,
    pub http_timeout: Duration,
}

impl ServiceConfig {
    /// Read the service configuration from environment variables.
    pub fn from_env() -> ProcessingResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the configuration through `lookup`, which answers a variable name with its value.
    ///
    /// Blank values count as unset. Base URLs lose any trailing `/`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProcessingResult<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = |name: &str| value(name).map(|v| v.trim_end_matches('/').to_string());
        let required = |name: &str| {
            url(name).ok_or_else(|| ProcessingError::InvalidConfig(format!("{name} must be set")))
        };

        let http_timeout = match value("NPS_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    ProcessingError::InvalidConfig(format!(
                        "NPS_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                    ))
                })?;
                if secs == 0 {
                    return Err(ProcessingError::InvalidConfig(
                        "NPS_HTTP_TIMEOUT_SECS must be greater than zero".into(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            rest_addr: value("NPS_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into()),
            config_file: value("NPS_CONFIG_FILE")
                .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into())
                .into(),
            routing_url: required("NPS_ROUTING_URL")?,
            storage_url: required("NPS_STORAGE_URL")?,
            concept_map_url: url("NPS_CONCEPT_MAP_URL"),
            code_lookup_url: url("NPS_CODE_LOOKUP_URL"),
            enrichment_url: url("NPS_ENRICHMENT_URL"),
            http_timeout,
        })
    }
}
