//! FHIR `OperationOutcome`: structured processing results.
//!
//! Severities are totally ordered (`Information < Warning < Error < Fatal`); the ordering is
//! the declaration order of [`Severity`] and is relied upon for threshold filtering.

use crate::datatypes::{CodeableConcept, Coding};
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = FhirError;

    /// Case-insensitive parse of the FHIR severity code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "information" => Ok(Severity::Information),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            other => Err(FhirError::InvalidInput(format!(
                "unknown issue severity '{other}'"
            ))),
        }
    }
}

/// Issue kind (subset of the FHIR `issue-type` value set used by this service).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Invalid,
    Processing,
    Exception,
    Informational,
    Incomplete,
}

/// One entry of an outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,

    pub code: IssueType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<String>,
}

impl Issue {
    pub fn new(severity: Severity, code: IssueType) -> Self {
        Self {
            severity,
            code,
            diagnostics: None,
            details: None,
            location: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }

    pub fn with_details(mut self, coding: Coding) -> Self {
        self.details = Some(CodeableConcept::from_coding(coding));
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location.push(location.into());
        self
    }

    /// Code of the first detail coding, if any.
    pub fn detail_code(&self) -> Option<&str> {
        self.details.as_ref().and_then(CodeableConcept::first_code)
    }
}

/// An ordered list of issues.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OperationOutcomeWire", try_from = "OperationOutcomeWire")]
pub struct OperationOutcome {
    pub issues: Vec<Issue>,
}

impl OperationOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Parse an outcome from FHIR JSON text.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        Ok(serde_json::from_str(json_text)?)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationOutcomeWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default)]
    issue: Vec<Issue>,
}

impl From<OperationOutcome> for OperationOutcomeWire {
    fn from(outcome: OperationOutcome) -> Self {
        Self {
            resource_type: "OperationOutcome".into(),
            id: None,
            issue: outcome.issues,
        }
    }
}

impl TryFrom<OperationOutcomeWire> for OperationOutcome {
    type Error = FhirError;

    fn try_from(wire: OperationOutcomeWire) -> Result<Self, Self::Error> {
        if wire.resource_type != "OperationOutcome" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'OperationOutcome', got '{}'",
                wire.resource_type
            )));
        }
        Ok(Self { issues: wire.issue })
    }
}
