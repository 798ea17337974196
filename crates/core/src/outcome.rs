//! Outcome assembly for the notification sender.
//!
//! Both entry points end in [`OutcomeAssembler::normalize`]: issues below the configured
//! threshold are removed, the rest are stably sorted by descending severity.

use crate::constants::{
    ALL_OK_DIAGNOSTICS, ERROR_CODE_SYSTEM, RESPONSE_BUNDLE_PARAMETER, RESPONSE_OUTCOME_PARAMETER,
};
use crate::error::{ErrorCode, ProcessingError};
use fhir::{
    Bundle, Coding, Issue, IssueType, OperationOutcome, ParameterResource, Parameters, Severity,
};
use std::cmp::Reverse;

#[derive(Clone, Copy, Debug)]
pub struct OutcomeAssembler {
    threshold: Severity,
}

impl OutcomeAssembler {
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Appends an error issue to `existing` (or a new outcome) and normalizes it.
    ///
    /// Statuses of 500 and above are reported as `exception`, everything else as `processing`.
    pub fn build_error(
        &self,
        correlation_id: Option<&str>,
        status: u16,
        error_code: ErrorCode,
        detail: &str,
        existing: Option<OperationOutcome>,
    ) -> OperationOutcome {
        let mut outcome = existing.unwrap_or_default();

        let kind = if status >= 500 {
            IssueType::Exception
        } else {
            IssueType::Processing
        };
        let mut issue = Issue::new(Severity::Error, kind)
            .with_diagnostics(detail)
            .with_details(Coding::new(ERROR_CODE_SYSTEM, error_code.as_str()));
        if let Some(correlation_id) = correlation_id {
            issue = issue.with_location(correlation_id);
        }
        outcome.push(issue);

        self.normalize(&mut outcome);
        outcome
    }

    /// Error outcome for a failed processing run.
    pub fn error_outcome(
        &self,
        error: &ProcessingError,
        correlation_id: Option<&str>,
    ) -> OperationOutcome {
        self.build_error(
            correlation_id,
            error.status_code(),
            error.error_code(),
            &error.to_string(),
            None,
        )
    }

    /// Pairs the document with its normalized outcome, led by the "All OK" issue.
    pub fn build_success(&self, bundle: Bundle, mut outcome: OperationOutcome) -> Parameters {
        self.normalize(&mut outcome);
        outcome.issues.insert(
            0,
            Issue::new(Severity::Information, IssueType::Informational)
                .with_diagnostics(ALL_OK_DIAGNOSTICS),
        );

        Parameters::new()
            .with(
                RESPONSE_BUNDLE_PARAMETER,
                ParameterResource::Bundle(Box::new(bundle)),
            )
            .with(
                RESPONSE_OUTCOME_PARAMETER,
                ParameterResource::OperationOutcome(outcome),
            )
    }

    pub fn normalize(&self, outcome: &mut OperationOutcome) {
        outcome.issues.retain(|issue| issue.severity >= self.threshold);
        // `sort_by_key` is stable.
        outcome.issues.sort_by_key(|issue| Reverse(issue.severity));
    }
}
