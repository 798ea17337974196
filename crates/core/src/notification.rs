//! The per-request notification aggregate.

use crate::constants::{DISEASE_BUNDLE_PROFILE, LABORATORY_BUNDLE_PROFILE};
use crate::routing::RoutingData;
use crate::test_user::TestUserConfiguration;
use crate::{ProcessingError, ProcessingResult};
use fhir::{Bundle, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of notification. Selects the code map and the excerpt strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Laboratory,
    Disease,
}

impl ReportType {
    /// Detects the report type from the bundle profile, falling back to the records present.
    pub fn detect(bundle: &Bundle) -> Option<Self> {
        for profile in &bundle.meta.profile {
            if profile.starts_with(LABORATORY_BUNDLE_PROFILE) {
                return Some(ReportType::Laboratory);
            }
            if profile.starts_with(DISEASE_BUNDLE_PROFILE) {
                return Some(ReportType::Disease);
            }
        }

        if bundle.resources_of_type("DiagnosticReport").next().is_some() {
            Some(ReportType::Laboratory)
        } else if bundle.resources_of_type("Condition").next().is_some() {
            Some(ReportType::Disease)
        } else {
            None
        }
    }

    /// Record type carrying the code used for transmission-category mapping.
    pub fn primary_record_type(self) -> &'static str {
        match self {
            ReportType::Laboratory => "DiagnosticReport",
            ReportType::Disease => "Condition",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportType::Laboratory => "laboratory",
            ReportType::Disease => "disease",
        })
    }
}

/// A notification being processed: the bundle plus everything derived from it.
#[derive(Clone, Debug)]
pub struct Notification {
    bundle: Bundle,
    report_type: ReportType,
    sender: Option<String>,
    test_user: bool,
    transmission_category: Option<String>,
    routing: Option<RoutingData>,
}

impl Notification {
    pub fn new(
        bundle: Bundle,
        report_type: ReportType,
        sender: Option<String>,
        test_user: bool,
    ) -> Self {
        Self {
            bundle,
            report_type,
            sender,
            test_user,
            transmission_category: None,
            routing: None,
        }
    }

    /// Wrap a parsed bundle, detecting its report type and test-user status.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::InvalidDocument`] if the bundle has no Composition, no
    /// notified person, or its report type cannot be determined.
    pub fn from_bundle(
        bundle: Bundle,
        sender: Option<&str>,
        test_users: &TestUserConfiguration,
    ) -> ProcessingResult<Self> {
        if bundle.composition().is_none() {
            return Err(ProcessingError::InvalidDocument(
                "notification has no Composition".into(),
            ));
        }
        if bundle.subject().is_none() {
            return Err(ProcessingError::InvalidDocument(
                "notification has no notified person".into(),
            ));
        }
        let report_type = ReportType::detect(&bundle).ok_or_else(|| {
            ProcessingError::InvalidDocument("cannot determine notification report type".into())
        })?;

        let sender = sender.map(str::trim).filter(|s| !s.is_empty());
        let test_user = test_users.is_test_user(sender);
        Ok(Self::new(
            bundle,
            report_type,
            sender.map(str::to_string),
            test_user,
        ))
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn bundle_mut(&mut self) -> &mut Bundle {
        &mut self.bundle
    }

    pub fn into_bundle(self) -> Bundle {
        self.bundle
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    /// Business identifier of the notification (`Bundle.identifier.value`).
    pub fn identifier(&self) -> Option<&str> {
        self.bundle.identifier_value()
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn is_test_user(&self) -> bool {
        self.test_user
    }

    pub fn transmission_category(&self) -> Option<&str> {
        self.transmission_category.as_deref()
    }

    pub fn set_transmission_category(&mut self, category: Option<String>) {
        self.transmission_category = category;
    }

    pub fn routing(&self) -> Option<&RoutingData> {
        self.routing.as_ref()
    }

    pub(crate) fn set_routing(&mut self, routing: RoutingData) -> &RoutingData {
        self.routing.insert(routing)
    }

    /// Disease or pathogen code of the primary record (`Condition` / `DiagnosticReport`).
    pub fn primary_code(&self) -> Option<&str> {
        self.bundle
            .resources_of_type(self.report_type.primary_record_type())
            .find_map(|r| r.as_other().and_then(|o| o.first_code()))
    }

    /// Id of the Composition, used to key context enrichment.
    pub fn composition_id(&self) -> Option<&str> {
        self.bundle.composition().and_then(|c| c.id.as_deref())
    }

    /// Appends a record produced outside the document (e.g. enrichment).
    pub fn append_resource(&mut self, resource: Resource) {
        let full_url = resource
            .id()
            .map(|id| format!("{}/{}", resource.resource_type(), id));
        self.bundle.push(fhir::Entry::new(full_url, resource));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn detects_report_type_from_profile() {
        let lab = test_support::laboratory_bundle();
        assert_eq!(ReportType::detect(&lab), Some(ReportType::Laboratory));

        let disease = test_support::disease_bundle();
        assert_eq!(ReportType::detect(&disease), Some(ReportType::Disease));
    }

    #[test]
    fn detects_report_type_from_records_without_profile() {
        let mut lab = test_support::laboratory_bundle();
        lab.meta.profile.clear();
        assert_eq!(ReportType::detect(&lab), Some(ReportType::Laboratory));

        let mut bare = Bundle::new("document");
        bare.meta.profile.push("https://example.org/Other".into());
        assert_eq!(ReportType::detect(&bare), None);
    }

    #[test]
    fn from_bundle_flags_test_users() {
        let policy = test_support::test_users(false);
        let n = Notification::from_bundle(test_support::disease_bundle(), Some("test-int"), &policy)
            .expect("notification");
        assert!(n.is_test_user());
        assert_eq!(n.sender(), Some("test-int"));
        assert_eq!(n.identifier(), Some(test_support::NOTIFICATION_ID));
        assert_eq!(n.primary_code(), Some("cvdd"));
        assert!(n.routing().is_none());

        let blank = Notification::from_bundle(test_support::disease_bundle(), Some("  "), &policy)
            .expect("notification");
        assert!(!blank.is_test_user());
        assert_eq!(blank.sender(), None);
    }

    #[test]
    fn rejects_bundles_without_composition() {
        let mut bundle = test_support::disease_bundle();
        bundle.retain(|e| e.resource.resource_type() != "Composition");
        let err = Notification::from_bundle(bundle, None, &test_support::test_users(false))
            .expect_err("no composition");
        assert!(matches!(err, ProcessingError::InvalidDocument(_)));
    }

    #[test]
    fn appended_resources_are_resolvable() {
        let mut n = test_support::disease_notification(None);
        n.append_resource(Resource::Other(fhir::OtherResource::new(
            "Provenance",
            Some("pv1".into()),
        )));
        assert!(n.bundle().resolve("Provenance/pv1").is_some());
    }
}
