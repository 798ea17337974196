//! Routing decisions and their resolution onto a notification.
//!
//! The routing *decision* is made by an external service. This module:
//! - models the decision as it arrives on the wire ([`RoutingDecision`])
//! - validates it into the immutable [`RoutingData`] (the only way to build one)
//! - applies it to the notification as bundle meta tags ([`RoutingResolver`])
//!
//! Test-user substitution only ever touches the responsible destination. The per-origin
//! destinations are tagged as decided.

use crate::collaborators::CollaboratorError;
use crate::config::ProcessingConfig;
use crate::constants::{
    RESPONSIBLE_DEPARTMENT_SYSTEM, RESPONSIBLE_FOR_CURRENT_ADDRESS_SYSTEM,
    RESPONSIBLE_FOR_NOTIFIER_ADDRESS_SYSTEM, RESPONSIBLE_FOR_ORDINARY_ADDRESS_SYSTEM,
    RESPONSIBLE_FOR_PRIMARY_ADDRESS_SYSTEM, RESPONSIBLE_FOR_SUBMITTER_ADDRESS_SYSTEM,
};
use crate::notification::{Notification, ReportType};
use crate::{ProcessingError, ProcessingResult};
use fhir::Coding;
use nps_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Transformation a receiver requires before delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Encrypt,
    NotByName,
    Anonymize,
    NoAction,
}

/// Whose address a per-origin destination was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressOrigin {
    NotifiedPersonPrimary,
    NotifiedPersonCurrent,
    NotifiedPersonOrdinary,
    Notifier,
    Submitter,
    NotifiedPersonOther,
}

impl AddressOrigin {
    /// Tag system recording the destination for this origin. `NotifiedPersonOther` has none.
    pub fn tag_system(self) -> Option<&'static str> {
        match self {
            AddressOrigin::NotifiedPersonPrimary => Some(RESPONSIBLE_FOR_PRIMARY_ADDRESS_SYSTEM),
            AddressOrigin::NotifiedPersonCurrent => Some(RESPONSIBLE_FOR_CURRENT_ADDRESS_SYSTEM),
            AddressOrigin::NotifiedPersonOrdinary => Some(RESPONSIBLE_FOR_ORDINARY_ADDRESS_SYSTEM),
            AddressOrigin::Notifier => Some(RESPONSIBLE_FOR_NOTIFIER_ADDRESS_SYSTEM),
            AddressOrigin::Submitter => Some(RESPONSIBLE_FOR_SUBMITTER_ADDRESS_SYSTEM),
            AddressOrigin::NotifiedPersonOther => None,
        }
    }
}

/// Legal paragraph the notification falls under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    #[serde(rename = "P6_1")]
    P61,
    #[serde(rename = "P7_1")]
    P71,
    #[serde(rename = "P7_3")]
    P73,
    #[serde(rename = "P7_4")]
    P74,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityType {
    HealthOffice,
    StateAuthority,
    FederalAuthority,
    SpecificReceiver,
}

/// One delivery destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receiver {
    pub authority_type: AuthorityType,
    pub id: NonEmptyText,
    /// In decision order, without duplicates.
    pub actions: Vec<Action>,
    pub optional: bool,
}

impl Receiver {
    pub fn requires(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// A routing decision as returned by the routing service. Not yet validated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    #[serde(rename = "type", default)]
    pub report_type: Option<ReportType>,

    #[serde(default)]
    pub notification_category: NotificationCategory,

    #[serde(default)]
    pub bundle_actions: Vec<Action>,

    #[serde(default)]
    pub routes: Vec<RouteDecision>,

    #[serde(default)]
    pub health_offices: BTreeMap<AddressOrigin, String>,

    #[serde(default)]
    pub responsible: Option<String>,

    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,

    #[serde(default)]
    pub custodian: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    #[serde(rename = "type")]
    pub authority_type: AuthorityType,

    pub specific_receiver_id: String,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub optional: bool,
}

impl RoutingDecision {
    /// Parse a decision from JSON text.
    pub fn parse(json_text: &str) -> ProcessingResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            ProcessingError::RoutingService(CollaboratorError::InvalidResponse {
                service: "routing",
                reason: format!("decision schema mismatch at {path}: {}", err.into_inner()),
            })
        })
    }
}

/// A validated routing decision.
///
/// Only [`RoutingData::validate`] builds one, so `responsible` is never blank and `routes`
/// never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingData {
    report_type: ReportType,
    category: NotificationCategory,
    bundle_actions: Vec<Action>,
    routes: Vec<Receiver>,
    health_offices: BTreeMap<AddressOrigin, String>,
    responsible: NonEmptyText,
    allowed_roles: Option<BTreeSet<String>>,
    custodian: Option<String>,
}

impl RoutingData {
    /// Validate a decision for a notification of `report_type`.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::MissingResponsible`] if `responsible` is absent or blank, or there
    ///   are no routes.
    /// - [`ProcessingError::RoutingService`] if a route has a blank receiver id.
    pub fn validate(decision: RoutingDecision, report_type: ReportType) -> ProcessingResult<Self> {
        let responsible = NonEmptyText::from_optional(decision.responsible.as_deref())
            .ok_or(ProcessingError::MissingResponsible)?;
        if decision.routes.is_empty() {
            return Err(ProcessingError::MissingResponsible);
        }

        if let Some(decided) = decision.report_type {
            if decided != report_type {
                tracing::warn!(
                    decided = %decided,
                    detected = %report_type,
                    "routing decision report type disagrees with notification; using notification's"
                );
            }
        }

        let routes = decision
            .routes
            .into_iter()
            .map(|route| -> ProcessingResult<Receiver> {
                let id = NonEmptyText::new(&route.specific_receiver_id).map_err(|_| {
                    ProcessingError::RoutingService(CollaboratorError::InvalidResponse {
                        service: "routing",
                        reason: "route without receiver id".into(),
                    })
                })?;
                Ok(Receiver {
                    authority_type: route.authority_type,
                    id,
                    actions: dedup_in_order(route.actions),
                    optional: route.optional,
                })
            })
            .collect::<ProcessingResult<Vec<_>>>()?;

        Ok(Self {
            report_type,
            category: decision.notification_category,
            bundle_actions: dedup_in_order(decision.bundle_actions),
            routes,
            health_offices: decision
                .health_offices
                .into_iter()
                .filter(|(_, destination)| !destination.trim().is_empty())
                .collect(),
            responsible,
            allowed_roles: decision.allowed_roles.map(|r| r.into_iter().collect()),
            custodian: decision.custodian.filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn category(&self) -> NotificationCategory {
        self.category
    }

    pub fn bundle_actions(&self) -> &[Action] {
        &self.bundle_actions
    }

    pub fn routes(&self) -> &[Receiver] {
        &self.routes
    }

    pub fn health_offices(&self) -> &BTreeMap<AddressOrigin, String> {
        &self.health_offices
    }

    pub fn responsible(&self) -> &NonEmptyText {
        &self.responsible
    }

    pub fn allowed_roles(&self) -> Option<&BTreeSet<String>> {
        self.allowed_roles.as_ref()
    }

    pub fn custodian(&self) -> Option<&str> {
        self.custodian.as_deref()
    }

    /// Actions required by the receiver with `receiver_id`.
    pub fn actions_for(&self, receiver_id: &str) -> Option<&[Action]> {
        self.routes
            .iter()
            .find(|r| r.id == receiver_id)
            .map(|r| r.actions.as_slice())
    }
}

fn dedup_in_order(actions: Vec<Action>) -> Vec<Action> {
    let mut unique = Vec::with_capacity(actions.len());
    for action in actions {
        if !unique.contains(&action) {
            unique.push(action);
        }
    }
    unique
}

/// Applies validated routing decisions to notifications.
#[derive(Clone, Debug)]
pub struct RoutingResolver {
    config: Arc<ProcessingConfig>,
}

impl RoutingResolver {
    pub fn new(config: Arc<ProcessingConfig>) -> Self {
        Self { config }
    }

    /// Validate `decision` and record it on `notification`.
    ///
    /// Validation happens before anything is written, so a rejected decision leaves the
    /// notification untouched.
    pub fn resolve<'n>(
        &self,
        notification: &'n mut Notification,
        decision: RoutingDecision,
    ) -> ProcessingResult<&'n RoutingData> {
        let mut routing = RoutingData::validate(decision, notification.report_type())?;

        if notification.is_test_user() {
            let destination = self
                .config
                .test_users()
                .resolve_destination(notification.sender());
            tracing::info!(
                sender = notification.sender().unwrap_or_default(),
                decided = %routing.responsible,
                destination,
                "test user notification; redirecting responsible destination"
            );
            routing.responsible = NonEmptyText::new(destination).map_err(|_| {
                ProcessingError::InvalidConfig("test-user destination is blank".into())
            })?;
        }

        let meta = &mut notification.bundle_mut().meta;
        meta.set_tag(Coding::new(
            RESPONSIBLE_DEPARTMENT_SYSTEM,
            routing.responsible.as_str(),
        ));
        for (origin, destination) in &routing.health_offices {
            if let Some(system) = origin.tag_system() {
                meta.add_tag(Coding::new(system, destination.as_str()));
            }
        }

        tracing::debug!(
            notification = notification.identifier().unwrap_or_default(),
            responsible = %routing.responsible,
            receivers = routing.routes.len(),
            "routing resolved"
        );
        Ok(notification.set_routing(routing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use serde_json::json;

    fn decision(responsible: &str) -> RoutingDecision {
        RoutingDecision {
            report_type: Some(ReportType::Disease),
            notification_category: NotificationCategory::P61,
            bundle_actions: vec![Action::NoAction],
            routes: vec![RouteDecision {
                authority_type: AuthorityType::HealthOffice,
                specific_receiver_id: responsible.into(),
                actions: vec![Action::Encrypt],
                optional: false,
            }],
            health_offices: BTreeMap::from([
                (AddressOrigin::NotifiedPersonPrimary, "1.01.0.53.".to_string()),
                (AddressOrigin::Notifier, "1.02.0.11.".to_string()),
                (AddressOrigin::NotifiedPersonOther, "1.03.0.99.".to_string()),
            ]),
            responsible: Some(responsible.into()),
            allowed_roles: None,
            custodian: None,
        }
    }

    fn resolver(forward: bool) -> RoutingResolver {
        RoutingResolver::new(test_support::config(forward))
    }

    fn responsible_tags(n: &Notification) -> Vec<String> {
        n.bundle()
            .meta
            .tags(RESPONSIBLE_DEPARTMENT_SYSTEM)
            .filter_map(|c| c.code.clone())
            .collect()
    }

    #[test]
    fn blank_responsible_and_no_routes_fail_without_mutation() {
        let mut n = test_support::disease_notification(None);
        let before = n.bundle().clone();

        let blank = RoutingDecision {
            responsible: Some(String::new()),
            ..RoutingDecision::default()
        };
        let err = resolver(false).resolve(&mut n, blank).expect_err("blank");
        assert!(matches!(err, ProcessingError::MissingResponsible));
        assert_eq!(n.bundle(), &before);
        assert!(n.routing().is_none());
    }

    #[test]
    fn responsible_without_routes_fails() {
        let mut n = test_support::disease_notification(None);
        let before = n.bundle().clone();
        let mut d = decision("1.01.0.53.");
        d.routes.clear();
        let err = resolver(false).resolve(&mut n, d).expect_err("no routes");
        assert!(matches!(err, ProcessingError::MissingResponsible));
        assert_eq!(n.bundle(), &before);

        let mut whitespace = decision("1.01.0.53.");
        whitespace.responsible = Some("   ".into());
        assert!(matches!(
            resolver(false).resolve(&mut n, whitespace),
            Err(ProcessingError::MissingResponsible)
        ));
        assert_eq!(n.bundle(), &before);
    }

    #[test]
    fn records_responsible_and_origin_tags() {
        let mut n = test_support::disease_notification(None);
        let routing = resolver(false)
            .resolve(&mut n, decision("1.01.0.53."))
            .expect("resolve")
            .clone();
        assert_eq!(routing.responsible(), "1.01.0.53.");
        assert_eq!(routing.category(), NotificationCategory::P61);
        assert_eq!(
            routing.actions_for("1.01.0.53."),
            Some(&[Action::Encrypt][..])
        );

        let meta = &n.bundle().meta;
        assert_eq!(responsible_tags(&n), vec!["1.01.0.53."]);
        assert_eq!(meta.tags(RESPONSIBLE_FOR_PRIMARY_ADDRESS_SYSTEM).count(), 1);
        assert_eq!(meta.tags(RESPONSIBLE_FOR_NOTIFIER_ADDRESS_SYSTEM).count(), 1);
        assert!(!meta
            .tag
            .iter()
            .any(|t| t.code.as_deref() == Some("1.03.0.99.")));
        assert!(n.routing().is_some());
    }

    #[test]
    fn resolving_twice_replaces_the_responsible_tag() {
        let mut n = test_support::disease_notification(None);
        let resolver = resolver(false);
        resolver
            .resolve(&mut n, decision("1.01.0.53."))
            .expect("first");
        resolver
            .resolve(&mut n, decision("1.11.0.11."))
            .expect("second");

        assert_eq!(responsible_tags(&n), vec!["1.11.0.11."]);
        assert_eq!(
            n.bundle()
                .meta
                .tags(RESPONSIBLE_FOR_PRIMARY_ADDRESS_SYSTEM)
                .count(),
            1
        );
    }

    #[test]
    fn test_users_redirect_only_the_responsible_destination() {
        let mut n = test_support::disease_notification(Some("test-int"));
        let routing = resolver(false)
            .resolve(&mut n, decision("1.01.0.53."))
            .expect("resolve")
            .clone();

        assert_eq!(routing.responsible(), test_support::FALLBACK_DESTINATION);
        assert_eq!(responsible_tags(&n), vec![test_support::FALLBACK_DESTINATION]);
        // Per-origin destinations and receivers keep the decided values.
        assert_eq!(
            routing
                .health_offices()
                .get(&AddressOrigin::NotifiedPersonPrimary)
                .map(String::as_str),
            Some("1.01.0.53.")
        );
        assert_eq!(routing.routes()[0].id, "1.01.0.53.");
    }

    #[test]
    fn forwarding_test_users_become_the_destination() {
        let mut n = test_support::disease_notification(Some("test-int"));
        let routing = resolver(true)
            .resolve(&mut n, decision("1.01.0.53."))
            .expect("resolve");
        assert_eq!(routing.responsible(), "test-int");
    }

    #[test]
    fn actions_keep_decision_order_without_duplicates() {
        let mut d = decision("1.01.0.53.");
        d.bundle_actions = vec![Action::NoAction, Action::Encrypt, Action::NoAction];
        d.routes[0].actions = vec![
            Action::Anonymize,
            Action::NotByName,
            Action::Anonymize,
            Action::Encrypt,
        ];

        let routing = RoutingData::validate(d, ReportType::Disease).expect("validate");
        assert_eq!(routing.bundle_actions(), &[Action::NoAction, Action::Encrypt][..]);
        assert_eq!(
            routing.actions_for("1.01.0.53."),
            Some(&[Action::Anonymize, Action::NotByName, Action::Encrypt][..])
        );
    }

    #[test]
    fn parses_the_wire_format() {
        let text = json!({
            "type": "LABORATORY",
            "notificationCategory": "P7_1",
            "bundleActions": ["NO_ACTION"],
            "routes": [{
                "type": "HEALTH_OFFICE",
                "specificReceiverId": "1.01.0.53.",
                "actions": ["ENCRYPT", "NOT_BY_NAME"],
                "optional": true
            }],
            "healthOffices": {"NOTIFIED_PERSON_CURRENT": "1.01.0.53."},
            "responsible": "1.01.0.53.",
            "allowedRoles": ["vendor-role"],
            "custodian": "1.01.0.53."
        })
        .to_string();

        let decision = RoutingDecision::parse(&text).expect("parse decision");
        let routing =
            RoutingData::validate(decision, ReportType::Laboratory).expect("validate decision");
        assert_eq!(routing.category(), NotificationCategory::P71);
        assert!(routing.routes()[0].optional);
        assert!(routing.routes()[0].requires(Action::NotByName));
        assert_eq!(routing.custodian(), Some("1.01.0.53."));
        assert!(routing
            .allowed_roles()
            .is_some_and(|roles| roles.contains("vendor-role")));

        let err = RoutingDecision::parse(r#"{"routes": [{"type": "MOON_BASE"}]}"#)
            .expect_err("unknown authority");
        match err {
            ProcessingError::RoutingService(CollaboratorError::InvalidResponse { reason, .. }) => {
                assert!(reason.contains("routes"), "unexpected reason: {reason}");
            }
            other => panic!("expected RoutingService error, got {other:?}"),
        }
    }
}
