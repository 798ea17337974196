//! Notification processing pipeline.
//!
//! One call to [`NotificationProcessor::process`] handles one notification:
//!
//! 1. context enrichment (best effort)
//! 2. transmission-category lookup (best effort)
//! 3. routing decision (external) and resolution
//! 4. one document per receiver, shaped by the receiver's actions
//! 5. storage: mandatory receivers in one transaction, optional receivers one each
//! 6. success response for the sender
//!
//! Only a missing responsible destination, an invalid document, a routing-service failure or
//! a failed mandatory storage transaction fail the request.

use crate::code_mapping::CodeMapper;
use crate::collaborators::{
    ContextEnrichmentService, Delivery, DocumentStorageWriter, RoutingDecisionService,
    StorageTransaction,
};
use crate::config::ProcessingConfig;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::notification::Notification;
use crate::outcome::OutcomeAssembler;
use crate::routing::{Action, Receiver, RoutingResolver};
use crate::transform::{anonymous_excerpt, apply_test_user_tag, not_by_name_variant};
use crate::{ProcessingError, ProcessingResult};
use fhir::{Bundle, Issue, IssueType, OperationOutcome, Parameters, Severity};
use std::sync::Arc;

/// External services the processor calls.
#[derive(Clone)]
pub struct Collaborators {
    pub routing: Arc<dyn RoutingDecisionService>,
    pub storage: Arc<dyn DocumentStorageWriter>,
    pub enrichment: Option<Arc<dyn ContextEnrichmentService>>,
}

pub struct NotificationProcessor {
    config: Arc<ProcessingConfig>,
    code_mapper: CodeMapper,
    resolver: RoutingResolver,
    assembler: OutcomeAssembler,
    collaborators: Collaborators,
    ids: Arc<dyn IdGenerator>,
}

impl NotificationProcessor {
    pub fn new(
        config: Arc<ProcessingConfig>,
        code_mapper: CodeMapper,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            resolver: RoutingResolver::new(Arc::clone(&config)),
            assembler: OutcomeAssembler::new(config.outcome_threshold()),
            config,
            code_mapper,
            collaborators,
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn code_mapper(&self) -> &CodeMapper {
        &self.code_mapper
    }

    pub fn assembler(&self) -> &OutcomeAssembler {
        &self.assembler
    }

    /// Wrap a parsed bundle into a notification using the configured test users.
    pub fn notification(
        &self,
        bundle: Bundle,
        sender: Option<&str>,
    ) -> ProcessingResult<Notification> {
        Notification::from_bundle(bundle, sender, self.config.test_users())
    }

    /// Error outcome for a failed run, addressed to `correlation_id`.
    pub fn error_outcome(
        &self,
        error: &ProcessingError,
        correlation_id: Option<&str>,
    ) -> OperationOutcome {
        self.assembler.error_outcome(error, correlation_id)
    }

    /// Process one notification end to end.
    pub fn process(
        &self,
        mut notification: Notification,
        credential: Option<&str>,
    ) -> ProcessingResult<Parameters> {
        let mut outcome = OperationOutcome::new();

        self.enrich(&mut notification, credential);
        self.map_transmission_category(&mut notification);

        let encoded = notification
            .bundle()
            .render()
            .map_err(ProcessingError::Serialization)?;
        let decision = self
            .collaborators
            .routing
            .decide(&encoded, notification.is_test_user(), notification.sender())
            .map_err(ProcessingError::RoutingService)?;
        let routing = self.resolver.resolve(&mut notification, decision)?.clone();

        if notification.is_test_user() {
            apply_test_user_tag(&mut notification.bundle_mut().meta);
        }

        let mut variants = Variants::default();
        let mut mandatory = StorageTransaction::new(notification.identifier().map(str::to_string));
        let mut optional = Vec::new();
        for receiver in routing.routes() {
            let delivery = Delivery {
                receiver: receiver.id.to_string(),
                actions: receiver.actions.clone(),
                encrypt: receiver.requires(Action::Encrypt),
                bundle: variants.for_receiver(receiver, &notification, self.ids.as_ref())?,
            };
            if receiver.optional {
                optional.push(delivery);
            } else {
                mandatory.push(delivery);
            }
        }

        if !mandatory.is_empty() {
            self.collaborators
                .storage
                .store(&mandatory)
                .map_err(ProcessingError::Storage)?;
        }
        for delivery in optional {
            let receiver = delivery.receiver.clone();
            let mut transaction = StorageTransaction::new(mandatory.notification_id.clone());
            transaction.push(delivery);
            if let Err(err) = self.collaborators.storage.store(&transaction) {
                tracing::warn!(
                    receiver = %receiver,
                    error = %err,
                    "delivery to optional receiver failed"
                );
                outcome.push(
                    Issue::new(Severity::Warning, IssueType::Incomplete)
                        .with_diagnostics(format!("delivery to {receiver} failed: {err}")),
                );
            }
        }

        tracing::info!(
            notification = notification.identifier().unwrap_or_default(),
            report_type = %notification.report_type(),
            responsible = %routing.responsible(),
            receivers = routing.routes().len(),
            test_user = notification.is_test_user(),
            "notification processed"
        );
        Ok(self
            .assembler
            .build_success(notification.into_bundle(), outcome))
    }

    fn enrich(&self, notification: &mut Notification, credential: Option<&str>) {
        let Some(service) = &self.collaborators.enrichment else {
            return;
        };
        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            tracing::debug!("no credential supplied; skipping context enrichment");
            return;
        };
        let Some(composition_id) = notification.composition_id().map(str::to_string) else {
            tracing::debug!("composition has no id; skipping context enrichment");
            return;
        };

        match service.enrich(credential, &composition_id) {
            Ok(resource) => notification.append_resource(resource),
            Err(err) => tracing::warn!(
                composition = %composition_id,
                error = %err,
                "context enrichment failed; continuing without it"
            ),
        }
    }

    fn map_transmission_category(&self, notification: &mut Notification) {
        let Some(code) = notification.primary_code() else {
            tracing::debug!("notification has no primary code; skipping code mapping");
            return;
        };
        let category = self.code_mapper.map_for(notification.report_type(), code);
        if category.is_none() {
            tracing::info!(
                code,
                report_type = %notification.report_type(),
                "no transmission category for code"
            );
        }
        notification.set_transmission_category(category);
    }
}

/// Derived documents, built at most once per request.
#[derive(Default)]
struct Variants {
    not_by_name: Option<Bundle>,
    excerpt: Option<Bundle>,
}

impl Variants {
    fn for_receiver(
        &mut self,
        receiver: &Receiver,
        notification: &Notification,
        ids: &dyn IdGenerator,
    ) -> ProcessingResult<Bundle> {
        if receiver.requires(Action::Anonymize) {
            if self.excerpt.is_none() {
                self.excerpt = Some(anonymous_excerpt(notification, ids)?);
            }
            return self.excerpt.clone().ok_or_else(|| {
                ProcessingError::InvalidDocument("anonymous excerpt unavailable".into())
            });
        }
        if receiver.requires(Action::NotByName) {
            if self.not_by_name.is_none() {
                self.not_by_name = Some(not_by_name_variant(notification, ids)?);
            }
            return self.not_by_name.clone().ok_or_else(|| {
                ProcessingError::InvalidDocument("not-by-name variant unavailable".into())
            });
        }
        Ok(notification.bundle().clone())
    }
}
