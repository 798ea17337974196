use super::patient::not_by_name_patient;
use super::{apply_test_user_tag, assign_fresh_identity};
use crate::constants::NOT_BY_NAME_TITLE_SUFFIX;
use crate::ids::IdGenerator;
use crate::notification::Notification;
use crate::{ProcessingError, ProcessingResult};
use fhir::{Bundle, Resource};

/// Full copy of the notification with the notified person de-identified.
///
/// The copy gets a fresh id and identifier, a tag linking it to the source identifier and the
/// not-by-name title suffix. The notified person is replaced in its own slot, so references to
/// it stay valid.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidDocument`] if the bundle has no notified person.
pub fn not_by_name_variant(
    notification: &Notification,
    ids: &dyn IdGenerator,
) -> ProcessingResult<Bundle> {
    let mut bundle = notification.bundle().clone();

    let slot = bundle.subject_slot().ok_or_else(|| {
        ProcessingError::InvalidDocument("notification has no notified person".into())
    })?;
    let patient = bundle
        .resource(slot)
        .and_then(Resource::as_patient)
        .map(not_by_name_patient)
        .ok_or_else(|| {
            ProcessingError::InvalidDocument("notified person is not a Patient".into())
        })?;
    bundle.replace_resource(slot, Resource::Patient(patient))?;

    assign_fresh_identity(&mut bundle, notification.identifier(), ids);

    if let Some(composition) = bundle.composition_mut() {
        if let Some(title) = composition.title.as_mut() {
            if !title.ends_with(NOT_BY_NAME_TITLE_SUFFIX) {
                title.push_str(NOT_BY_NAME_TITLE_SUFFIX);
            }
        }
    }

    if notification.is_test_user() {
        apply_test_user_tag(&mut bundle.meta);
    }

    tracing::debug!(
        source = notification.identifier().unwrap_or_default(),
        variant = bundle.identifier_value().unwrap_or_default(),
        "created not-by-name variant"
    );
    Ok(bundle)
}
