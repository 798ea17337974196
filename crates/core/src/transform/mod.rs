//! De-identification transforms.
//!
//! Every transform works on a deep copy of the notification's bundle; the source is never
//! mutated.
//!
//! - [`not_by_name_variant`]: the full document with the notified person de-identified
//! - [`anonymous_excerpt`]: a reduced document with the notified person fully anonymized
//! - [`patient`]: the person-level rules both variants share

mod excerpt;
mod not_by_name;
pub mod patient;

pub use excerpt::anonymous_excerpt;
pub use not_by_name::not_by_name_variant;

use crate::constants::{
    NOTIFICATION_BUNDLE_ID_SYSTEM, RELATED_NOTIFICATION_SYSTEM, TEST_USER_CODE, TEST_USER_SYSTEM,
};
use crate::ids::IdGenerator;
use fhir::{Bundle, Coding, Identifier, Meta};

/// Marks a document as a test-user submission.
pub fn apply_test_user_tag(meta: &mut Meta) {
    meta.add_tag(Coding::new(TEST_USER_SYSTEM, TEST_USER_CODE));
}

/// Tag linking a derived document to the notification it was produced from.
pub fn related_notification_tag(source_identifier: &str) -> Coding {
    Coding::new(RELATED_NOTIFICATION_SYSTEM, source_identifier)
        .with_display(format!("Relates to message with identifier: {source_identifier}"))
}

/// Gives `bundle` a fresh id and identifier and links it to `source_identifier`.
fn assign_fresh_identity(
    bundle: &mut Bundle,
    source_identifier: Option<&str>,
    ids: &dyn IdGenerator,
) {
    let id = ids.next_id();
    bundle.identifier = Some(Identifier::new(NOTIFICATION_BUNDLE_ID_SYSTEM, id.as_str()));
    bundle.id = Some(id);

    match source_identifier {
        Some(source) => {
            bundle.meta.add_tag(related_notification_tag(source));
        }
        None => tracing::warn!("source notification has no identifier; derived document is unlinked"),
    }
}
