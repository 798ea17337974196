use super::patient::anonymous_patient;
use super::{apply_test_user_tag, assign_fresh_identity};
use crate::constants::{
    DISEASE_EXCERPT_PROFILE, LABORATORY_EXCERPT_PROFILE, TRANSMISSION_CATEGORY_SYSTEM,
};
use crate::ids::IdGenerator;
use crate::notification::{Notification, ReportType};
use crate::{ProcessingError, ProcessingResult};
use fhir::{Bundle, Coding, Entry, Meta, OtherResource, Resource};
use serde_json::{Map, Value};

/// What an excerpt of one report type keeps.
struct ExcerptPlan {
    profile: &'static str,
    /// Record types copied besides the Composition and the notified person.
    kept: &'static [&'static str],
    /// Fields removed from copied records because they point at people or organisations.
    stripped: &'static [&'static str],
}

impl ExcerptPlan {
    fn for_report(report_type: ReportType) -> Self {
        match report_type {
            ReportType::Laboratory => ExcerptPlan {
                profile: LABORATORY_EXCERPT_PROFILE,
                kept: &["DiagnosticReport", "Observation", "Specimen"],
                stripped: &["performer", "resultsInterpreter"],
            },
            ReportType::Disease => ExcerptPlan {
                profile: DISEASE_EXCERPT_PROFILE,
                kept: &["Condition", "Encounter", "Immunization", "QuestionnaireResponse"],
                stripped: &["recorder", "asserter", "performer", "author", "source"],
            },
        }
    }

    fn keeps(&self, resource_type: &str) -> bool {
        self.kept.contains(&resource_type)
    }

    fn strip(&self, other: &OtherResource) -> OtherResource {
        let mut other = other.clone();
        for field in self.stripped {
            other.body.remove(*field);
        }
        if let Some(Value::Object(collection)) = other.body.get_mut("collection") {
            collection.remove("collector");
        }
        other
    }
}

/// Reduced copy of the notification with the notified person fully anonymized.
///
/// Works from identified and from not-by-name notifications alike. Notifier, submitter and
/// every other record outside the report type's plan are dropped, as is the Composition
/// author.
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidDocument`] if the bundle has no Composition or no
/// notified person.
pub fn anonymous_excerpt(
    notification: &Notification,
    ids: &dyn IdGenerator,
) -> ProcessingResult<Bundle> {
    let source = notification.bundle();
    let plan = ExcerptPlan::for_report(notification.report_type());

    let subject_slot = source.subject_slot().ok_or_else(|| {
        ProcessingError::InvalidDocument("notification has no notified person".into())
    })?;
    if source.composition_slot().is_none() {
        return Err(ProcessingError::InvalidDocument(
            "notification has no Composition".into(),
        ));
    }

    let mut excerpt = Bundle::new(source.bundle_type.as_deref().unwrap_or("document"));
    excerpt.timestamp = source.timestamp.clone();
    excerpt.meta = Meta::with_profile(plan.profile);

    for (slot, entry) in source.entries().iter().enumerate() {
        let resource = match &entry.resource {
            Resource::Patient(patient) if slot == subject_slot => {
                Resource::Patient(anonymous_patient(patient))
            }
            Resource::Patient(_) => continue,
            Resource::Composition(composition) => {
                let mut composition = composition.clone();
                composition.extra.remove("author");
                Resource::Composition(composition)
            }
            Resource::Other(other) if plan.keeps(&other.resource_type) => {
                Resource::Other(plan.strip(other))
            }
            Resource::Other(_) => continue,
        };
        excerpt.push(Entry::new(entry.full_url.clone(), resource));
    }

    drop_dangling_references(&mut excerpt)?;
    assign_fresh_identity(&mut excerpt, notification.identifier(), ids);

    if let Some(category) = notification.transmission_category() {
        excerpt
            .meta
            .set_tag(Coding::new(TRANSMISSION_CATEGORY_SYSTEM, category));
    }
    if notification.is_test_user() {
        apply_test_user_tag(&mut excerpt.meta);
    }

    tracing::debug!(
        source = notification.identifier().unwrap_or_default(),
        excerpt = excerpt.identifier_value().unwrap_or_default(),
        report_type = %notification.report_type(),
        records = excerpt.len(),
        "created anonymous excerpt"
    );
    Ok(excerpt)
}

/// Removes every reference to a record that did not make it into the excerpt.
///
/// Walks the Composition and every copied record. A dangling reference is removed together
/// with the object holding it; arrays and objects left empty by the removal go too.
/// Local (`#...`) references are left alone.
fn drop_dangling_references(bundle: &mut Bundle) -> ProcessingResult<()> {
    let mut replaced = Vec::new();
    for (slot, entry) in bundle.entries().iter().enumerate() {
        let resolves = |reference: &str| bundle.resolve(reference).is_some();
        let resource = match &entry.resource {
            Resource::Composition(composition) => {
                let mut composition = composition.clone();
                if !prune_map(&mut composition.extra, &resolves) {
                    continue;
                }
                Resource::Composition(composition)
            }
            Resource::Other(other) => {
                let mut other = other.clone();
                if !prune_map(&mut other.body, &resolves) {
                    continue;
                }
                Resource::Other(other)
            }
            Resource::Patient(_) => continue,
        };
        replaced.push((slot, resource));
    }

    for (slot, resource) in replaced {
        bundle.replace_resource(slot, resource)?;
    }
    Ok(())
}

fn is_dangling(value: &Value, resolves: &dyn Fn(&str) -> bool) -> bool {
    value
        .get("reference")
        .and_then(Value::as_str)
        .is_some_and(|reference| !reference.starts_with('#') && !resolves(reference))
}

fn emptied(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Returns `true` if anything was removed.
fn prune_map(map: &mut Map<String, Value>, resolves: &dyn Fn(&str) -> bool) -> bool {
    let mut pruned = false;
    map.retain(|_, child| {
        if is_dangling(child, resolves) {
            pruned = true;
            return false;
        }
        if prune_value(child, resolves) {
            pruned = true;
            return !emptied(child);
        }
        true
    });
    pruned
}

fn prune_value(value: &mut Value, resolves: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::Object(map) => prune_map(map, resolves),
        Value::Array(items) => {
            let mut pruned = false;
            items.retain_mut(|item| {
                if is_dangling(item, resolves) {
                    pruned = true;
                    return false;
                }
                if prune_value(item, resolves) {
                    pruned = true;
                    return !emptied(item);
                }
                true
            });
            pruned
        }
        _ => false,
    }
}
