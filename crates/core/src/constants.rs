//! Constants used throughout the notification processing core.
//!
//! Code systems, profiles and extension URLs that the pipeline reads from or writes into
//! notification documents, plus configuration defaults.

// ----------------------------------------------------------------------------
// Identifiers and tags
// ----------------------------------------------------------------------------

/// Naming system of `Bundle.identifier` for notification documents.
pub const NOTIFICATION_BUNDLE_ID_SYSTEM: &str =
    "https://demis.rki.de/fhir/NamingSystem/NotificationBundleId";

/// Tag system holding the single responsible department of a notification.
pub const RESPONSIBLE_DEPARTMENT_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartment";

/// Tag system linking a derived document to the notification it was produced from.
pub const RELATED_NOTIFICATION_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/RelatedNotificationBundle";

/// Tag system marking documents submitted by a test user.
pub const TEST_USER_SYSTEM: &str = "https://demis.rki.de/fhir/CodeSystem/TestUser";

/// Code used for the test-user tag.
pub const TEST_USER_CODE: &str = "testuser";

/// Tag system holding the transmission category of an anonymous excerpt.
pub const TRANSMISSION_CATEGORY_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/TransmissionCategory";

/// Tag systems for the per-address-origin responsible departments.
pub const RESPONSIBLE_FOR_PRIMARY_ADDRESS_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartmentPrimaryAddress";
pub const RESPONSIBLE_FOR_CURRENT_ADDRESS_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartmentCurrentAddress";
pub const RESPONSIBLE_FOR_ORDINARY_ADDRESS_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartmentOrdinaryAddress";
pub const RESPONSIBLE_FOR_NOTIFIER_ADDRESS_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartmentNotifierAddress";
pub const RESPONSIBLE_FOR_SUBMITTER_ADDRESS_SYSTEM: &str =
    "https://demis.rki.de/fhir/CodeSystem/ResponsibleDepartmentSubmitterAddress";

/// Code system for the detail code of error issues.
pub const ERROR_CODE_SYSTEM: &str = "https://demis.rki.de/fhir/CodeSystem/ProcessingErrorCode";

// ----------------------------------------------------------------------------
// Profiles
// ----------------------------------------------------------------------------

pub const LABORATORY_BUNDLE_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotificationBundleLaboratory";
pub const DISEASE_BUNDLE_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotificationBundleDisease";

pub const LABORATORY_EXCERPT_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotificationBundleLaboratoryAnonymous";
pub const DISEASE_EXCERPT_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotificationBundleDiseaseAnonymous";

/// Structural marker of a de-identified (not-by-name) notified person.
pub const NOT_BY_NAME_PERSON_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotifiedPersonNotByName";

/// Structural marker of a fully anonymized notified person.
pub const ANONYMOUS_PERSON_PROFILE: &str =
    "https://demis.rki.de/fhir/StructureDefinition/NotifiedPersonAnonymous";

// ----------------------------------------------------------------------------
// Extensions
// ----------------------------------------------------------------------------

pub const ADDRESS_USE_EXTENSION: &str = "https://demis.rki.de/fhir/StructureDefinition/AddressUse";

pub const PSEUDONYM_EXTENSION: &str =
    "https://demis.rki.de/fhir/StructureDefinition/PseudonymRecord";

// ----------------------------------------------------------------------------
// Fixed values
// ----------------------------------------------------------------------------

/// Appended to the composition title of a not-by-name variant.
pub const NOT_BY_NAME_TITLE_SUFFIX: &str = " (not by name)";

/// Number of leading postal-code characters kept by de-identification.
pub const POSTAL_CODE_PREFIX_LEN: usize = 3;

/// Diagnostics text of the synthetic success issue.
pub const ALL_OK_DIAGNOSTICS: &str = "All OK";

/// Parameter name of the document slot in a success response.
pub const RESPONSE_BUNDLE_PARAMETER: &str = "bundle";

/// Parameter name of the outcome slot in a success response.
pub const RESPONSE_OUTCOME_PARAMETER: &str = "operationOutcome";

// ----------------------------------------------------------------------------
// Configuration defaults
// ----------------------------------------------------------------------------

pub const DEFAULT_CACHE_RELOAD_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_DISEASE_CONCEPT_MAP: &str = "NotificationDiseaseCategoryToTransmissionCategory";

pub const DEFAULT_LABORATORY_CONCEPT_MAP: &str = "NotificationCategoryToTransmissionCategory";
