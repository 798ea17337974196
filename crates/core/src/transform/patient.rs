//! Person-level de-identification.
//!
//! The reduced person keeps: identifiers, gender, deceased status, month-granular birth date,
//! and addresses reduced to a postal-code prefix plus country. Names, telecoms and everything
//! else are dropped by not being copied.

use crate::constants::{
    ADDRESS_USE_EXTENSION, ANONYMOUS_PERSON_PROFILE, NOT_BY_NAME_PERSON_PROFILE,
    POSTAL_CODE_PREFIX_LEN, PSEUDONYM_EXTENSION,
};
use chrono::NaiveDate;
use fhir::{Address, Meta, Patient};

/// The not-by-name form of a notified person.
pub fn not_by_name_patient(source: &Patient) -> Patient {
    let mut patient = reduced_patient(source);
    patient.meta = Meta::with_profile(NOT_BY_NAME_PERSON_PROFILE);

    match source.extension(PSEUDONYM_EXTENSION) {
        Some(pseudonym) => patient.extension.push(pseudonym.clone()),
        None => tracing::warn!(
            patient = source.id.as_deref().unwrap_or_default(),
            "notified person has no pseudonym"
        ),
    }
    patient
}

/// The anonymous form of a notified person: not-by-name without identifiers or pseudonym.
pub fn anonymous_patient(source: &Patient) -> Patient {
    let mut patient = reduced_patient(source);
    patient.identifier.clear();
    patient.meta = Meta::with_profile(ANONYMOUS_PERSON_PROFILE);
    patient
}

fn reduced_patient(source: &Patient) -> Patient {
    Patient {
        id: source.id.clone(),
        identifier: source.identifier.clone(),
        gender: source.gender.clone(),
        deceased_boolean: source.deceased_boolean,
        deceased_date_time: source.deceased_date_time.clone(),
        birth_date: source.birth_date.as_deref().and_then(|date| {
            let truncated = truncate_birth_date(date);
            if truncated.is_none() {
                tracing::warn!(birth_date = date, "dropping unparsable birth date");
            }
            truncated
        }),
        address: source.address.iter().filter_map(reduce_address).collect(),
        ..Patient::default()
    }
}

/// Truncates a FHIR date to month granularity.
///
/// `YYYY-MM-DD` and `YYYY-MM` become `YYYY-MM-01`; `YYYY` is kept. Anything else is `None`.
pub fn truncate_birth_date(date: &str) -> Option<String> {
    let date = date.trim();
    match date.len() {
        4 if date.bytes().all(|b| b.is_ascii_digit()) => Some(date.to_string()),
        7 => NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-01").to_string()),
        10 => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-01").to_string()),
        _ => None,
    }
}

/// Postal-code prefix and country, or `None` if the address has no postal code.
fn reduce_address(address: &Address) -> Option<Address> {
    let postal_code = address
        .postal_code
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())?;

    Some(Address {
        extension: address
            .extension(ADDRESS_USE_EXTENSION)
            .cloned()
            .into_iter()
            .collect(),
        postal_code: Some(postal_code.chars().take(POSTAL_CODE_PREFIX_LEN).collect()),
        country: address.country.clone(),
        ..Address::default()
    })
}
