//! Identifier generation for derived documents.

use uuid::Uuid;

/// Source of fresh document ids and identifier values.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random (v4) UUIDs in canonical hyphenated form.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}
