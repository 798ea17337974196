//! Test-user policy.
//!
//! Designated sandbox senders are used for monitoring. Their notifications are redirected away
//! from real health offices: either back to the sender itself or to a fixed fallback
//! destination.

use nps_types::NonEmptyText;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestUserConfiguration {
    ids: HashSet<String>,
    fallback_destination: NonEmptyText,
    sender_is_destination: bool,
}

impl TestUserConfiguration {
    pub fn new(
        ids: HashSet<String>,
        fallback_destination: NonEmptyText,
        sender_is_destination: bool,
    ) -> Self {
        Self {
            ids,
            fallback_destination,
            sender_is_destination,
        }
    }

    /// True iff `sender` is present and a configured test user.
    pub fn is_test_user(&self, sender: Option<&str>) -> bool {
        sender.is_some_and(|s| self.ids.contains(s))
    }

    /// Destination a test-user notification is redirected to.
    ///
    /// Returns the sender itself when it is a test user and sender-is-destination is enabled;
    /// the fallback destination in every other case.
    pub fn resolve_destination<'a>(&'a self, sender: Option<&'a str>) -> &'a str {
        match sender {
            Some(sender) if self.sender_is_destination && self.ids.contains(sender) => sender,
            _ => self.fallback_destination.as_str(),
        }
    }

    pub fn fallback_destination(&self) -> &NonEmptyText {
        &self.fallback_destination
    }

    pub fn sender_is_destination(&self) -> bool {
        self.sender_is_destination
    }
}
