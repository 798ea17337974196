//! # NPS Core
//!
//! Routing and de-identification pipeline for public-health notifications.
//!
//! This crate contains the business rules and performs no I/O of its own:
//! - responsible-destination resolution, including test-user redirection
//! - periodically refreshed code-translation caches
//! - not-by-name and anonymous-excerpt document transforms
//! - outcome assembly (severity filtering and ordering)
//!
//! **No transport concerns**: HTTP servers and the clients for the external services belong in
//! `api-rest`. The services are reached through the traits in [`collaborators`].

pub mod cache;
pub mod code_mapping;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod notification;
pub mod outcome;
pub mod processor;
pub mod routing;
pub mod test_user;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use cache::{Reloadable, ReloadableCache};
pub use code_mapping::CodeMapper;
pub use collaborators::{CollaboratorError, CollaboratorResult};
pub use config::{CodeMappingConfig, CodeMappingProvider, ProcessingConfig};
pub use error::{ErrorCode, ProcessingError, ProcessingResult};
pub use ids::{IdGenerator, UuidGenerator};
pub use notification::{Notification, ReportType};
pub use outcome::OutcomeAssembler;
pub use processor::{Collaborators, NotificationProcessor};
pub use routing::{RoutingData, RoutingDecision, RoutingResolver};
pub use test_user::TestUserConfiguration;
