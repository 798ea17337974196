use crate::collaborators::CollaboratorError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
    /// A document we built could not be serialised.
    #[error("failed to serialise document: {0}")]
    Serialization(#[source] fhir::FhirError),

    #[error("routing decision has no responsible destination or no routes")]
    MissingResponsible,
    #[error("routing decision service failed: {0}")]
    RoutingService(#[source] CollaboratorError),
    #[error("document storage failed: {0}")]
    Storage(#[source] CollaboratorError),
}

pub type ProcessingResult<T> = std::result::Result<T, ProcessingError>;

/// Machine-readable error kind reported to the sender in the outcome's detail coding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    NoResponsibleDestination,
    InvalidNotification,
    RoutingServiceFailure,
    StorageFailure,
    Configuration,
    /// The request could not be completed for a reason outside the pipeline.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoResponsibleDestination => "NO_RESPONSIBLE_DESTINATION",
            ErrorCode::InvalidNotification => "INVALID_NOTIFICATION",
            ErrorCode::RoutingServiceFailure => "ROUTING_SERVICE_FAILURE",
            ErrorCode::StorageFailure => "STORAGE_FAILURE",
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessingError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProcessingError::MissingResponsible => ErrorCode::NoResponsibleDestination,
            ProcessingError::InvalidInput(_)
            | ProcessingError::InvalidDocument(_)
            | ProcessingError::Fhir(_) => ErrorCode::InvalidNotification,
            ProcessingError::RoutingService(_) => ErrorCode::RoutingServiceFailure,
            ProcessingError::Storage(_) => ErrorCode::StorageFailure,
            ProcessingError::Serialization(_) => ErrorCode::Internal,
            ProcessingError::InvalidConfig(_) | ProcessingError::ConfigRead(_) => {
                ErrorCode::Configuration
            }
        }
    }

    /// HTTP status the front door reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProcessingError::InvalidInput(_) | ProcessingError::Fhir(_) => 400,
            ProcessingError::MissingResponsible | ProcessingError::InvalidDocument(_) => 422,
            ProcessingError::RoutingService(_) | ProcessingError::Storage(_) => 502,
            ProcessingError::InvalidConfig(_)
            | ProcessingError::ConfigRead(_)
            | ProcessingError::Serialization(_) => 500,
        }
    }
}
