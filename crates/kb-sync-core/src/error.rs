//! Error types for the provisioning and sync workflow.
//!
//! - [`ApiError`] is what every cloud call returns on failure, classified by
//!   [`ErrorKind`] so callers can tell conflicts from transient failures.
//! - [`WorkflowError`] is what a workflow stage returns.
//! - [`SinkError`] covers metadata sink failures.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::IngestionStatus;

/// Classification of a failed cloud call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource already exists.
    Conflict,
    NotFound,
    Throttling,
    /// Server-side or network failure that may succeed on a later attempt.
    Transient,
    Validation,
    AccessDenied,
    Other,
}

impl ErrorKind {
    /// Only throttling and transient failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Throttling | ErrorKind::Transient)
    }

    /// Classify an error from its service error code and HTTP status.
    ///
    /// The code wins when it is recognised; otherwise the status decides.
    pub fn classify(code: Option<&str>, status: Option<u16>) -> Self {
        if let Some(code) = code {
            if let Some(kind) = Self::from_code(code) {
                return kind;
            }
        }
        match status {
            Some(409) => ErrorKind::Conflict,
            Some(404) => ErrorKind::NotFound,
            Some(429) => ErrorKind::Throttling,
            Some(401) | Some(403) => ErrorKind::AccessDenied,
            Some(400) | Some(422) => ErrorKind::Validation,
            Some(s) if s >= 500 => ErrorKind::Transient,
            _ => ErrorKind::Other,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "ConflictException" | "resource_already_exists_exception" => ErrorKind::Conflict,
            "ResourceNotFoundException" | "NotFoundException" | "index_not_found_exception" => {
                ErrorKind::NotFound
            }
            "ThrottlingException" | "Throttling" | "TooManyRequestsException"
            | "RequestLimitExceeded" => ErrorKind::Throttling,
            "InternalServerException" | "InternalFailure" | "ServiceUnavailable"
            | "ServiceUnavailableException" => ErrorKind::Transient,
            "ValidationException" | "SerializationException" | "InvalidParameterValue"
            | "ServiceQuotaExceededException" | "illegal_argument_exception"
            | "mapper_parsing_exception" => ErrorKind::Validation,
            "AccessDeniedException" | "AccessDenied" | "UnrecognizedClientException"
            | "InvalidSignatureException" | "ExpiredTokenException" | "InvalidClientTokenId"
            | "SignatureDoesNotMatch" | "security_exception" => ErrorKind::AccessDenied,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not found",
            ErrorKind::Throttling => "throttled",
            ErrorKind::Transient => "transient",
            ErrorKind::Validation => "validation",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// A failed call to a cloud service.
#[derive(Debug, Clone, Error)]
#[error("{service} {operation} failed ({kind}): {message}")]
pub struct ApiError {
    pub service: &'static str,
    pub operation: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(
        service: &'static str,
        operation: &'static str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation,
            kind,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors that can occur while recording run metadata.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a workflow stage.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Collection {name} not found")]
    CollectionNotFound { name: String },

    #[error("Knowledge base {name} not found")]
    KnowledgeBaseNotFound { name: String },

    #[error("Data source {name} not found in knowledge base {knowledge_base_id}")]
    DataSourceNotFound {
        name: String,
        knowledge_base_id: String,
    },

    #[error("Ingestion job {job_id} ended with status {status}: {}", .reasons.join("; "))]
    IngestionFailed {
        job_id: String,
        status: IngestionStatus,
        reasons: Vec<String>,
    },

    #[error("Ingestion job {job_id} still {status} after {waited:?}")]
    IngestionTimedOut {
        job_id: String,
        status: IngestionStatus,
        waited: Duration,
    },

    #[error("Failed to record run metadata: {0}")]
    Sink(#[from] SinkError),
}
