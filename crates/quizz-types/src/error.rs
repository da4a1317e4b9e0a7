// Error hierarchy: one error type for the whole library.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discriminator covering request validation, generation, scoring and transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Consumer-facing lifecycle errors
    InvalidRequest,
    GenerationFailure,
    IncompleteAnswers,
    MalformedSnapshotField,
    InvalidSelection,
    NotReady,

    // Generation capability errors (from HTTP responses)
    Authentication,
    AccessDenied,
    NotFound,
    ProviderInvalidRequest,
    RateLimit,
    Server,
    ContentFilter,
    QuotaExceeded,

    // Transport errors
    RequestTimeout,
    Network,
    Stream,
    Configuration,
}

impl ErrorKind {
    /// Returns `true` if the error originated in the generation capability
    /// (HTTP status or message classification) rather than in this crate.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::AccessDenied
                | Self::NotFound
                | Self::ProviderInvalidRequest
                | Self::RateLimit
                | Self::Server
                | Self::ContentFilter
                | Self::QuotaExceeded
        )
    }
}

/// The single error type for the entire library.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,

    /// Request field that failed boundary validation (`InvalidRequest`).
    pub field: Option<&'static str>,
    /// Unanswered question indices, ascending (`IncompleteAnswers`).
    pub missing: Vec<usize>,

    // Provider error fields
    pub provider: Option<String>,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub retry_after: Option<Duration>,
    pub raw: Option<serde_json::Value>,
}

impl Error {
    fn bare(kind: ErrorKind, message: String, retryable: bool) -> Self {
        Self {
            kind,
            message,
            retryable,
            source: None,
            field: None,
            missing: Vec::new(),
            provider: None,
            status_code: None,
            error_code: None,
            retry_after: None,
            raw: None,
        }
    }

    /// Construct from HTTP status code (for generation capability adapters).
    pub fn from_http_status(
        status: u16,
        message: String,
        provider: &str,
        raw: Option<serde_json::Value>,
        retry_after: Option<Duration>,
    ) -> Self {
        let by_status = match status {
            400 | 422 => ErrorKind::ProviderInvalidRequest,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::AccessDenied,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::RequestTimeout,
            429 => ErrorKind::RateLimit,
            _ => ErrorKind::Server,
        };
        // The message can be more specific than the status (a 400 that is
        // really a quota problem, say).
        let kind = Self::classify_by_message(&message, by_status);
        let retryable = matches!(
            kind,
            ErrorKind::RateLimit | ErrorKind::Server | ErrorKind::RequestTimeout
        );

        Self {
            provider: Some(provider.to_string()),
            status_code: Some(status),
            retry_after,
            raw,
            ..Self::bare(kind, message, retryable)
        }
    }

    /// Boundary validation failure on a request field.
    pub fn invalid_request(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            ..Self::bare(ErrorKind::InvalidRequest, message.into(), false)
        }
    }

    /// The stream ended without a document passing strict validation.
    pub fn generation_failure(reason: impl Into<String>) -> Self {
        Self::bare(
            ErrorKind::GenerationFailure,
            format!("No usable quiz was generated: {}", reason.into()),
            false,
        )
    }

    /// Scoring attempted before every question has a selection.
    pub fn incomplete_answers(mut missing: Vec<usize>) -> Self {
        missing.sort_unstable();
        let listed = missing
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            missing,
            ..Self::bare(
                ErrorKind::IncompleteAnswers,
                format!("Please answer all questions (unanswered: {listed})"),
                false,
            )
        }
    }

    /// A snapshot field whose value has the wrong type.
    pub fn malformed_field(path: &str, expected: &str, found: &str) -> Self {
        Self::bare(
            ErrorKind::MalformedSnapshotField,
            format!("{path}: expected {expected}, found {found}"),
            false,
        )
    }

    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::InvalidSelection, message.into(), false)
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::NotReady, message.into(), false)
    }

    /// Convenience: configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::Configuration, message.into(), false)
    }

    /// Convenience: network error with source.
    pub fn network(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::bare(ErrorKind::Network, message.into(), true)
        }
    }

    /// Convenience: stream error with source.
    pub fn stream(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::bare(ErrorKind::Stream, message.into(), true)
        }
    }

    /// Stream ended or broke without an underlying source error.
    pub fn stream_interrupted(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::Stream, message.into(), true)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::RequestTimeout, message.into(), true)
    }

    /// Rebuild an owned error from one carried on a stream event.
    pub fn from_stream_error(error: &crate::stream::StreamError) -> Self {
        Self {
            provider: error.provider.clone(),
            status_code: error.status_code,
            ..Self::bare(error.kind, error.message.clone(), error.retryable)
        }
    }

    fn classify_by_message(message: &str, default: ErrorKind) -> ErrorKind {
        let lower = message.to_lowercase();
        MESSAGE_HINTS
            .iter()
            .find(|(_, hints)| hints.iter().any(|hint| lower.contains(hint)))
            .map_or(default, |(kind, _)| *kind)
    }
}

/// Message fragments that identify an error kind regardless of HTTP status.
const MESSAGE_HINTS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::NotFound, &["not found", "does not exist"]),
    (
        ErrorKind::Authentication,
        &["unauthorized", "invalid key", "incorrect api key"],
    ),
    (ErrorKind::ContentFilter, &["content filter", "safety", "blocked"]),
    (
        ErrorKind::QuotaExceeded,
        &["quota", "billing", "insufficient funds"],
    ),
];

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field {
            Some(field) => write!(f, "{:?} ({field}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
