use serde::{Deserialize, Serialize};

/// Event types a generation capability emits while producing text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamEventType {
    StreamStart,
    TextStart,
    TextDelta,
    TextEnd,
    Finish,
    Error,
    /// Catch-all for unrecognized event types (forward compatibility).
    Unknown(String),
}

impl Serialize for StreamEventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            Self::StreamStart => "STREAM_START",
            Self::TextStart => "TEXT_START",
            Self::TextDelta => "TEXT_DELTA",
            Self::TextEnd => "TEXT_END",
            Self::Finish => "FINISH",
            Self::Error => "ERROR",
            Self::Unknown(s) => s.as_str(),
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for StreamEventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "STREAM_START" => Self::StreamStart,
            "TEXT_START" => Self::TextStart,
            "TEXT_DELTA" => Self::TextDelta,
            "TEXT_END" => Self::TextEnd,
            "FINISH" => Self::Finish,
            "ERROR" => Self::Error,
            _ => Self::Unknown(s),
        })
    }
}

/// Structured error carried on `StreamEventType::Error` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamError {
    pub kind: crate::error::ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl StreamError {
    /// Create from a message string with `Stream` kind (retryable).
    pub fn stream(message: impl Into<String>) -> Self {
        Self {
            kind: crate::error::ErrorKind::Stream,
            message: message.into(),
            retryable: true,
            provider: None,
            status_code: None,
        }
    }

    /// Create from a full `Error` reference, preserving provider context.
    pub fn from_error(error: &crate::error::Error) -> Self {
        Self {
            kind: error.kind,
            message: error.message.clone(),
            retryable: error.retryable,
            provider: error.provider.clone(),
            status_code: error.status_code,
        }
    }
}

/// A single event in a generation stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,

    /// Response ID from the capability, set on `StreamStart`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Incremental text content (`TextDelta`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,

    /// Why generation stopped (`Finish`), e.g. `"stop"` or `"length"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Structured error (`Error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Box<StreamError>>,
}

impl StreamEvent {
    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::TextDelta,
            delta: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Finish,
            finish_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

impl Default for StreamEvent {
    fn default() -> Self {
        Self {
            event_type: StreamEventType::StreamStart,
            id: None,
            delta: None,
            finish_reason: None,
            error: None,
        }
    }
}
