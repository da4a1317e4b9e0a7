use serde::{Deserialize, Serialize};

/// Adapter-level timeout configuration, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterTimeout {
    /// Connection timeout (default: 10.0).
    pub connect: f64,
    /// Whole-request timeout (default: 120.0).
    pub request: f64,
    /// Maximum wait for the next stream chunk (default: 30.0).
    pub stream_read: f64,
}

impl Default for AdapterTimeout {
    fn default() -> Self {
        Self {
            connect: 10.0,
            request: 120.0,
            stream_read: 30.0,
        }
    }
}

/// Optional strict checks applied when a streamed quiz is finalized.
///
/// Both default to off: structural completeness alone decides Ready vs Failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRules {
    /// Fail the quiz if any question does not have exactly one correct answer.
    #[serde(default)]
    pub require_single_correct: bool,
    /// Fail the quiz if it holds a different number of questions than requested.
    #[serde(default)]
    pub enforce_question_count: bool,
}

impl QuizRules {
    pub fn strict() -> Self {
        Self {
            require_single_correct: true,
            enforce_question_count: true,
        }
    }
}
