// quizz: Layers 2-3, from the schema contract up to the reconciler
#![allow(clippy::result_large_err)]

#[cfg(feature = "openai-compat")]
pub mod config;
pub mod generator;
pub mod merge;
pub mod providers;
pub mod reconciler;
pub mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod util;

// --- Curated re-exports from quizz-types (Layer 1) ---
pub use quizz_types::{
    // Config
    AdapterTimeout,
    // Quiz model
    AnswerOption,
    AnswerSelection,
    // Type aliases
    BoxStream,
    // Errors
    Error,
    ErrorKind,
    // Capability trait
    GenerationCapability,
    GenerationPrompt,
    // Request contract
    GenerationRequest,
    PartialAnswer,
    PartialQuestion,
    PartialQuiz,
    Question,
    Quiz,
    QuizRules,
    ScoreResult,
    // Streaming
    StreamError,
    StreamEvent,
    StreamEventType,
    Tense,
    MAX_QUESTION_COUNT,
    MIN_QUESTION_COUNT,
};

pub use generator::{Snapshot, SnapshotStream, StreamingGenerator};
pub use merge::merge_snapshot;
pub use reconciler::{Diagnostic, IncrementalReconciler, Lifecycle, QuizState};
pub use schema::{FieldIssue, PartialValidation, QuizSchema, Violation, ViolationKind};

#[cfg(feature = "openai-compat")]
pub use config::Settings;
#[cfg(feature = "openai-compat")]
pub use providers::openai_compat::OpenAICompatibleCapability;
