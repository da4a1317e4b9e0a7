// generator.rs: a request in, a terminated sequence of snapshots out.
//
// Accumulates streamed text from the generation capability and yields a
// best-effort parse of it whenever the parsed value changes.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use quizz_types::{
    BoxStream, Error, GenerationCapability, GenerationPrompt, GenerationRequest, StreamEventType,
};

use crate::schema::QuizSchema;
use crate::util::partial_json::try_parse_partial;
use crate::util::stream_lifecycle::StreamLifecycle;

/// One partially-parsed document as it stood after a text increment.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The best-effort JSON value (grows as tokens arrive).
    pub value: Value,
    /// The raw text accumulated so far.
    pub raw_text: String,
}

/// A lazy, non-restartable sequence of snapshots.
///
/// Ends after the capability's completion signal. An `Err` item is always the
/// last item.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, Error>>;

/// Wraps a generation capability and turns requests into snapshot streams.
///
/// Holds no per-request state: each `generate()` call is independent.
#[derive(Clone)]
pub struct StreamingGenerator {
    capability: Arc<dyn GenerationCapability>,
    schema: QuizSchema,
    model: Option<String>,
}

impl std::fmt::Debug for StreamingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingGenerator")
            .field("capability", &self.capability.name())
            .field("model", &self.model)
            .finish()
    }
}

impl StreamingGenerator {
    pub fn new(capability: Arc<dyn GenerationCapability>) -> Self {
        Self {
            capability,
            schema: QuizSchema::new(),
            model: None,
        }
    }

    /// Model identifier passed through to the capability.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn schema(&self) -> &QuizSchema {
        &self.schema
    }

    /// The prompt sent for `request`. Deterministic in the request.
    pub fn prompt_for(&self, request: &GenerationRequest) -> GenerationPrompt {
        let prompt = GenerationPrompt::new(request.instruction(), self.schema.describe().clone());
        match &self.model {
            Some(model) => prompt.model(model.clone()),
            None => prompt,
        }
    }

    /// Start generating a quiz for `request`.
    ///
    /// Nothing is sent to the capability until the stream is first polled.
    /// Dropping the stream abandons the generation.
    ///
    /// Failure modes surface as a final `Err` item:
    /// - an error from the capability, or an `ERROR` event it emitted
    /// - the event stream ending without a `FINISH` event
    pub fn generate(&self, request: &GenerationRequest) -> SnapshotStream {
        let prompt = self.prompt_for(request);
        let capability = Arc::clone(&self.capability);

        let snapshots = async_stream::stream! {
            tracing::debug!(
                capability = capability.name(),
                instruction = %prompt.instruction,
                "starting generation"
            );
            let mut events = capability.stream(prompt);
            let mut lifecycle = StreamLifecycle::new();
            let mut accumulated_text = String::new();
            let mut last_yielded: Option<Value> = None;

            while let Some(event_result) = events.next().await {
                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                lifecycle.observe(&event.event_type);

                match event.event_type {
                    StreamEventType::TextDelta => {
                        let Some(delta) = &event.delta else {
                            continue;
                        };
                        accumulated_text.push_str(delta);

                        // Only yield if the parsed value actually changed
                        if let Some(partial) = try_parse_partial(&accumulated_text) {
                            if last_yielded.as_ref() != Some(&partial) {
                                last_yielded = Some(partial.clone());
                                yield Ok(Snapshot {
                                    value: partial,
                                    raw_text: accumulated_text.clone(),
                                });
                            }
                        }
                    }
                    StreamEventType::Error => {
                        let err = match event.error.as_deref() {
                            Some(e) => Error::from_stream_error(e),
                            None => Error::stream_interrupted("generation stream reported an error"),
                        };
                        yield Err(err);
                        return;
                    }
                    StreamEventType::Finish => {
                        let reason = event.finish_reason.as_deref().unwrap_or("unknown");
                        if reason != "stop" {
                            tracing::warn!(reason, "generation finished early");
                        }
                        tracing::debug!(
                            deltas = lifecycle.delta_count(),
                            bytes = accumulated_text.len(),
                            "generation finished"
                        );
                        break;
                    }
                    _ => {}
                }
            }

            if !lifecycle.is_finished() {
                yield Err(Error::stream_interrupted(
                    "generation stream ended without a completion signal",
                ));
            }
        };
        Box::pin(snapshots)
    }
}
