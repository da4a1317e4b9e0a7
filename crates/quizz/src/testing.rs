// MockCapability: scripted generation capability for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;

use quizz_types::{
    BoxStream, Error, GenerationCapability, GenerationPrompt, StreamEvent, StreamEventType,
};

/// A stream that immediately returns None (empty).
struct EmptyStream;

impl futures_core::Stream for EmptyStream {
    type Item = Result<StreamEvent, Error>;
    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::task::Poll::Ready(None)
    }
}

/// The full event sequence for a generation that streams `chunks` and stops.
pub fn text_events(chunks: &[&str]) -> Vec<StreamEvent> {
    let mut events = vec![
        StreamEvent::default(),
        StreamEvent {
            event_type: StreamEventType::TextStart,
            ..Default::default()
        },
    ];
    events.extend(chunks.iter().map(|c| StreamEvent::text_delta(*c)));
    events.push(StreamEvent {
        event_type: StreamEventType::TextEnd,
        ..Default::default()
    });
    events.push(StreamEvent::finish("stop"));
    events
}

/// Split `text` into chunks of at most `size` characters.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// A complete quiz document with `count` questions, serialized as the generator would send it.
///
/// Question `i` has three answers; the correct one is at `i % 3`.
pub fn sample_quiz_text(count: usize) -> String {
    let questions: Vec<_> = (0..count)
        .map(|i| {
            let answers: Vec<_> = (0..3)
                .map(|a| json!({"text": format!("option {a} of question {i}"), "correct": a == i % 3}))
                .collect();
            json!({"question": format!("Question {i}: pick the right form."), "answers": answers})
        })
        .collect();
    json!({ "questions": questions }).to_string()
}

/// Build a Chat Completions SSE body that streams `chunks` as content deltas.
pub fn chat_completion_sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let data = json!({
            "id": "chatcmpl-test",
            "model": "test-model",
            "choices": [{"index": 0, "delta": {"content": chunk}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {data}\n\n"));
    }
    let finish = json!({
        "id": "chatcmpl-test",
        "model": "test-model",
        "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
    });
    body.push_str(&format!("data: {finish}\n\n"));
    body.push_str("data: [DONE]\n\n");
    body
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mock capability for testing. Each `stream()` call consumes the next
/// queued event sequence in insertion order; an exhausted queue yields an empty stream.
pub struct MockCapability {
    name: String,
    stream_actions: Mutex<Vec<Vec<Result<StreamEvent, Error>>>>,
    recorded: Mutex<Vec<GenerationPrompt>>,
    call_count: AtomicUsize,
    /// Optional delay before yielding each stream event (for timing tests).
    stream_delay: Mutex<Option<Duration>>,
}

impl MockCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_actions: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            stream_delay: Mutex::new(None),
        }
    }

    /// Queue a set of stream events to be returned by the next `stream()` call.
    pub fn with_stream_events(self, events: Vec<StreamEvent>) -> Self {
        self.with_stream_items(events.into_iter().map(Ok).collect())
    }

    /// Queue a stream that immediately yields an error (simulates connection failure).
    pub fn with_stream_error(self, error: Error) -> Self {
        self.with_stream_items(vec![Err(error)])
    }

    /// Queue an arbitrary mix of events and errors (e.g. partial-then-error streams).
    pub fn with_stream_items(self, items: Vec<Result<StreamEvent, Error>>) -> Self {
        lock(&self.stream_actions).push(items);
        self
    }

    /// Set a delay before each stream event.
    /// Use with `tokio::time::pause()` for deterministic timing.
    pub fn with_stream_delay(self, delay: Duration) -> Self {
        *lock(&self.stream_delay) = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All prompts passed to `stream()`, oldest first.
    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        lock(&self.recorded).clone()
    }
}

impl GenerationCapability for MockCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self, prompt: GenerationPrompt) -> BoxStream<'_, Result<StreamEvent, Error>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded).push(prompt);

        let mut queue = lock(&self.stream_actions);
        let delay = *lock(&self.stream_delay);
        if queue.is_empty() {
            return Box::pin(EmptyStream);
        }
        let items = queue.remove(0);
        Box::pin(async_stream::stream! {
            for item in items {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                yield item;
            }
        })
    }
}
