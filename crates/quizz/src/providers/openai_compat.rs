// OpenAI-compatible Chat Completions capability with structured output.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::util::sse::SseParser;

use quizz_types::{
    AdapterTimeout, BoxStream, Error, GenerationCapability, GenerationPrompt, StreamError,
    StreamEvent, StreamEventType,
};

/// Model used when neither the prompt nor the builder names one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER: &str = "openai-compatible";

/// Streams quiz documents from any `/v1/chat/completions` endpoint that
/// supports `response_format: json_schema` (OpenAI, vLLM, Ollama, ...).
pub struct OpenAICompatibleCapability {
    api_key: SecretString,
    base_url: String,
    default_model: String,
    http_client: reqwest::Client,
    /// Per-chunk timeout for streaming responses (from AdapterTimeout.stream_read).
    stream_read_timeout: Duration,
}

impl std::fmt::Debug for OpenAICompatibleCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatibleCapability")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("stream_read_timeout", &self.stream_read_timeout)
            .finish_non_exhaustive()
    }
}

impl OpenAICompatibleCapability {
    /// Create a capability with default timeouts (connect=10s, request=120s, stream_read=30s).
    ///
    /// # Examples
    /// ```ignore
    /// let capability = OpenAICompatibleCapability::new(
    ///     SecretString::from("sk-..."),
    ///     "https://api.openai.com",
    /// )?;
    /// ```
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Result<Self, Error> {
        Self::builder(api_key, base_url).build()
    }

    /// Create a builder for fine-grained configuration.
    pub fn builder(
        api_key: SecretString,
        base_url: impl Into<String>,
    ) -> OpenAICompatibleCapabilityBuilder {
        OpenAICompatibleCapabilityBuilder::new(api_key, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Wires `connect` → `connect_timeout()` and `request` → `timeout()`.
    /// `stream_read` is enforced per chunk in `stream()`.
    fn build_http_client(
        timeout: &AdapterTimeout,
        default_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeout_duration("connect", timeout.connect)?)
            .timeout(timeout_duration("request", timeout.request)?);
        if let Some(headers) = default_headers {
            builder = builder.default_headers(headers);
        }
        builder
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build HTTP client");
                Error::configuration(format!("Failed to build HTTP client: {e}"))
            })
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            format!("Bearer {}", self.api_key.expose_secret())
                .parse()
                .map_err(|_| {
                    Error::configuration(
                        "Invalid API key: contains non-ASCII or control characters",
                    )
                })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Builder for `OpenAICompatibleCapability`.
pub struct OpenAICompatibleCapabilityBuilder {
    api_key: SecretString,
    base_url: String,
    model: Option<String>,
    timeout: Option<AdapterTimeout>,
    default_headers: Option<HeaderMap>,
}

impl OpenAICompatibleCapabilityBuilder {
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: crate::util::normalize_base_url(&base_url.into()),
            model: None,
            timeout: None,
            default_headers: None,
        }
    }

    /// Model used for prompts that do not name one.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: AdapterTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set default HTTP headers sent with every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<OpenAICompatibleCapability, Error> {
        let timeout = self.timeout.unwrap_or_default();
        Ok(OpenAICompatibleCapability {
            api_key: self.api_key,
            base_url: self.base_url,
            default_model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            stream_read_timeout: timeout_duration("stream_read", timeout.stream_read)?,
            http_client: OpenAICompatibleCapability::build_http_client(
                &timeout,
                self.default_headers,
            )?,
        })
    }
}

/// Convert a timeout in seconds, rejecting values `Duration` cannot hold.
fn timeout_duration(name: &str, secs: f64) -> Result<Duration, Error> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(Error::configuration(format!(
            "{name} timeout must be a positive number of seconds, got {secs}"
        ))),
    }
}

impl GenerationCapability for OpenAICompatibleCapability {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn stream(&self, prompt: GenerationPrompt) -> BoxStream<'_, Result<StreamEvent, Error>> {
        let events = async_stream::stream! {
            let response = match self.open(&prompt).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut parser = SseParser::new();
            let mut translator = ChatCompletionsStreamTranslator::new();
            let read_timeout = self.stream_read_timeout;

            loop {
                let chunk = match tokio::time::timeout(read_timeout, body.next()).await {
                    Err(_) => {
                        yield Err(Error::timeout(format!(
                            "Stream read timed out after {read_timeout:?}"
                        )));
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        yield Err(Error::stream(format!("Stream read error: {e}"), e));
                        return;
                    }
                    Ok(Some(Ok(bytes))) => bytes,
                };

                for frame in parser.feed(&chunk) {
                    // Chat Completions puts every payload in an unnamed `data:` line.
                    let payload = frame.data.trim();
                    if payload == "[DONE]" {
                        return;
                    }
                    let Ok(data) = serde_json::from_str::<Value>(payload) else {
                        tracing::warn!(payload, "skipping unparseable SSE payload");
                        continue;
                    };
                    for event in translator.process(&data) {
                        yield Ok(event);
                    }
                }
            }
        };
        Box::pin(events)
    }
}

impl OpenAICompatibleCapability {
    /// Send the request and return the response once its status is a success.
    async fn open(&self, prompt: &GenerationPrompt) -> Result<reqwest::Response, Error> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&translate_prompt(prompt, &self.default_model))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error {
                        source: Some(Box::new(e)),
                        ..Error::timeout("HTTP request timed out")
                    }
                } else {
                    Error::network(format!("HTTP request failed: {e}"), e)
                }
            })?;

        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| json!({"error": {"message": "Failed to parse error response"}}));
        Err(parse_error(status, &headers, body))
    }
}

// === Request Translation ===

/// Translate a prompt into a streaming Chat Completions JSON body.
pub(crate) fn translate_prompt(prompt: &GenerationPrompt, default_model: &str) -> Value {
    let model = prompt.model.as_deref().unwrap_or(default_model);
    json!({
        "model": model,
        "stream": true,
        "messages": [
            {"role": "system", "content": prompt.system},
            {"role": "user", "content": prompt.instruction},
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "quiz",
                "schema": prompt.schema,
                "strict": true,
            }
        }
    })
}

// === Error Translation ===

/// Parse an error response from a Chat Completions API.
pub(crate) fn parse_error(status: u16, headers: &HeaderMap, body: Value) -> Error {
    let (error_message, error_code) = crate::util::http::parse_provider_error_message(&body);
    let retry_after = crate::util::http::parse_retry_after(headers);

    let mut err = Error::from_http_status(status, error_message, PROVIDER, Some(body), retry_after);
    err.error_code = error_code;
    err
}

// === Stream Translation ===

/// Stateful translator for the Chat Completions streaming delta format.
#[derive(Debug, Default)]
struct ChatCompletionsStreamTranslator {
    stream_started: bool,
    text_started: bool,
}

impl ChatCompletionsStreamTranslator {
    fn new() -> Self {
        Self::default()
    }

    /// Process a single SSE data payload (already parsed from JSON).
    fn process(&mut self, data: &Value) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        // Some servers report failures inside an otherwise successful stream.
        if let Some(error) = data.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("stream reported an error");
            let mut stream_error = StreamError::stream(message);
            stream_error.provider = Some(PROVIDER.to_string());
            events.push(StreamEvent {
                event_type: StreamEventType::Error,
                error: Some(Box::new(stream_error)),
                ..Default::default()
            });
            return events;
        }

        if !self.stream_started {
            self.stream_started = true;
            events.push(StreamEvent {
                event_type: StreamEventType::StreamStart,
                id: data.get("id").and_then(Value::as_str).map(str::to_string),
                ..Default::default()
            });
        }

        let Some(choice) = data
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
        else {
            return events;
        };

        if let Some(content) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
        {
            if !self.text_started {
                self.text_started = true;
                events.push(StreamEvent {
                    event_type: StreamEventType::TextStart,
                    ..Default::default()
                });
            }
            events.push(StreamEvent::text_delta(content));
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            if self.text_started {
                self.text_started = false;
                events.push(StreamEvent {
                    event_type: StreamEventType::TextEnd,
                    ..Default::default()
                });
            }
            events.push(StreamEvent::finish(reason));
        }

        events
    }
}
