// GenerationCapability trait: the contract every hosted-model adapter implements.

use std::pin::Pin;

use futures_core::Stream;

use crate::error::Error;
use crate::request::GenerationPrompt;
use crate::stream::StreamEvent;

/// A boxed stream that is Send.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Submits a prompt plus schema and yields the generated text as stream events.
///
/// The returned stream is lazy: nothing is sent until it is first polled, and
/// dropping it abandons the generation. Implementations keep no state between
/// calls and must preserve event order.
pub trait GenerationCapability: Send + Sync {
    /// Capability name (e.g. `"openai-compatible"`), used in logs and errors.
    fn name(&self) -> &str;

    /// Start a generation, returning its event stream.
    fn stream(&self, prompt: GenerationPrompt) -> BoxStream<'_, Result<StreamEvent, Error>>;
}
