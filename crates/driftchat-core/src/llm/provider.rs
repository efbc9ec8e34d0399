//! CompletionProvider trait definition.
//!
//! Uses RPITIT for `complete` and `Pin<Box<dyn Stream>>` for `stream`
//! (the stream must be `'static` so the consumer can drive it across
//! suspension points without borrowing the provider).

use std::pin::Pin;

use futures_util::Stream;

use driftchat_types::error::GenerationError;
use driftchat_types::llm::StreamChunk;

/// Trait for completion-source backends.
///
/// `stream` never errors at the type level: a broken stream surfaces as a
/// [`StreamChunk::Failed`] item (or abnormal termination), so the state
/// machine's fallback decision stays a visible branch rather than hidden
/// exception control flow.
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name (e.g., "groq").
    fn name(&self) -> &str;

    /// Request a lazy token sequence for `prompt`. Finite, not restartable.
    fn stream(
        &self,
        prompt: &str,
    ) -> Pin<Box<dyn Stream<Item = StreamChunk> + Send + 'static>>;

    /// Single blocking completion request for `prompt`.
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
