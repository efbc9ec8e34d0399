//! Completion-source types for Driftchat.
//!
//! The streaming side deliberately reports failure as data
//! ([`StreamChunk::Failed`]) rather than as an error branch, so the chat
//! state machine can treat "stream broke" as an ordinary item and decide
//! on fallback in one visible place.

/// One item produced by a streaming completion.
///
/// The sequence is finite and not restartable. A `Failed` chunk (or the
/// stream ending abnormally) signals failure to the consumer without
/// raising, so fallback stays an explicit branch in the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// One incremental text fragment.
    Delta(String),
    /// The stream broke; carries a diagnostic reason.
    Failed(String),
}
