use crate::errors::BeaconResult;
use crate::models::{ChatSession, Document, Message, Role};

/// Durable read/write of chat sessions and messages.
///
/// Implementations must make `append_or_fork_message` and
/// `finalize_assistant_message` atomic: the fork-forward delete and the
/// insert for a given (chat_id, message_id) happen in one transaction, so a
/// concurrent resubmission of the same turn cannot interleave.
pub trait SessionStore: Send + Sync {
    /// Create the session if it does not exist. First writer wins on title;
    /// a no-op when the id already exists.
    fn ensure_session(
        &self,
        id: &str,
        title: &str,
        focus_mode: &str,
        attached_files: &[String],
    ) -> BeaconResult<()>;

    /// Append a message at the next sequence number. When a message with
    /// this id already exists in the chat, delete every message with a
    /// strictly greater sequence number instead (fork-forward).
    /// Idempotent under retry of the same message id.
    fn append_or_fork_message(
        &self,
        chat_id: &str,
        message_id: &str,
        role: Role,
        content: &str,
    ) -> BeaconResult<()>;

    /// Persist the final assistant message with its accumulated content,
    /// citations, and suggestions. Applied at most once per message id.
    fn finalize_assistant_message(
        &self,
        chat_id: &str,
        message_id: &str,
        content: &str,
        sources: &[Document],
        suggestions: &[String],
    ) -> BeaconResult<()>;

    /// Read a session back, if it exists.
    fn session(&self, id: &str) -> BeaconResult<Option<ChatSession>>;

    /// All messages of a chat in sequence order.
    fn messages(&self, chat_id: &str) -> BeaconResult<Vec<Message>>;
}
