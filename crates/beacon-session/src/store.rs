//! SqliteSessionStore implements the `SessionStore` gateway.
//!
//! All multi-statement writes run inside one transaction, so a fork-forward
//! delete and its companion insert cannot interleave with a concurrent
//! resubmission of the same turn.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use beacon_core::errors::{BeaconResult, StorageError};
use beacon_core::models::{ChatSession, Document, Message, Role};
use beacon_core::traits::SessionStore;

use crate::schema;

/// SQLite-backed session store. One writer connection; turn traffic is one
/// row per message, so pooling is not warranted here.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> BeaconResult<Self> {
        let conn = Connection::open(path).map_err(StorageError::database)?;
        Self::initialize(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> BeaconResult<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::database)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> BeaconResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(StorageError::database)?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> BeaconResult<T>) -> BeaconResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".into()))?;
        f(&guard)
    }

    /// Run `f` inside a transaction, committing on success.
    fn transactional<T>(&self, f: impl FnOnce(&Connection) -> BeaconResult<T>) -> BeaconResult<T> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(StorageError::database)?;
            match f(&tx) {
                Ok(value) => {
                    tx.commit().map_err(StorageError::database)?;
                    Ok(value)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }
}

/// Sequence of an existing (chat, message) row, if any.
fn existing_seq(conn: &Connection, chat_id: &str, message_id: &str) -> BeaconResult<Option<i64>> {
    conn.query_row(
        "SELECT seq FROM messages WHERE chat_id = ?1 AND message_id = ?2",
        params![chat_id, message_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(StorageError::database)
    .map_err(Into::into)
}

fn insert_message(
    conn: &Connection,
    chat_id: &str,
    message_id: &str,
    role: Role,
    content: &str,
    metadata: &serde_json::Value,
) -> BeaconResult<()> {
    conn.execute(
        "INSERT INTO messages (message_id, chat_id, role, content, created_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message_id,
            chat_id,
            role.as_str(),
            content,
            Utc::now().to_rfc3339(),
            metadata.to_string(),
        ],
    )
    .map_err(StorageError::database)?;
    Ok(())
}

impl SessionStore for SqliteSessionStore {
    fn ensure_session(
        &self,
        id: &str,
        title: &str,
        focus_mode: &str,
        attached_files: &[String],
    ) -> BeaconResult<()> {
        self.with_conn(|conn| {
            let files = serde_json::to_string(attached_files)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            // First writer wins on title: an existing row is left untouched.
            conn.execute(
                "INSERT OR IGNORE INTO chats (id, title, created_at, focus_mode, files)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, title, Utc::now().to_rfc3339(), focus_mode, files],
            )
            .map_err(StorageError::database)?;
            Ok(())
        })
    }

    fn append_or_fork_message(
        &self,
        chat_id: &str,
        message_id: &str,
        role: Role,
        content: &str,
    ) -> BeaconResult<()> {
        self.transactional(|conn| {
            if let Some(seq) = existing_seq(conn, chat_id, message_id)? {
                // Fork-forward: the edited message stays, everything after
                // it in this chat is discarded.
                let deleted = conn
                    .execute(
                        "DELETE FROM messages WHERE chat_id = ?1 AND seq > ?2",
                        params![chat_id, seq],
                    )
                    .map_err(StorageError::database)?;
                debug!(chat_id, message_id, deleted, "fork-forward applied");
                Ok(())
            } else {
                let metadata = serde_json::json!({ "createdAt": Utc::now().to_rfc3339() });
                insert_message(conn, chat_id, message_id, role, content, &metadata)
            }
        })
    }

    fn finalize_assistant_message(
        &self,
        chat_id: &str,
        message_id: &str,
        content: &str,
        sources: &[Document],
        suggestions: &[String],
    ) -> BeaconResult<()> {
        self.transactional(|conn| {
            let mut metadata = serde_json::json!({ "createdAt": Utc::now().to_rfc3339() });
            if !sources.is_empty() {
                metadata["sources"] = serde_json::to_value(sources)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
            }
            if !suggestions.is_empty() {
                metadata["suggestions"] = serde_json::to_value(suggestions)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
            }

            if existing_seq(conn, chat_id, message_id)?.is_some() {
                // Retry of the same finalize: overwrite in place, keep seq.
                conn.execute(
                    "UPDATE messages SET content = ?3, metadata = ?4
                     WHERE chat_id = ?1 AND message_id = ?2",
                    params![chat_id, message_id, content, metadata.to_string()],
                )
                .map_err(StorageError::database)?;
                Ok(())
            } else {
                insert_message(conn, chat_id, message_id, Role::Assistant, content, &metadata)
            }
        })
    }

    fn session(&self, id: &str) -> BeaconResult<Option<ChatSession>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, created_at, focus_mode, files FROM chats WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(StorageError::database)?
            .map(|(id, title, created_at, focus_mode, files)| -> BeaconResult<ChatSession> {
                Ok(ChatSession {
                    id,
                    title,
                    created_at: created_at
                        .parse()
                        .map_err(|e| StorageError::Serialization(format!("created_at: {e}")))?,
                    focus_mode,
                    attached_files: serde_json::from_str(&files)
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                })
            })
            .transpose()
        })
    }

    fn messages(&self, chat_id: &str) -> BeaconResult<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT seq, message_id, role, content, created_at, metadata
                     FROM messages WHERE chat_id = ?1 ORDER BY seq",
                )
                .map_err(StorageError::database)?;

            let rows = stmt
                .query_map(params![chat_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(StorageError::database)?;

            let mut messages = Vec::new();
            for row in rows {
                let (seq, message_id, role, content, created_at, metadata) =
                    row.map_err(StorageError::database)?;
                let role = Role::parse(&role).ok_or_else(|| {
                    StorageError::Serialization(format!("unknown role: {role}"))
                })?;
                let metadata: serde_json::Value = serde_json::from_str(&metadata)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;

                messages.push(Message {
                    message_id,
                    chat_id: chat_id.to_string(),
                    role,
                    content,
                    created_at: created_at
                        .parse()
                        .map_err(|e| StorageError::Serialization(format!("created_at: {e}")))?,
                    sequence: seq,
                    sources: metadata
                        .get("sources")
                        .map(|v| serde_json::from_value(v.clone()))
                        .transpose()
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                    suggestions: metadata
                        .get("suggestions")
                        .map(|v| serde_json::from_value(v.clone()))
                        .transpose()
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                });
            }
            Ok(messages)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteSessionStore {
        SqliteSessionStore::open_in_memory().expect("in-memory store")
    }

    fn seed_turn(store: &SqliteSessionStore, chat: &str, id: &str, content: &str) {
        store
            .append_or_fork_message(chat, id, Role::User, content)
            .unwrap();
    }

    #[test]
    fn ensure_session_first_writer_wins_on_title() {
        let store = store();
        store.ensure_session("c1", "first title", "web", &[]).unwrap();
        store.ensure_session("c1", "second title", "web", &[]).unwrap();
        let session = store.session("c1").unwrap().unwrap();
        assert_eq!(session.title, "first title");
    }

    #[test]
    fn sequences_strictly_increase_in_insertion_order() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        seed_turn(&store, "c1", "m1", "one");
        seed_turn(&store, "c1", "m2", "two");
        seed_turn(&store, "c1", "m3", "three");

        let messages = store.messages("c1").unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn resubmitting_existing_id_forks_forward() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        seed_turn(&store, "c1", "m1", "one");
        seed_turn(&store, "c1", "m2", "two");
        store
            .finalize_assistant_message("c1", "a2", "answer two", &[], &[])
            .unwrap();

        // Edit m1: everything after it goes.
        seed_turn(&store, "c1", "m1", "one edited");
        let messages = store.messages("c1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, "m1");
        // The original row survives; fork-forward only truncates.
        assert_eq!(messages[0].content, "one");
    }

    #[test]
    fn append_is_idempotent_under_retry() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        seed_turn(&store, "c1", "m1", "one");
        seed_turn(&store, "c1", "m1", "one");
        assert_eq!(store.messages("c1").unwrap().len(), 1);
    }

    #[test]
    fn fork_does_not_touch_other_chats() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        store.ensure_session("c2", "t", "", &[]).unwrap();
        seed_turn(&store, "c1", "m1", "one");
        seed_turn(&store, "c2", "m1", "other chat");
        seed_turn(&store, "c2", "m2", "other chat again");

        seed_turn(&store, "c1", "m1", "resubmit");
        assert_eq!(store.messages("c2").unwrap().len(), 2);
    }

    #[test]
    fn finalize_stores_sources_and_suggestions() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        seed_turn(&store, "c1", "m1", "question");

        let sources = vec![Document::new("Paris", "https://en.example/paris", "capital")];
        let suggestions = vec!["What about Lyon?".to_string()];
        store
            .finalize_assistant_message("c1", "a1", "the answer", &sources, &suggestions)
            .unwrap();

        let messages = store.messages("c1").unwrap();
        let assistant = &messages[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "the answer");
        assert_eq!(assistant.sources.as_ref().unwrap()[0].title, "Paris");
        assert_eq!(assistant.suggestions.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn finalize_retry_overwrites_in_place() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        store
            .finalize_assistant_message("c1", "a1", "partial", &[], &[])
            .unwrap();
        store
            .finalize_assistant_message("c1", "a1", "complete", &[], &[])
            .unwrap();

        let messages = store.messages("c1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "complete");
    }

    #[test]
    fn empty_metadata_yields_no_sources() {
        let store = store();
        store.ensure_session("c1", "t", "", &[]).unwrap();
        store
            .finalize_assistant_message("c1", "a1", "bare", &[], &[])
            .unwrap();
        let messages = store.messages("c1").unwrap();
        assert!(messages[0].sources.is_none());
        assert!(messages[0].suggestions.is_none());
    }

    #[test]
    fn file_backed_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.db");
        {
            let store = SqliteSessionStore::open(&path).unwrap();
            store.ensure_session("c1", "t", "web", &["f1".into()]).unwrap();
            seed_turn(&store, "c1", "m1", "persisted");
        }
        let store = SqliteSessionStore::open(&path).unwrap();
        let session = store.session("c1").unwrap().unwrap();
        assert_eq!(session.attached_files, vec!["f1".to_string()]);
        assert_eq!(store.messages("c1").unwrap().len(), 1);
    }
}
