//! Schema migrations, run at open.

use rusqlite::Connection;

use beacon_core::errors::{BeaconResult, StorageError};

/// Sessions keyed by id; messages keyed by (chat_id, sequence) with the
/// metadata blob holding sources and suggestions.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chats (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    focus_mode  TEXT NOT NULL DEFAULT '',
    files       TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id  TEXT NOT NULL,
    chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}'
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_chat_message
    ON messages (chat_id, message_id);

CREATE INDEX IF NOT EXISTS idx_messages_chat_seq
    ON messages (chat_id, seq);
";

pub fn run_migrations(conn: &Connection) -> BeaconResult<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}
