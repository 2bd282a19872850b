//! # beacon-session
//!
//! Durable storage for chat sessions and messages over SQLite. Owns the
//! fork-forward rule: resubmitting an existing message id discards every
//! later message in that chat instead of inserting a duplicate.

mod schema;
mod store;

pub use store::SqliteSessionStore;
