//! Capability traits: the seams between the orchestrator and its external
//! collaborators (generation, embedding, search, durable store).

mod chat;
mod embedding;
mod search;
mod store;

pub use chat::{ChatModel, TokenStream};
pub use embedding::EmbeddingModel;
pub use search::SearchEngine;
pub use store::SessionStore;
