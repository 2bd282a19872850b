//! # beacon-retrieval
//!
//! Turns planned search queries into a ranked document set: concurrent
//! per-query fan-out against the external search capability, URL-dedup
//! merge, and cosine-similarity relevance ranking. Partial upstream
//! failures degrade to smaller result sets, never to turn failures.

pub mod client;
pub mod ranking;
pub mod searxng;

pub use client::RetrievalClient;
pub use ranking::rank;
pub use searxng::SearxngEngine;
