//! # beacon-agent
//!
//! The streaming retrieval-augmented answer orchestrator. One inbound turn
//! becomes planned search queries, a ranked document set, a token and
//! citation frame stream, and a durable conversation record, all under a
//! single deadline with partial-failure isolation.

pub mod generator;
pub mod orchestrator;
pub mod planner;
pub mod protocol;

pub use orchestrator::{Orchestrator, TurnStream};
pub use protocol::{ProtocolEncoder, StreamClosed, StreamingEncoder};
