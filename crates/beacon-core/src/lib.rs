//! # beacon-core
//!
//! Foundation crate for the Beacon conversational search assistant.
//! Defines the data model, error taxonomy, configuration, and the
//! capability traits every other crate in the workspace builds on.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::BeaconConfig;
pub use errors::{BeaconError, BeaconResult};
pub use models::{
    ChatSession, ChatTurn, Document, Message, ModelRef, OptimizationMode, RankedDocument, Role,
    StreamFrame, TurnRequest,
};
