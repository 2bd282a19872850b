//! Data model shared across the workspace.

mod document;
mod frame;
mod message;
mod turn;

pub use document::{Document, RankedDocument};
pub use frame::StreamFrame;
pub use message::{ChatSession, Message, Role};
pub use turn::{ChatTurn, InboundMessage, ModelRef, OptimizationMode, TurnRequest};
