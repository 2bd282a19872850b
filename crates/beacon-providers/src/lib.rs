//! # beacon-providers
//!
//! Resolves (provider, model-name) selectors into callable generation and
//! embedding capabilities, and exposes the availability listing derived
//! from which providers had valid configuration.

pub mod openai;
pub mod registry;
pub mod sse;

pub use registry::{ModelListing, ModelRegistry};
