//! # Composition Engine
//!
//! The composition engine coordinates resource resolution, classification,
//! graph assembly and encoding for compose requests, and runs single-resource
//! processing chains.

pub mod chain;
pub mod engine;

// Re-exports for convenience
pub use chain::ProcessRequest;
pub use engine::{ComposeOutcome, ComposeRequest, CompositionEngine};
