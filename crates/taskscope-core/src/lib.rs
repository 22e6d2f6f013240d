//! taskscope Core
//!
//! Core types, traits, and utilities shared across taskscope components.
//!
//! This crate provides:
//! - Model descriptors and examples as returned by the model registry
//! - The classification result and cache entry types
//! - The recognized task taxonomy
//! - The deterministic classification prompt builder
//! - Error types and result handling

pub mod error;
pub mod prompt;
pub mod taxonomy;
pub mod types;

pub use error::{Error, Result};
pub use prompt::build_prompt;
pub use taxonomy::{TaskSpec, TaskTaxonomy};
pub use types::{
    CacheEntry, ClassificationResult, InputField, ModelDescriptor, ModelExample, ModelKey,
    OutputSchema,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::taxonomy::TaskTaxonomy;
    pub use crate::types::{CacheEntry, ClassificationResult, ModelDescriptor, ModelExample, ModelKey};
}
