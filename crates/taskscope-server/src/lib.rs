//! taskscope Server
//!
//! HTTP surface of taskscope: model classification with a read-through
//! cache, the task taxonomy, cache administration and an image generation
//! proxy. The `taskscope` binary also carries a cache seeding command.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod seed;
pub mod server;
pub mod state;

pub use classifier::{
    CacheStatus, Classified, Classifier, ClassifyOptions, ClassifyOutcome, DebugTrace,
};
pub use config::ServiceConfig;
pub use error::AppError;
pub use server::{build_app, run_server};
pub use state::AppState;
