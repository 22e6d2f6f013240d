pub mod app;
pub mod routes;

pub use app::{build_app, cors_layer, run_server};
