//! HTTP interface

pub mod handlers;
pub mod models;
pub mod routes;

use crate::pipeline::Pipeline;

pub use routes::create_router;

/// Shared state of the HTTP handlers
pub struct AppState {
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}
