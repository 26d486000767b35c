use crate::session::PracticePipeline;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The practice pipeline, shared by all handlers
    pub pipeline: Arc<PracticePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<PracticePipeline>) -> Self {
        Self { pipeline }
    }
}
