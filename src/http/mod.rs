//! HTTP API server for practice clients
//!
//! This module provides the REST surface the learner's screens talk to:
//! - POST /practice/start - Gate and start a new practice session
//! - POST /practice/:id/audio - Submit a recorded answer
//! - POST /practice/:id/text - Submit a typed answer
//! - POST /practice/:id/complete - Commit the combined result
//! - GET /practice/:id - Inspect a session
//! - GET /ledger - Coin balance
//! - POST /ledger/reset - Support recovery: refill to the cap
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
