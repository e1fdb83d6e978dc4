//! HTTP API for a host or UI process
//!
//! This module exposes the session orchestrator over REST:
//! - POST /capture/{request,denied,start,stop,revoked} - Drive the capture lifecycle
//! - GET /status - Current orchestrator snapshot
//! - GET /sessions - Recent sessions
//! - POST /sessions/:id/events - Record an activity event
//! - POST /ask, /summary, /insights - Analysis
//! - GET/PUT /config - AI settings
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
