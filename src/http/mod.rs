//! HTTP API for controlling capture and polling the waveform
//!
//! - POST /capture/start - Start a new session
//! - POST /capture/pause, /capture/resume - Pause or resume
//! - POST /capture/stop - Stop and return the session summary
//! - GET /capture/status - Current state, session and last summary
//! - GET /waveform - Waveform snapshot for rendering
//! - PUT /waveform/capacity - Resize the waveform buffer
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
