//! Emotion Server
//!
//! HTTP front end for the emotion classifier. The model is loaded once at startup
//! and shared by every request handler; inference runs on tokio's blocking pool.

pub mod cli;
pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use cli::Cli;
pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
