//! Home dashboard backend
//!
//! A single-process RPC server for a browser dashboard: OpenWRT router
//! control over the LuCI JSON-RPC endpoint, local mpv playback control, and
//! an in-memory todo list.

pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::AppSettings;
pub use error::{AppError, AppResult};
