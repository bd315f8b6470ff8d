//! HTTP API handlers for dcmp-ai
//!
//! The command surface used by the desktop host bridge, plus health.

pub mod commands;
pub mod health;

pub use commands::command_routes;
pub use health::health_routes;
