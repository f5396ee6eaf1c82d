//! Core application state
//!
//! Settings shared by every command: tool overrides and merge defaults.

mod state;

pub use state::AppSettings;
