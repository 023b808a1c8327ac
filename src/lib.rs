//! Vaelis — terminal client for the Vaelis AI assistant.
//!
//! The backend does the generating, persisting, and searching; this crate
//! streams responses into a conversation TUI and a small CLI surface.

pub mod api;
pub mod commands;
pub mod config;
pub mod events;
pub mod recents;
pub mod stream;
pub mod streaming;
pub mod tui;
pub mod ui;
