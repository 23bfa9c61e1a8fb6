//! Parley Assistant
//!
//! The application crate: configuration, the session controller, the terminal
//! UI, and the cpal-backed audio devices. The `assistant` binary is a thin
//! command loop around this library.

pub mod audio;
pub mod config;
pub mod controller;
pub mod terminal;
