//! Parley Core Library
//!
//! Shared building blocks for the Parley voice assistant: the UI surface trait
//! consumed by the transport and the tools, the function-call registry the
//! speech model dispatches into, and the built-in tools (weather lookup, web
//! search) backed by HTTP endpoints.

pub mod search;
pub mod tools;
pub mod ui;
pub mod weather;
