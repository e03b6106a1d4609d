//! Terminal front-end for interactive planning sessions.
//!
//! Streams model output and tool-call progress to a single linear terminal
//! stream while the user keeps typing at the prompt.

pub mod config;
pub mod logging;
pub mod provider;
pub mod session;
pub mod ui;
