//! Streaming output: markdown line rendering and the per-message stream
//! state machine that drives it.

pub mod blocks;
pub mod controller;
pub mod inline;
pub mod markdown_stream;
