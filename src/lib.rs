//! Spindle renders component trees to HTML through flat render queues,
//! either buffered or streamed chunk by chunk.

pub mod application;
pub mod config;
pub mod infra;
pub mod render;
