//! Reelcast - personal media server with on-demand HLS transcoding
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod config;
pub mod jobs;
pub mod probe;
pub mod server;
pub mod streaming;
