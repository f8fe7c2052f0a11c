//! Core automation bridge for Taskbridge.

pub mod assets;
pub mod batch;
pub mod bridge;
pub mod classify;
pub mod config;
pub mod escape;
pub mod executor;
pub mod model;
pub mod operation;
pub mod parser;
pub mod result;
pub mod script;
pub mod validate;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
