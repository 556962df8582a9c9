//! Music library database tools - shared modules for all binaries.

pub mod cache;
pub mod config;
pub mod duplicates;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod prompt;
pub mod resolution;
pub mod resolver;
pub mod safety;
pub mod schema;
pub mod scoring;
pub mod scrobbles;
pub mod session;
