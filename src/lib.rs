//! goenv: Go toolchain version catalog
//!
//! Fetches Go release tags from GitHub, parses and groups them by
//! major.minor, and keeps the catalog in a local SQLite cache.

pub mod cli;
pub mod config;
pub mod logging;
pub mod version;
