//! Version catalog layer
//!
//! This module parses Go release tags, fetches them page by page from a
//! remote tag listing, and merges them into the cached catalog.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│   Fetcher   │────▶│   Catalog   │
//! │ (tag pages) │     │(filter/stop)│     │   (merge)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │    Model    │     │    Cache    │
//!                     │(parse/order)│     │  (SQLite)   │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`model`]: `Version` parsing, ordering and grouping
//! - [`registry`]: Trait for paginated tag listings
//! - [`registries`]: GitHub implementation of the registry
//! - [`fetcher`]: Paginated retrieval with filters, early stop and deadline
//! - [`catalog`]: Merge of cached and fetched versions, refresh orchestration
//! - [`cache`]: SQLite catalog store
//! - [`error`]: Error types

pub mod cache;
pub mod catalog;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod registries;
pub mod registry;
