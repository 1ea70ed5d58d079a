//! Core layer - external resources and configuration.
//!
//! This module provides:
//! - [`ResourceCache`] - deduplicated fetch-and-cache of external JSON
//!   documents and byte buffers, keyed by resolved URL
//! - [`ResourceFetcher`] - the transport boundary, with [`FileFetcher`] and
//!   [`MemoryFetcher`] implementations
//! - [`CacheConfig`] / [`TableOptions`] - configuration

mod cache;
mod config;
mod fetch;

pub use cache::{CachedValue, ResourceCache, SharedFetch};
pub use config::{BufferWritePolicy, CacheConfig, TableOptions};
pub use fetch::{FileFetcher, MemoryFetcher, ResourceFetcher};
