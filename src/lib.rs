//! # Feature tables
//!
//! Typed per-feature metadata for 3D content. A [`FeatureTable`] holds a
//! fixed number of features and a set of named properties; every property
//! yields one value per feature. Property data comes from one of three
//! places:
//!
//! - a binary accessor (typed numeric components in a byte buffer, with
//!   optional integer normalization)
//! - a JSON array, inline in the schema or in an external document
//! - a descriptor constant shared by every feature
//!
//! External buffers and documents are fetched through a [`ResourceCache`]
//! that deduplicates requests per URL and keeps every result for the
//! lifetime of the cache.
//!
//! ## Modules
//!
//! - [`util`] - component types, declared types, runtime values, errors
//! - [`core`] - resource cache, fetchers, configuration
//! - [`property`] - property storage variants
//! - [`table`] - schema input, tables and feature views
//!
//! ## Example
//!
//! ```ignore
//! use feature_table::prelude::*;
//!
//! let cache = ResourceCache::new(CacheConfig::from_directory("tiles")?, Arc::new(FileFetcher));
//! let schema = TableSchema::from_json(&std::fs::read_to_string("tiles/table.json")?)?;
//! let table = FeatureTable::new(&schema, &cache, &[], TableOptions::default())?;
//! futures::executor::block_on(table.ready());
//!
//! let height = table.get_property_value(0, "height")?;
//! table.set_property_value(0, "name", "renamed")?;
//! ```

pub mod util;
pub mod core;
pub mod property;
pub mod table;

// Re-export commonly used types
pub use util::{ComponentType, Error, PropertyType, PropertyValue, Result, ValueShape};
pub use crate::core::{ResourceCache, TableOptions};
pub use table::{FeatureTable, FeatureView, TableSchema};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{
        ComponentType, ElementType, Error, PropertyType, PropertyValue, Result, ValueShape,
    };
    pub use crate::util::{DMat2, DMat3, DMat4, DVec2, DVec3, DVec4};
    pub use crate::core::{
        BufferWritePolicy, CacheConfig, FileFetcher, MemoryFetcher, ResourceCache,
        ResourceFetcher, TableOptions,
    };
    pub use crate::property::{DocumentBuffer, StorageState};
    pub use crate::table::{FeatureTable, FeatureView, TableSchema};
    pub use std::sync::Arc;
}
