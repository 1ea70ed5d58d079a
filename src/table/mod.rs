//! Feature tables.
//!
//! - [`TableSchema`] - serde description of a table's properties
//! - [`FeatureTable`] - name lookup, validation and dispatch to properties
//! - [`FeatureView`] - per-feature handle

mod feature_table;
mod schema;
mod view;

pub use feature_table::FeatureTable;
pub use schema::{
    AccessorSchema, ArraySchema, ArraySource, BufferSchema, BufferViewSchema, PropertySchema, TableSchema,
};
pub use view::FeatureView;
pub use crate::core::TableOptions;
