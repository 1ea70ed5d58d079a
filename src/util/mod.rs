//! Utility types shared by the cache, properties and tables.
//!
//! - [`ComponentType`] - numeric storage types and normalization arithmetic
//! - [`ValueShape`] / [`ElementType`] / [`PropertyType`] - declared types
//! - [`PropertyValue`] - runtime values (glam-backed vectors and matrices)
//! - [`Error`] / [`Result`] - error handling

mod component;
mod value_type;
mod value;
mod error;

pub use component::*;
pub use value_type::*;
pub use value::*;
pub use error::*;

// Double precision math types used by vector and matrix values
pub use glam::{DMat2, DMat3, DMat4, DVec2, DVec3, DVec4};
