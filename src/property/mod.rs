//! Property storage variants.
//!
//! A table property is exactly one of:
//! - [`BinaryProperty`] - numeric values encoded in a byte buffer
//! - [`ArrayProperty`] - values held in a JSON array
//! - [`DescriptorProperty`] - a constant taken from schema metadata
//!
//! The variant is chosen once, when the table is built.

mod array;
mod binary;
mod buffer;
mod descriptor;

pub use array::ArrayProperty;
pub use binary::{AccessorInfo, BinaryProperty, BinarySource};
pub use buffer::{DocumentBuffer, SharedBuffer};
pub use descriptor::DescriptorProperty;

use std::fmt;

use futures::future::{BoxFuture, FutureExt};

use crate::core::SharedFetch;
use crate::util::{ElementType, PropertyType, PropertyValue};

/// Where a property's data currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageState {
    /// No storage; reads produce zero values
    Implicit,
    /// External data not arrived yet
    Pending,
    /// Data available (possibly empty, after a failed fetch)
    Ready,
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Implicit => "implicit",
            Self::Pending => "pending",
            Self::Ready => "ready",
        })
    }
}

/// Output of a shared fetch, if it has completed.
///
/// Polls the fetch once without blocking, so synchronous transports
/// resolve on first access.
pub(crate) fn resolved<T: Clone>(fetch: &SharedFetch<T>) -> Option<T> {
    match fetch.peek() {
        Some(output) => Some(output.clone()),
        None => fetch.clone().now_or_never(),
    }
}

/// A table property of any variant.
pub enum Property {
    Binary(BinaryProperty),
    Array(ArrayProperty),
    Descriptor(DescriptorProperty),
}

impl Property {
    /// Declared type.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Binary(p) => PropertyType::Numeric(p.shape()),
            Self::Array(p) => PropertyType::Element(p.element_type()),
            Self::Descriptor(_) => PropertyType::Element(ElementType::Any),
        }
    }

    pub fn state(&self) -> StorageState {
        match self {
            Self::Binary(p) => p.state(),
            Self::Array(p) => p.state(),
            Self::Descriptor(_) => StorageState::Ready,
        }
    }

    /// Value of feature `id`, or `None` when unavailable.
    pub fn get_value(&self, id: usize) -> Option<PropertyValue> {
        match self {
            Self::Binary(p) => p.get_value(id),
            Self::Array(p) => p.get_value(id).map(PropertyValue::from_json),
            Self::Descriptor(p) => p.get_value().cloned().map(PropertyValue::from_json),
        }
    }

    /// Read feature `id` into `out`; returns false when unavailable.
    pub fn get_value_into(&self, id: usize, out: &mut PropertyValue) -> bool {
        match self {
            Self::Binary(p) => p.get_value_into(id, out),
            other => match other.get_value(id) {
                Some(value) => {
                    *out = value;
                    true
                }
                None => false,
            },
        }
    }

    /// Store `value` for feature `id`; returns false when the write was
    /// dropped. Descriptor properties never accept writes.
    pub fn set_value(&mut self, id: usize, value: &PropertyValue) -> bool {
        match self {
            Self::Binary(p) => p.set_value(id, value),
            Self::Array(p) => p.set_value(id, value.to_json()),
            Self::Descriptor(_) => false,
        }
    }

    /// A future settling once this property's external data has arrived.
    pub(crate) fn pending_fetch(&self) -> Option<BoxFuture<'static, ()>> {
        match self {
            Self::Binary(p) => p.pending_fetch(),
            Self::Array(p) => p.pending_fetch(),
            Self::Descriptor(_) => None,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            Self::Binary(_) => "Binary",
            Self::Array(_) => "Array",
            Self::Descriptor(_) => "Descriptor",
        };
        f.debug_struct("Property")
            .field("variant", &variant)
            .field("type", &self.property_type())
            .field("state", &self.state())
            .finish()
    }
}
