//! Feature tables: named properties over a fixed set of features.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use super::schema::{AccessorSchema, ArraySchema, ArraySource, BufferSchema, PropertySchema, TableSchema};
use super::FeatureView;
use crate::core::{ResourceCache, TableOptions};
use crate::property::{
    AccessorInfo, ArrayProperty, BinaryProperty, BinarySource, DescriptorProperty, DocumentBuffer,
    Property, StorageState,
};
use crate::util::{Error, PropertyType, PropertyValue, Result};

/// State shared between a table and its feature views.
pub(crate) struct TableInner {
    count: Option<usize>,
    properties: BTreeMap<String, RwLock<Property>>,
    extras: Option<Value>,
}

impl TableInner {
    fn check_id(&self, id: usize) -> Result<()> {
        let count = self.count.unwrap_or(0);
        if id >= count {
            return Err(Error::OutOfRange { id, count });
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Result<&RwLock<Property>> {
        self.properties
            .get(name)
            .ok_or_else(|| Error::UnknownProperty(name.to_owned()))
    }

    pub(crate) fn get_property_value(&self, id: usize, name: &str) -> Result<Option<PropertyValue>> {
        self.check_id(id)?;
        let property = self.property(name)?.read();
        let value = property.get_value(id);
        if value.is_none() {
            trace!(id, name, "property value unavailable");
        }
        Ok(value)
    }

    pub(crate) fn get_property_value_into(&self, id: usize, name: &str, out: &mut PropertyValue) -> Result<bool> {
        self.check_id(id)?;
        let property = self.property(name)?.read();
        let declared = property.property_type();
        if !out.matches(declared) {
            return Err(Error::shape_mismatch(name, declared, out.kind_name()));
        }
        Ok(property.get_value_into(id, out))
    }

    pub(crate) fn set_property_value(&self, id: usize, name: &str, value: PropertyValue) -> Result<()> {
        self.check_id(id)?;
        let mut property = self.property(name)?.write();
        if matches!(*property, Property::Descriptor(_)) {
            return Err(Error::ReadOnly(name.to_owned()));
        }
        let declared = property.property_type();
        if !value.matches(declared) {
            return Err(Error::shape_mismatch(name, declared, value.kind_name()));
        }
        property.set_value(id, &value);
        Ok(())
    }
}

/// A table of features and their properties.
///
/// Built once from a [`TableSchema`]; the set of properties never changes
/// afterwards. Properties whose data lives in external resources start out
/// pending and read as unavailable (`Ok(None)`) until their fetch settles.
/// Await [`ready`](Self::ready) to wait for all of them.
pub struct FeatureTable {
    inner: Arc<TableInner>,
    features: OnceLock<Vec<FeatureView>>,
}

impl FeatureTable {
    /// Build a table.
    ///
    /// `buffers` are the document's embedded buffers, indexed by
    /// `{"embedded": n}` in the schema. External resources are requested
    /// from `cache` immediately; construction itself never waits for them.
    pub fn new(
        schema: &TableSchema,
        cache: &ResourceCache,
        buffers: &[DocumentBuffer],
        options: TableOptions,
    ) -> Result<Self> {
        let mut properties = BTreeMap::new();
        for (name, property) in &schema.properties {
            let property = build_property(name, property, schema.count, cache, buffers, options)?;
            trace!(name, ty = %property.property_type(), state = %property.state(), "property built");
            properties.insert(name.clone(), RwLock::new(property));
        }
        debug!(count = ?schema.count, properties = properties.len(), "feature table built");

        Ok(Self {
            inner: Arc::new(TableInner {
                count: schema.count,
                properties,
                extras: schema.extras.clone(),
            }),
            features: OnceLock::new(),
        })
    }

    /// Declared feature count, if any.
    #[inline]
    pub fn count(&self) -> Option<usize> {
        self.inner.count
    }

    /// Number of addressable features (zero when no count is declared).
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.inner.count.unwrap_or(0)
    }

    /// Opaque metadata from the schema.
    pub fn extras(&self) -> Option<&Value> {
        self.inner.extras.as_ref()
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.inner.properties.keys().map(String::as_str)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.inner.properties.contains_key(name)
    }

    /// Declared type of property `name`.
    pub fn property_type(&self, name: &str) -> Result<PropertyType> {
        Ok(self.inner.property(name)?.read().property_type())
    }

    /// Storage state of property `name`.
    pub fn property_state(&self, name: &str) -> Result<StorageState> {
        Ok(self.inner.property(name)?.read().state())
    }

    /// View of feature `id`.
    ///
    /// Views for every feature are created together on first call.
    pub fn get_feature(&self, id: usize) -> Result<&FeatureView> {
        self.inner.check_id(id)?;
        let features = self.features.get_or_init(|| {
            debug!(count = self.feature_count(), "creating feature views");
            (0..self.feature_count())
                .map(|id| FeatureView::new(Arc::clone(&self.inner), id))
                .collect()
        });
        features.get(id).ok_or(Error::OutOfRange {
            id,
            count: features.len(),
        })
    }

    /// Iterate over all feature views.
    pub fn features(&self) -> impl Iterator<Item = &FeatureView> {
        (0..self.feature_count()).filter_map(move |id| self.get_feature(id).ok())
    }

    /// Read property `name` of feature `id`.
    ///
    /// Returns `Ok(None)` while the property's external data is pending, or
    /// when the requested element is not present in the data that arrived.
    pub fn get_property_value(&self, id: usize, name: &str) -> Result<Option<PropertyValue>> {
        self.inner.get_property_value(id, name)
    }

    /// Read property `name` of feature `id` into `out`.
    ///
    /// `out` must already hold a value of the property's declared type;
    /// otherwise this fails with [`Error::ShapeMismatch`] without touching
    /// the property. Returns false, leaving `out` unchanged, when the value
    /// is unavailable.
    pub fn get_property_value_into(&self, id: usize, name: &str, out: &mut PropertyValue) -> Result<bool> {
        self.inner.get_property_value_into(id, name, out)
    }

    /// Write property `name` of feature `id`.
    ///
    /// The value must match the property's declared type. Writes to a
    /// property whose external data has not arrived are dropped with a
    /// warning.
    pub fn set_property_value(&self, id: usize, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.inner.set_property_value(id, name, value.into())
    }

    /// Returns true while any property still waits for external data.
    pub fn is_pending(&self) -> bool {
        self.inner
            .properties
            .values()
            .any(|p| p.read().state() == StorageState::Pending)
    }

    /// A future that completes once every external fetch this table
    /// issued has settled (successfully or not).
    pub fn ready(&self) -> BoxFuture<'static, ()> {
        let pending: Vec<_> = self
            .inner
            .properties
            .values()
            .filter_map(|p| p.read().pending_fetch())
            .collect();
        debug!(pending = pending.len(), "waiting for external resources");
        future::join_all(pending).map(|_| ()).boxed()
    }
}

impl fmt::Debug for FeatureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureTable")
            .field("count", &self.inner.count)
            .field("properties", &self.inner.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_property(
    name: &str,
    schema: &PropertySchema,
    table_count: Option<usize>,
    cache: &ResourceCache,
    buffers: &[DocumentBuffer],
    options: TableOptions,
) -> Result<Property> {
    match schema {
        PropertySchema::Accessor(accessor) => build_binary(name, accessor, table_count, cache, buffers, options),
        PropertySchema::Array(array) => build_array(array, cache),
        PropertySchema::Descriptor(descriptor) => {
            Ok(Property::Descriptor(DescriptorProperty::new(descriptor.clone())))
        }
    }
}

fn build_binary(
    name: &str,
    accessor: &AccessorSchema,
    table_count: Option<usize>,
    cache: &ResourceCache,
    buffers: &[DocumentBuffer],
    options: TableOptions,
) -> Result<Property> {
    let info = AccessorInfo::new(accessor.component_type, accessor.shape, accessor.count)
        .normalized(accessor.normalized);

    let source = match &accessor.buffer_view {
        // Dense storage allocated on first write must cover every feature id
        None => match table_count {
            Some(count) if accessor.count < count => {
                return Err(Error::schema(format!(
                    "property '{name}': implicit accessor holds {} elements, table has {count} features",
                    accessor.count
                )))
            }
            _ => BinarySource::Implicit,
        },
        Some(view) => {
            let byte_offset = view
                .byte_offset
                .checked_add(accessor.byte_offset)
                .ok_or_else(|| Error::schema(format!("property '{name}': byte offset overflows")))?;
            match &view.buffer {
                BufferSchema::Embedded(index) => {
                    let buffer = buffers.get(*index).cloned().ok_or_else(|| {
                        Error::schema(format!(
                            "property '{name}': embedded buffer {index} not supplied ({} available)",
                            buffers.len()
                        ))
                    })?;
                    BinarySource::Embedded {
                        buffer,
                        byte_offset,
                        byte_stride: view.byte_stride,
                    }
                }
                BufferSchema::Uri(uri) => BinarySource::External {
                    fetch: cache.fetch_buffer(uri)?,
                    byte_offset,
                    byte_stride: view.byte_stride,
                },
            }
        }
    };

    let property = BinaryProperty::new(info, source, options.buffer_writes).map_err(|e| match e {
        Error::InvalidSchema(msg) => Error::schema(format!("property '{name}': {msg}")),
        other => other,
    })?;
    Ok(Property::Binary(property))
}

fn build_array(array: &ArraySchema, cache: &ResourceCache) -> Result<Property> {
    let property = match &array.source {
        ArraySource::Inline { values } => ArrayProperty::inline(array.element_type, values),
        ArraySource::External { uri, key } => {
            ArrayProperty::external(array.element_type, cache.fetch_value(uri, key)?)
        }
    };
    Ok(Property::Array(property))
}
