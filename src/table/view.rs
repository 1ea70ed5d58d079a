//! Per-feature handles.

use std::fmt;
use std::sync::Arc;

use super::feature_table::TableInner;
use crate::util::{PropertyValue, Result};

/// One feature of a [`FeatureTable`](super::FeatureTable).
///
/// Holds nothing but the table and the feature id; every call is forwarded
/// to the table with that id.
#[derive(Clone)]
pub struct FeatureView {
    table: Arc<TableInner>,
    id: usize,
}

impl FeatureView {
    pub(crate) fn new(table: Arc<TableInner>, id: usize) -> Self {
        Self { table, id }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// See [`FeatureTable::get_property_value`](super::FeatureTable::get_property_value).
    pub fn get_property(&self, name: &str) -> Result<Option<PropertyValue>> {
        self.table.get_property_value(self.id, name)
    }

    /// See [`FeatureTable::get_property_value_into`](super::FeatureTable::get_property_value_into).
    pub fn get_property_into(&self, name: &str, out: &mut PropertyValue) -> Result<bool> {
        self.table.get_property_value_into(self.id, name, out)
    }

    /// See [`FeatureTable::set_property_value`](super::FeatureTable::set_property_value).
    pub fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.table.set_property_value(self.id, name, value.into())
    }
}

impl fmt::Debug for FeatureView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureView").field("id", &self.id).finish()
    }
}
