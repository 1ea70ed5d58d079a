//! Table schema input.
//!
//! The schema says, for every property, where its data lives. It is
//! usually produced by the document loader, but it round-trips through
//! JSON so tables can also be described in standalone files:
//!
//! ```json
//! {
//!   "count": 2,
//!   "properties": {
//!     "height": { "accessor": { "componentType": "FLOAT32", "type": "SCALAR", "count": 2,
//!                               "bufferView": { "buffer": { "embedded": 0 } } } },
//!     "name":   { "array": { "elementType": "STRING", "values": ["a", "b"] } },
//!     "class":  { "descriptor": { "value": "building" } }
//!   }
//! }
//! ```

use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::util::{ComponentType, ElementType, Error, Result, ValueShape};

/// Full description of a feature table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableSchema {
    /// Number of features. Absent for tables that only carry descriptors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Property names must be unique; a repeated name is a schema error.
    #[serde(deserialize_with = "unique_properties")]
    pub properties: BTreeMap<String, PropertySchema>,
    /// Opaque metadata passed through to the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl TableSchema {
    /// Parse a schema from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::schema(e.to_string()))
    }

    /// Convert an already parsed JSON value.
    ///
    /// Duplicate names have already been collapsed by the JSON parser here;
    /// use [`from_json`](Self::from_json) to have them rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::schema(e.to_string()))
    }
}

fn unique_properties<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, PropertySchema>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PropertiesVisitor;

    impl<'de> Visitor<'de> for PropertiesVisitor {
        type Value = BTreeMap<String, PropertySchema>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of property names to property schemas")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut properties = BTreeMap::new();
            while let Some(name) = map.next_key::<String>()? {
                match properties.entry(name) {
                    Entry::Occupied(entry) => {
                        return Err(de::Error::custom(format!("duplicate property '{}'", entry.key())));
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(map.next_value()?);
                    }
                }
            }
            Ok(properties)
        }
    }

    deserializer.deserialize_map(PropertiesVisitor)
}

/// Storage of one property. Exactly one variant is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertySchema {
    Accessor(AccessorSchema),
    Array(ArraySchema),
    /// Schema metadata; the `"value"` member is the constant property value.
    Descriptor(Value),
}

/// Typed numeric components in a byte buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorSchema {
    pub component_type: ComponentType,
    #[serde(rename = "type")]
    pub shape: ValueShape,
    pub count: usize,
    #[serde(default)]
    pub normalized: bool,
    #[serde(default)]
    pub byte_offset: usize,
    /// Absent for properties that read as zero until written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<BufferViewSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewSchema {
    pub buffer: BufferSchema,
    #[serde(default)]
    pub byte_offset: usize,
    /// Defaults to the packed element size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
}

/// Where a buffer's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferSchema {
    /// Index into the document buffers supplied at table construction.
    Embedded(usize),
    /// External resource, relative to the cache base.
    Uri(String),
}

/// A property stored as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySchema {
    #[serde(default)]
    pub element_type: ElementType,
    #[serde(flatten)]
    pub source: ArraySource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArraySource {
    Inline { values: Vec<Value> },
    /// The array under `key` in the JSON document at `uri`.
    External { uri: String, key: String },
}
