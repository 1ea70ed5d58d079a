//! Properties defined entirely by schema metadata.

use serde_json::Value;

/// A property with no per-feature storage.
///
/// Every feature reads the descriptor's constant `"value"` member. Writes
/// are rejected by the owning table.
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorProperty {
    descriptor: Value,
}

impl DescriptorProperty {
    pub fn new(descriptor: Value) -> Self {
        Self { descriptor }
    }

    /// The raw descriptor.
    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    /// The constant value, identical for every feature.
    pub fn get_value(&self) -> Option<&Value> {
        self.descriptor.get("value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constant_value() {
        let prop = DescriptorProperty::new(json!({"semantic": "CLASS", "value": "tree"}));
        assert_eq!(prop.get_value(), Some(&json!("tree")));
    }

    #[test]
    fn test_no_value() {
        let prop = DescriptorProperty::new(json!({"semantic": "CLASS"}));
        assert_eq!(prop.get_value(), None);
        let prop = DescriptorProperty::new(json!("not an object"));
        assert_eq!(prop.get_value(), None);
    }
}
