//! Runtime property values.

use super::{ElementType, PropertyType, ValueShape};
use glam::{DMat2, DMat3, DMat4, DVec2, DVec3, DVec4};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

/// Flat component storage for one numeric value (up to a 4x4 matrix inline).
pub type Components = SmallVec<[f64; 16]>;

/// A single property value of one feature.
///
/// Matrices are column-major, matching both glam and the binary layout.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Scalar(f64),
    Vec2(DVec2),
    Vec3(DVec3),
    Vec4(DVec4),
    Mat2(DMat2),
    Mat3(DMat3),
    Mat4(DMat4),
    Boolean(bool),
    String(String),
    /// Structured value that has no more specific variant
    Json(Value),
}

impl PropertyValue {
    /// The additive identity for a numeric shape.
    pub fn zero(shape: ValueShape) -> Self {
        match shape {
            ValueShape::Scalar => Self::Scalar(0.0),
            ValueShape::Vec2 => Self::Vec2(DVec2::ZERO),
            ValueShape::Vec3 => Self::Vec3(DVec3::ZERO),
            ValueShape::Vec4 => Self::Vec4(DVec4::ZERO),
            ValueShape::Mat2 => Self::Mat2(DMat2::ZERO),
            ValueShape::Mat3 => Self::Mat3(DMat3::ZERO),
            ValueShape::Mat4 => Self::Mat4(DMat4::ZERO),
        }
    }

    /// Assemble a numeric value from its flat components.
    ///
    /// Missing trailing components read as zero.
    pub fn from_components(shape: ValueShape, components: &[f64]) -> Self {
        let mut c = [0.0f64; 16];
        let n = shape.component_count().min(components.len());
        c[..n].copy_from_slice(&components[..n]);
        match shape {
            ValueShape::Scalar => Self::Scalar(c[0]),
            ValueShape::Vec2 => Self::Vec2(DVec2::new(c[0], c[1])),
            ValueShape::Vec3 => Self::Vec3(DVec3::new(c[0], c[1], c[2])),
            ValueShape::Vec4 => Self::Vec4(DVec4::new(c[0], c[1], c[2], c[3])),
            ValueShape::Mat2 => Self::Mat2(DMat2::from_cols_array(&[c[0], c[1], c[2], c[3]])),
            ValueShape::Mat3 => {
                let mut m = [0.0; 9];
                m.copy_from_slice(&c[..9]);
                Self::Mat3(DMat3::from_cols_array(&m))
            }
            ValueShape::Mat4 => Self::Mat4(DMat4::from_cols_array(&c)),
        }
    }

    /// Numeric shape of this value, if it is numeric.
    pub fn shape(&self) -> Option<ValueShape> {
        match self {
            Self::Scalar(_) => Some(ValueShape::Scalar),
            Self::Vec2(_) => Some(ValueShape::Vec2),
            Self::Vec3(_) => Some(ValueShape::Vec3),
            Self::Vec4(_) => Some(ValueShape::Vec4),
            Self::Mat2(_) => Some(ValueShape::Mat2),
            Self::Mat3(_) => Some(ValueShape::Mat3),
            Self::Mat4(_) => Some(ValueShape::Mat4),
            Self::Boolean(_) | Self::String(_) | Self::Json(_) => None,
        }
    }

    /// Flat components of a numeric value.
    pub fn components(&self) -> Option<Components> {
        let c: Components = match self {
            Self::Scalar(v) => smallvec::smallvec![*v],
            Self::Vec2(v) => SmallVec::from_slice(&v.to_array()),
            Self::Vec3(v) => SmallVec::from_slice(&v.to_array()),
            Self::Vec4(v) => SmallVec::from_slice(&v.to_array()),
            Self::Mat2(m) => SmallVec::from_slice(&m.to_cols_array()),
            Self::Mat3(m) => SmallVec::from_slice(&m.to_cols_array()),
            Self::Mat4(m) => SmallVec::from_slice(&m.to_cols_array()),
            Self::Boolean(_) | Self::String(_) | Self::Json(_) => return None,
        };
        Some(c)
    }

    /// Short type name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "BOOLEAN",
            Self::String(_) => "STRING",
            Self::Json(_) => "JSON",
            numeric => numeric.shape().map(ValueShape::name).unwrap_or("UNKNOWN"),
        }
    }

    /// Check whether this value may be stored in (or read into) a property
    /// of the given declared type.
    pub fn matches(&self, ty: PropertyType) -> bool {
        match ty {
            PropertyType::Numeric(shape) => self.shape() == Some(shape),
            PropertyType::Element(ElementType::Any) => true,
            PropertyType::Element(ElementType::String) => {
                matches!(self, Self::String(_) | Self::Json(Value::String(_)))
            }
            PropertyType::Element(ElementType::Number) => {
                matches!(self, Self::Scalar(_) | Self::Json(Value::Number(_)))
            }
            PropertyType::Element(ElementType::Boolean) => {
                matches!(self, Self::Boolean(_) | Self::Json(Value::Bool(_)))
            }
        }
    }

    /// Scalar value, if this is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    /// String value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Json(v) => v.as_str(),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Convert a JSON value, picking the most specific variant.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Bool(b) => Self::Boolean(b),
            Value::String(s) => Self::String(s),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Scalar(f),
                None => Self::Json(Value::Number(n)),
            },
            other => Self::Json(other),
        }
    }

    /// Convert to a JSON value. Vectors and matrices become flat arrays.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
            Self::Scalar(v) => number_to_json(*v),
            numeric => Value::Array(
                numeric
                    .components()
                    .unwrap_or_default()
                    .into_iter()
                    .map(number_to_json)
                    .collect(),
            ),
        }
    }
}

fn number_to_json(v: f64) -> Value {
    // Integral values keep their integer spelling in JSON.
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Scalar(v) => write!(f, "{v}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<DVec2> for PropertyValue {
    fn from(v: DVec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<DVec3> for PropertyValue {
    fn from(v: DVec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<DVec4> for PropertyValue {
    fn from(v: DVec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<DMat2> for PropertyValue {
    fn from(m: DMat2) -> Self {
        Self::Mat2(m)
    }
}

impl From<DMat3> for PropertyValue {
    fn from(m: DMat3) -> Self {
        Self::Mat3(m)
    }
}

impl From<DMat4> for PropertyValue {
    fn from(m: DMat4) -> Self {
        Self::Mat4(m)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        Self::from_json(v)
    }
}
