//! Declared property types.
//!
//! Binary properties declare a numeric [`ValueShape`] (scalar, vector or
//! square matrix); array properties declare an [`ElementType`]. Both are
//! unified by [`PropertyType`], which is what the table validates values
//! and result slots against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a numeric value: how many components and how they are grouped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueShape {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ValueShape {
    /// Number of components per element.
    #[inline]
    pub const fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    /// Returns true for vector and matrix shapes.
    #[inline]
    pub const fn is_composite(self) -> bool {
        !matches!(self, Self::Scalar)
    }

    /// Schema name (`SCALAR`, `VEC3`, `MAT4`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of an array-backed property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    String,
    Number,
    Boolean,
    /// Arbitrary structured JSON value
    #[default]
    Any,
}

impl ElementType {
    /// Schema name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
            Self::Any => "ANY",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a table property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Accessor-backed numeric value
    Numeric(ValueShape),
    /// Array-backed (or descriptor-derived) value
    Element(ElementType),
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(shape) => shape.fmt(f),
            Self::Element(element) => element.fmt(f),
        }
    }
}
