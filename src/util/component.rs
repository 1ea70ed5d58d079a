//! Component types - the numeric storage types of accessor-backed properties.
//!
//! A component type knows its byte width, how to read and write one
//! little-endian component from a byte slice, and the normalization
//! arithmetic that maps integer ranges onto `[0, 1]` or `[-1, 1]`.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric type of one component in a binary buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ComponentType {
    /// Signed 8-bit integer
    Int8 = 0,
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 32-bit integer
    Int32 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// 32-bit floating point (IEEE 754 single precision)
    Float32 = 6,
    /// 64-bit floating point (IEEE 754 double precision)
    Float64 = 7,
}

impl ComponentType {
    /// All component types, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
    ];

    /// Returns the size in bytes of a single component.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Returns the schema name of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "INT8",
            Self::Uint8 => "UINT8",
            Self::Int16 => "INT16",
            Self::Uint16 => "UINT16",
            Self::Int32 => "INT32",
            Self::Uint32 => "UINT32",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
        }
    }

    /// Parse a component type from its schema name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Map a glTF `componentType` code (5120..=5126, 5130 for doubles).
    pub const fn from_gl_code(code: u32) -> Option<Self> {
        match code {
            5120 => Some(Self::Int8),
            5121 => Some(Self::Uint8),
            5122 => Some(Self::Int16),
            5123 => Some(Self::Uint16),
            5124 => Some(Self::Int32),
            5125 => Some(Self::Uint32),
            5126 => Some(Self::Float32),
            5130 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Returns true for integer component types.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Returns true for floating point component types.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns true for signed integer component types.
    #[inline]
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32)
    }

    /// Highest representable raw value.
    pub fn max_value(self) -> f64 {
        let bits = 8 * self.num_bytes() as i32;
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 => 2f64.powi(bits - 1) - 1.0,
            Self::Uint8 | Self::Uint16 | Self::Uint32 => 2f64.powi(bits) - 1.0,
            Self::Float32 => f32::MAX as f64,
            Self::Float64 => f64::MAX,
        }
    }

    /// Lowest representable raw value.
    pub fn min_value(self) -> f64 {
        let bits = 8 * self.num_bytes() as i32;
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 => -(2f64.powi(bits - 1)),
            Self::Uint8 | Self::Uint16 | Self::Uint32 => 0.0,
            Self::Float32 => f32::MIN as f64,
            Self::Float64 => f64::MIN,
        }
    }

    /// Map a raw integer value into `[0, 1]` (unsigned) or `[-1, 1]` (signed).
    ///
    /// The most negative signed value would land just below -1, so signed
    /// results are clamped. Float types pass through unchanged.
    #[inline]
    pub fn normalize(self, raw: f64) -> f64 {
        if self.is_float() {
            return raw;
        }
        let value = raw / self.max_value();
        if self.is_signed_integer() {
            value.max(-1.0)
        } else {
            value
        }
    }

    /// Inverse of [`normalize`](Self::normalize): scale by the maximum and
    /// round to the nearest integer (ties toward positive infinity).
    #[inline]
    pub fn denormalize(self, value: f64) -> f64 {
        if self.is_float() {
            return value;
        }
        (value * self.max_value() + 0.5).floor()
    }

    /// Read one little-endian component from the start of `bytes`.
    ///
    /// `bytes` must hold at least [`num_bytes`](Self::num_bytes) bytes.
    #[inline]
    pub fn read(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Int8 => bytes[0] as i8 as f64,
            Self::Uint8 => bytes[0] as f64,
            Self::Int16 => LittleEndian::read_i16(bytes) as f64,
            Self::Uint16 => LittleEndian::read_u16(bytes) as f64,
            Self::Int32 => LittleEndian::read_i32(bytes) as f64,
            Self::Uint32 => LittleEndian::read_u32(bytes) as f64,
            Self::Float32 => LittleEndian::read_f32(bytes) as f64,
            Self::Float64 => LittleEndian::read_f64(bytes),
        }
    }

    /// Write one little-endian component to the start of `bytes`.
    ///
    /// Integer targets truncate toward zero and saturate at the type's
    /// range; NaN stores as zero.
    #[inline]
    pub fn write(self, bytes: &mut [u8], value: f64) {
        match self {
            Self::Int8 => bytes[0] = value as i8 as u8,
            Self::Uint8 => bytes[0] = value as u8,
            Self::Int16 => LittleEndian::write_i16(bytes, value as i16),
            Self::Uint16 => LittleEndian::write_u16(bytes, value as u16),
            Self::Int32 => LittleEndian::write_i32(bytes, value as i32),
            Self::Uint32 => LittleEndian::write_u32(bytes, value as u32),
            Self::Float32 => LittleEndian::write_f32(bytes, value as f32),
            Self::Float64 => LittleEndian::write_f64(bytes, value),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
