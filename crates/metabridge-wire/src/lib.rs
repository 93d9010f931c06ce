//! Wire protocol shared by the host bridge and the foreign runtime.
//!
//! Every value that crosses the boundary is a [`WireValue`]: a tagged union
//! with exactly one active variant. Composite values own their children, so
//! moving a value transfers the whole buffer and it is released exactly once.
//!
//! The [`envelope`] module turns values into a flat sequence of fixed-size
//! records that can be handed across an FFI or process boundary.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod envelope;
pub mod value;

pub use envelope::{decode, decode_with_limits, encode, Limits, WireError};
pub use value::WireValue;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Stable numeric tags used for wire values and member kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u16)]
pub enum DataType {
    Unknown = 0,
    Invalid = 1,

    String = 10,
    Bool = 11,
    Number = 12,
    NumberI = 13,
    NumberU = 14,
    Uintptr = 15,
    Color = 16,
    Time = 17,

    ForeignAddr = 100,
    Object = 101,
    ListProperty = 102,

    List = 200,
    Map = 201,

    // Member kinds only, never carried by a wire value.
    Any = 300,
    Method = 301,
}

impl DataType {
    pub fn from_u16(code: u16) -> Option<Self> {
        let tag = match code {
            0 => DataType::Unknown,
            1 => DataType::Invalid,
            10 => DataType::String,
            11 => DataType::Bool,
            12 => DataType::Number,
            13 => DataType::NumberI,
            14 => DataType::NumberU,
            15 => DataType::Uintptr,
            16 => DataType::Color,
            17 => DataType::Time,
            100 => DataType::ForeignAddr,
            101 => DataType::Object,
            102 => DataType::ListProperty,
            200 => DataType::List,
            201 => DataType::Map,
            300 => DataType::Any,
            301 => DataType::Method,
            _ => return None,
        };
        Some(tag)
    }

    /// Whether a wire value may carry this tag.
    pub fn is_wire_tag(self) -> bool {
        !matches!(self, DataType::Any | DataType::Method)
    }

    pub fn is_composite(self) -> bool {
        matches!(self, DataType::List | DataType::Map)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Invalid => "invalid",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Number => "number",
            DataType::NumberI => "int",
            DataType::NumberU => "uint",
            DataType::Uintptr => "uintptr",
            DataType::Color => "color",
            DataType::Time => "time",
            DataType::ForeignAddr => "foreign",
            DataType::Object => "object",
            DataType::ListProperty => "list-property",
            DataType::List => "list",
            DataType::Map => "map",
            DataType::Any => "any",
            DataType::Method => "method",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque key identifying a value owned by the foreign runtime.
///
/// The host never dereferences it; it is only handed back through hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForeignHandle(pub u64);

/// Identity of a live host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(pub u64);

impl fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "foreign#{:x}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Describes a list-valued field whose items are host objects managed by
/// the foreign runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListPropertyRef {
    pub handle: ForeignHandle,
    pub field_index: i32,
    pub setter_index: Option<i32>,
}

/// An 8-bit-per-channel color, carried on the wire as packed ARGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }
}

/// Largest integer magnitude a `Number` can carry without losing precision.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Error converting between native Rust values and wire values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    TypeMismatch { expected: String, got: String },
    IntegerOutOfRange(i128),
    IndexError(usize, Box<ConversionError>),
    ExpectedList(String),
    ExpectedMap(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            ConversionError::IntegerOutOfRange(value) => write!(
                f,
                "integer {value} is outside the exactly representable range ±{MAX_SAFE_INTEGER}"
            ),
            ConversionError::IndexError(index, inner) => {
                write!(f, "at index {index}: {inner}")
            }
            ConversionError::ExpectedList(got) => write!(f, "expected list, got {got}"),
            ConversionError::ExpectedMap(got) => write!(f, "expected map, got {got}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConversionError {}
