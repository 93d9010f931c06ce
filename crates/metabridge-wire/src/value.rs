//! Wire values

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{ConversionError, DataType, ForeignHandle, ListPropertyRef, ObjectId, Rgba, MAX_SAFE_INTEGER};

/// A value crossing the host/foreign boundary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum WireValue {
    /// Produced when the sender could not represent a value.
    Unknown,
    Invalid,
    String(String),
    Bool(bool),
    Number(f64),
    Int(i32),
    Uint(u32),
    /// Pointer-sized opaque integer; never dereferenced.
    Opaque(u64),
    Color(Rgba),
    /// Milliseconds since the Unix epoch, UTC.
    Time(i64),
    List(Vec<WireValue>),
    /// Ordered key/value pairs. Flattened to interleaved entries on the wire.
    Map(Vec<(WireValue, WireValue)>),
    Object(ObjectId),
    Foreign(ForeignHandle),
    ListProperty(ListPropertyRef),
}

impl WireValue {
    pub fn data_type(&self) -> DataType {
        match self {
            WireValue::Unknown => DataType::Unknown,
            WireValue::Invalid => DataType::Invalid,
            WireValue::String(_) => DataType::String,
            WireValue::Bool(_) => DataType::Bool,
            WireValue::Number(_) => DataType::Number,
            WireValue::Int(_) => DataType::NumberI,
            WireValue::Uint(_) => DataType::NumberU,
            WireValue::Opaque(_) => DataType::Uintptr,
            WireValue::Color(_) => DataType::Color,
            WireValue::Time(_) => DataType::Time,
            WireValue::List(_) => DataType::List,
            WireValue::Map(_) => DataType::Map,
            WireValue::Object(_) => DataType::Object,
            WireValue::Foreign(_) => DataType::ForeignAddr,
            WireValue::ListProperty(_) => DataType::ListProperty,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, WireValue::Invalid)
    }

    pub fn string(s: impl Into<String>) -> Self {
        WireValue::String(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = WireValue>) -> Self {
        WireValue::List(items.into_iter().collect())
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<WireValue>,
        V: Into<WireValue>,
    {
        WireValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Converts a wall-clock time to a `Time` value.
    #[cfg(feature = "std")]
    pub fn time(at: std::time::SystemTime) -> Self {
        let millis = match at.duration_since(std::time::UNIX_EPOCH) {
            Ok(after) => after.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        };
        WireValue::Time(millis)
    }

    /// Number of elements (pairs for maps) in a composite, zero otherwise.
    pub fn len(&self) -> usize {
        match self {
            WireValue::List(items) => items.len(),
            WireValue::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WireValue {
    fn default() -> Self {
        WireValue::Invalid
    }
}

// ============================================================================
// Native -> wire
// ============================================================================

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}

impl From<i8> for WireValue {
    fn from(v: i8) -> Self {
        WireValue::Int(v as i32)
    }
}

impl From<i16> for WireValue {
    fn from(v: i16) -> Self {
        WireValue::Int(v as i32)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::Int(v)
    }
}

impl From<u8> for WireValue {
    fn from(v: u8) -> Self {
        WireValue::Uint(v as u32)
    }
}

impl From<u16> for WireValue {
    fn from(v: u16) -> Self {
        WireValue::Uint(v as u32)
    }
}

impl From<u32> for WireValue {
    fn from(v: u32) -> Self {
        WireValue::Uint(v)
    }
}

impl From<f32> for WireValue {
    fn from(v: f32) -> Self {
        WireValue::Number(v as f64)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Number(v)
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::String(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(String::from(v))
    }
}

impl From<Rgba> for WireValue {
    fn from(v: Rgba) -> Self {
        WireValue::Color(v)
    }
}

impl From<ObjectId> for WireValue {
    fn from(v: ObjectId) -> Self {
        WireValue::Object(v)
    }
}

impl From<ForeignHandle> for WireValue {
    fn from(v: ForeignHandle) -> Self {
        WireValue::Foreign(v)
    }
}

impl<T: Into<WireValue>> From<Vec<T>> for WireValue {
    fn from(v: Vec<T>) -> Self {
        WireValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<WireValue>> From<Option<T>> for WireValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => WireValue::Invalid,
        }
    }
}

/// 64-bit integers travel as `Number` and must be exactly representable.
impl TryFrom<i64> for WireValue {
    type Error = ConversionError;
    fn try_from(v: i64) -> Result<Self, Self::Error> {
        if v > MAX_SAFE_INTEGER || v < -MAX_SAFE_INTEGER {
            return Err(ConversionError::IntegerOutOfRange(v as i128));
        }
        Ok(WireValue::Number(v as f64))
    }
}

impl TryFrom<u64> for WireValue {
    type Error = ConversionError;
    fn try_from(v: u64) -> Result<Self, Self::Error> {
        if v > MAX_SAFE_INTEGER as u64 {
            return Err(ConversionError::IntegerOutOfRange(v as i128));
        }
        Ok(WireValue::Number(v as f64))
    }
}

// ============================================================================
// Wire -> native
// ============================================================================

fn mismatch(expected: &str, got: &WireValue) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: String::from(expected),
        got: format!("{}", got.data_type()),
    }
}

impl TryFrom<WireValue> for bool {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Bool(x) => Ok(x),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<WireValue> for i32 {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Int(x) => Ok(x),
            WireValue::Uint(x) => {
                i32::try_from(x).map_err(|_| ConversionError::IntegerOutOfRange(x as i128))
            }
            other => Err(mismatch("i32", &other)),
        }
    }
}

impl TryFrom<WireValue> for u32 {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Uint(x) => Ok(x),
            WireValue::Int(x) => {
                u32::try_from(x).map_err(|_| ConversionError::IntegerOutOfRange(x as i128))
            }
            other => Err(mismatch("u32", &other)),
        }
    }
}

impl TryFrom<WireValue> for i64 {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Int(x) => Ok(x as i64),
            WireValue::Uint(x) => Ok(x as i64),
            WireValue::Number(x)
                if x <= MAX_SAFE_INTEGER as f64
                    && x >= -(MAX_SAFE_INTEGER as f64)
                    && (x as i64) as f64 == x =>
            {
                Ok(x as i64)
            }
            WireValue::Number(x) => Err(mismatch("integral number", &WireValue::Number(x))),
            other => Err(mismatch("i64", &other)),
        }
    }
}

impl TryFrom<WireValue> for f64 {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Number(x) => Ok(x),
            WireValue::Int(x) => Ok(x as f64),
            WireValue::Uint(x) => Ok(x as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl TryFrom<WireValue> for String {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::String(x) => Ok(x),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<WireValue> for Rgba {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Color(x) => Ok(x),
            other => Err(mismatch("color", &other)),
        }
    }
}

impl TryFrom<WireValue> for ObjectId {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Object(x) => Ok(x),
            other => Err(mismatch("object", &other)),
        }
    }
}

impl TryFrom<WireValue> for ForeignHandle {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::Foreign(x) => Ok(x),
            other => Err(mismatch("foreign handle", &other)),
        }
    }
}

impl<T: TryFrom<WireValue, Error = ConversionError>> TryFrom<WireValue> for Vec<T> {
    type Error = ConversionError;
    fn try_from(v: WireValue) -> Result<Self, Self::Error> {
        match v {
            WireValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    T::try_from(item)
                        .map_err(|e| ConversionError::IndexError(i, alloc::boxed::Box::new(e)))
                })
                .collect(),
            other => Err(ConversionError::ExpectedList(format!("{}", other.data_type()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_widen() {
        assert_eq!(WireValue::from(-3i8), WireValue::Int(-3));
        assert_eq!(WireValue::from(40_000u16), WireValue::Uint(40_000));
        assert_eq!(WireValue::from(1.5f32), WireValue::Number(1.5));
    }

    #[test]
    fn wide_integers_are_range_checked() {
        assert_eq!(
            WireValue::try_from(MAX_SAFE_INTEGER),
            Ok(WireValue::Number(MAX_SAFE_INTEGER as f64))
        );
        assert!(WireValue::try_from(MAX_SAFE_INTEGER + 1).is_err());
        assert!(WireValue::try_from(-MAX_SAFE_INTEGER - 1).is_err());
        assert!(WireValue::try_from(u64::MAX).is_err());
    }

    #[test]
    fn list_conversion_reports_index() {
        let value = WireValue::list([WireValue::Int(1), WireValue::string("x")]);
        let err = Vec::<i32>::try_from(value).unwrap_err();
        assert!(matches!(err, ConversionError::IndexError(1, _)));
    }

    #[test]
    fn none_is_invalid() {
        assert_eq!(WireValue::from(None::<i32>), WireValue::Invalid);
    }
}
