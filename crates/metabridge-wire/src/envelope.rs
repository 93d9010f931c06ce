//! Fixed-size envelope transport.
//!
//! Layout (little endian):
//!
//! ```text
//! header:   magic u32 | version u16 | flags u16 | envelope_count u32 | arena_len u32
//! envelope: tag u16 | flags u16 | len u32 | data u64 | aux u64      (24 bytes each)
//! arena:    string payload bytes
//! ```
//!
//! Envelope 0 is the root. A composite stores its element count in `len`
//! and the index of a contiguous child block in `data`; maps store keys and
//! values interleaved, so their `len` is twice the pair count. Child blocks
//! always sit after their parent and every envelope belongs to exactly one
//! parent, which keeps the graph a tree.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::{DataType, ForeignHandle, ListPropertyRef, ObjectId, Rgba, WireValue};

const MAGIC: u32 = u32::from_le_bytes(*b"MBWV");
const VERSION: u16 = 1;

pub const HEADER_SIZE: usize = 16;
pub const ENVELOPE_SIZE: usize = 24;

const FLAG_HAS_SETTER: u16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    pub max_buffer_size: usize,
    pub max_envelopes: usize,
    pub max_string_len: usize,
    pub max_sequence_len: usize,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_buffer_size: 16 * 1024 * 1024,
            max_envelopes: 1_000_000,
            max_string_len: 8 * 1024 * 1024,
            max_sequence_len: 1_000_000,
            max_depth: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    BufferTooSmall { need: usize, have: usize },
    BufferTooLarge { size: usize, limit: usize },
    BadMagic(u32),
    UnsupportedVersion(u16),
    Empty,
    LimitExceeded(&'static str),
    UnknownTag { index: usize, tag: u16 },
    InvalidPayload { index: usize, reason: &'static str },
    InvalidUtf8 { index: usize },
    ChildOutOfRange { index: usize },
    BackwardReference { index: usize, child: usize },
    SharedChild { index: usize },
    Orphaned { index: usize },
    TooDeep { index: usize },
    TrailingBytes,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BufferTooSmall { need, have } => {
                write!(f, "buffer too small: need {need} bytes, have {have}")
            }
            WireError::BufferTooLarge { size, limit } => {
                write!(f, "buffer of {size} bytes exceeds limit of {limit}")
            }
            WireError::BadMagic(magic) => write!(f, "invalid magic 0x{magic:08x}"),
            WireError::UnsupportedVersion(v) => write!(f, "unsupported envelope version {v}"),
            WireError::Empty => f.write_str("buffer holds no envelopes"),
            WireError::LimitExceeded(what) => write!(f, "{what} exceeds limit"),
            WireError::UnknownTag { index, tag } => {
                write!(f, "unknown tag {tag} at envelope {index}")
            }
            WireError::InvalidPayload { index, reason } => {
                write!(f, "invalid payload at envelope {index}: {reason}")
            }
            WireError::InvalidUtf8 { index } => write!(f, "invalid UTF-8 at envelope {index}"),
            WireError::ChildOutOfRange { index } => {
                write!(f, "child block out of range at envelope {index}")
            }
            WireError::BackwardReference { index, child } => write!(
                f,
                "envelope {index} references child block at {child}, which does not follow it"
            ),
            WireError::SharedChild { index } => {
                write!(f, "envelope {index} is owned by more than one parent")
            }
            WireError::Orphaned { index } => write!(f, "envelope {index} has no owner"),
            WireError::TooDeep { index } => write!(f, "nesting too deep at envelope {index}"),
            WireError::TrailingBytes => f.write_str("trailing bytes"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Envelope {
    tag: u16,
    flags: u16,
    len: u32,
    data: u64,
    aux: u64,
}

impl Envelope {
    fn scalar(tag: DataType, data: u64) -> Self {
        Self {
            tag: tag as u16,
            data,
            ..Self::default()
        }
    }
}

struct Encoder {
    envelopes: Vec<Envelope>,
    arena: Vec<u8>,
}

impl Encoder {
    fn reserve(&mut self, count: usize) -> Result<usize, WireError> {
        let first = self.envelopes.len();
        if first + count > u32::MAX as usize {
            return Err(WireError::LimitExceeded("envelope count"));
        }
        self.envelopes.resize(first + count, Envelope::default());
        Ok(first)
    }

    fn composite(&mut self, index: usize, tag: DataType, count: usize) -> Result<usize, WireError> {
        let len = u32::try_from(count).map_err(|_| WireError::LimitExceeded("sequence length"))?;
        let first = if count == 0 { 0 } else { self.reserve(count)? };
        self.envelopes[index] = Envelope {
            tag: tag as u16,
            len,
            data: first as u64,
            ..Envelope::default()
        };
        Ok(first)
    }

    fn fill(&mut self, index: usize, value: &WireValue) -> Result<(), WireError> {
        let envelope = match value {
            WireValue::Unknown => Envelope::scalar(DataType::Unknown, 0),
            WireValue::Invalid => Envelope::scalar(DataType::Invalid, 0),
            WireValue::String(s) => {
                let len = u32::try_from(s.len()).map_err(|_| WireError::LimitExceeded("string"))?;
                let offset = self.arena.len() as u64;
                self.arena.extend_from_slice(s.as_bytes());
                Envelope {
                    tag: DataType::String as u16,
                    len,
                    data: offset,
                    ..Envelope::default()
                }
            }
            WireValue::Bool(b) => Envelope::scalar(DataType::Bool, *b as u64),
            WireValue::Number(n) => Envelope::scalar(DataType::Number, n.to_bits()),
            WireValue::Int(n) => Envelope::scalar(DataType::NumberI, *n as u32 as u64),
            WireValue::Uint(n) => Envelope::scalar(DataType::NumberU, *n as u64),
            WireValue::Opaque(p) => Envelope::scalar(DataType::Uintptr, *p),
            WireValue::Color(c) => Envelope::scalar(DataType::Color, c.to_argb() as u64),
            WireValue::Time(ms) => Envelope::scalar(DataType::Time, *ms as u64),
            WireValue::Object(id) => Envelope::scalar(DataType::Object, id.0),
            WireValue::Foreign(handle) => Envelope::scalar(DataType::ForeignAddr, handle.0),
            WireValue::ListProperty(lp) => Envelope {
                tag: DataType::ListProperty as u16,
                flags: if lp.setter_index.is_some() { FLAG_HAS_SETTER } else { 0 },
                len: lp.field_index as u32,
                data: lp.handle.0,
                aux: lp.setter_index.unwrap_or(0) as u32 as u64,
            },
            WireValue::List(items) => {
                let first = self.composite(index, DataType::List, items.len())?;
                for (i, item) in items.iter().enumerate() {
                    self.fill(first + i, item)?;
                }
                return Ok(());
            }
            WireValue::Map(entries) => {
                let first = self.composite(index, DataType::Map, entries.len() * 2)?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    self.fill(first + 2 * i, key)?;
                    self.fill(first + 2 * i + 1, value)?;
                }
                return Ok(());
            }
        };
        self.envelopes[index] = envelope;
        Ok(())
    }
}

/// Encode a value into envelope bytes.
pub fn encode(value: &WireValue) -> Result<Vec<u8>, WireError> {
    let mut encoder = Encoder {
        envelopes: vec![Envelope::default()],
        arena: Vec::new(),
    };
    encoder.fill(0, value)?;

    let arena_len =
        u32::try_from(encoder.arena.len()).map_err(|_| WireError::LimitExceeded("string arena"))?;
    let mut out =
        Vec::with_capacity(HEADER_SIZE + encoder.envelopes.len() * ENVELOPE_SIZE + encoder.arena.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(encoder.envelopes.len() as u32).to_le_bytes());
    out.extend_from_slice(&arena_len.to_le_bytes());
    for envelope in &encoder.envelopes {
        out.extend_from_slice(&envelope.tag.to_le_bytes());
        out.extend_from_slice(&envelope.flags.to_le_bytes());
        out.extend_from_slice(&envelope.len.to_le_bytes());
        out.extend_from_slice(&envelope.data.to_le_bytes());
        out.extend_from_slice(&envelope.aux.to_le_bytes());
    }
    out.extend_from_slice(&encoder.arena);
    Ok(out)
}

/// Decode envelope bytes with default limits.
pub fn decode(bytes: &[u8]) -> Result<WireValue, WireError> {
    decode_with_limits(bytes, &Limits::default())
}

pub fn decode_with_limits(bytes: &[u8], limits: &Limits) -> Result<WireValue, WireError> {
    if bytes.len() > limits.max_buffer_size {
        return Err(WireError::BufferTooLarge {
            size: bytes.len(),
            limit: limits.max_buffer_size,
        });
    }

    let mut cursor = Cursor::new(bytes);
    let magic = cursor.read_u32()?;
    if magic != MAGIC {
        return Err(WireError::BadMagic(magic));
    }
    let version = cursor.read_u16()?;
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let _flags = cursor.read_u16()?;
    let count = cursor.read_u32()? as usize;
    if count == 0 {
        return Err(WireError::Empty);
    }
    if count > limits.max_envelopes {
        return Err(WireError::LimitExceeded("envelope count"));
    }
    let arena_len = cursor.read_u32()? as usize;
    let need = count
        .checked_mul(ENVELOPE_SIZE)
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or(WireError::LimitExceeded("envelope count"))?;
    if need > bytes.len() {
        return Err(WireError::BufferTooSmall {
            need,
            have: bytes.len(),
        });
    }

    let mut envelopes = Vec::with_capacity(count);
    for _ in 0..count {
        envelopes.push(Envelope {
            tag: cursor.read_u16()?,
            flags: cursor.read_u16()?,
            len: cursor.read_u32()?,
            data: cursor.read_u64()?,
            aux: cursor.read_u64()?,
        });
    }
    let arena = cursor.read_bytes(arena_len)?;
    if !cursor.is_eof() {
        return Err(WireError::TrailingBytes);
    }

    let mut decoder = Decoder {
        envelopes: &envelopes,
        arena,
        owned: vec![false; count],
        limits,
    };
    decoder.owned[0] = true;
    let value = decoder.value(0, 0)?;

    if let Some(index) = decoder.owned.iter().position(|owned| !owned) {
        return Err(WireError::Orphaned { index });
    }
    Ok(value)
}

struct Decoder<'a> {
    envelopes: &'a [Envelope],
    arena: &'a [u8],
    owned: Vec<bool>,
    limits: &'a Limits,
}

impl<'a> Decoder<'a> {
    fn children(&mut self, index: usize, count: usize) -> Result<usize, WireError> {
        if count > self.limits.max_sequence_len {
            return Err(WireError::LimitExceeded("sequence length"));
        }
        if count == 0 {
            return Ok(0);
        }
        let first = self.envelopes[index].data as usize;
        if first <= index {
            return Err(WireError::BackwardReference { index, child: first });
        }
        if first.checked_add(count).map_or(true, |end| end > self.envelopes.len()) {
            return Err(WireError::ChildOutOfRange { index });
        }
        for child in first..first + count {
            if self.owned[child] {
                return Err(WireError::SharedChild { index: child });
            }
            self.owned[child] = true;
        }
        Ok(first)
    }

    fn value(&mut self, index: usize, depth: usize) -> Result<WireValue, WireError> {
        if depth > self.limits.max_depth {
            return Err(WireError::TooDeep { index });
        }
        let envelope = self.envelopes[index];
        let tag = DataType::from_u16(envelope.tag)
            .filter(|tag| tag.is_wire_tag())
            .ok_or(WireError::UnknownTag { index, tag: envelope.tag })?;
        let narrow = |data: u64| -> Result<u32, WireError> {
            u32::try_from(data).map_err(|_| WireError::InvalidPayload {
                index,
                reason: "value does not fit in 32 bits",
            })
        };

        let value = match tag {
            DataType::Unknown => WireValue::Unknown,
            DataType::Invalid => WireValue::Invalid,
            DataType::String => {
                let len = envelope.len as usize;
                if len > self.limits.max_string_len {
                    return Err(WireError::LimitExceeded("string length"));
                }
                let start = envelope.data as usize;
                let bytes = start
                    .checked_add(len)
                    .and_then(|end| self.arena.get(start..end))
                    .ok_or(WireError::InvalidPayload {
                        index,
                        reason: "string outside arena",
                    })?;
                let s = core::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 { index })?;
                WireValue::String(String::from(s))
            }
            DataType::Bool => match envelope.data {
                0 => WireValue::Bool(false),
                1 => WireValue::Bool(true),
                _ => {
                    return Err(WireError::InvalidPayload {
                        index,
                        reason: "bool must be 0 or 1",
                    })
                }
            },
            DataType::Number => WireValue::Number(f64::from_bits(envelope.data)),
            DataType::NumberI => WireValue::Int(narrow(envelope.data)? as i32),
            DataType::NumberU => WireValue::Uint(narrow(envelope.data)?),
            DataType::Uintptr => WireValue::Opaque(envelope.data),
            DataType::Color => WireValue::Color(Rgba::from_argb(narrow(envelope.data)?)),
            DataType::Time => WireValue::Time(envelope.data as i64),
            DataType::Object => WireValue::Object(ObjectId(envelope.data)),
            DataType::ForeignAddr => WireValue::Foreign(ForeignHandle(envelope.data)),
            DataType::ListProperty => WireValue::ListProperty(ListPropertyRef {
                handle: ForeignHandle(envelope.data),
                field_index: envelope.len as i32,
                setter_index: if envelope.flags & FLAG_HAS_SETTER != 0 {
                    Some(narrow(envelope.aux)? as i32)
                } else {
                    None
                },
            }),
            DataType::List => {
                let count = envelope.len as usize;
                let first = self.children(index, count)?;
                let mut items = Vec::with_capacity(count);
                for child in first..first + count {
                    items.push(self.value(child, depth + 1)?);
                }
                WireValue::List(items)
            }
            DataType::Map => {
                let count = envelope.len as usize;
                if count % 2 != 0 {
                    return Err(WireError::InvalidPayload {
                        index,
                        reason: "map has an odd number of entries",
                    });
                }
                let first = self.children(index, count)?;
                let mut entries = Vec::with_capacity(count / 2);
                for pair in 0..count / 2 {
                    let key = self.value(first + 2 * pair, depth + 1)?;
                    let value = self.value(first + 2 * pair + 1, depth + 1)?;
                    entries.push((key, value));
                }
                WireValue::Map(entries)
            }
            DataType::Any | DataType::Method => {
                return Err(WireError::UnknownTag { index, tag: envelope.tag })
            }
        };
        Ok(value)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.saturating_add(len);
        if end > self.bytes.len() {
            return Err(WireError::BufferTooSmall {
                need: end,
                have: self.bytes.len(),
            });
        }
        let start = self.pos;
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, WireError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_follow_their_parent() {
        let value = WireValue::list([
            WireValue::list([WireValue::Int(1)]),
            WireValue::string("tail"),
        ]);
        let bytes = encode(&value).expect("encode");
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(count, 4);
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn empty_composites_have_no_children() {
        let value = WireValue::map(Vec::<(WireValue, WireValue)>::new());
        let bytes = encode(&value).expect("encode");
        assert_eq!(bytes.len(), HEADER_SIZE + ENVELOPE_SIZE);
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn depth_limit_applies() {
        let mut value = WireValue::Int(0);
        for _ in 0..4 {
            value = WireValue::list([value]);
        }
        let bytes = encode(&value).expect("encode");
        let limits = Limits {
            max_depth: 2,
            ..Limits::default()
        };
        assert!(matches!(
            decode_with_limits(&bytes, &limits),
            Err(WireError::TooDeep { .. })
        ));
    }
}
