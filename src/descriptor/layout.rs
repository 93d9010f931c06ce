//! Content hashes of synthesized class layouts.
//!
//! Two classes with the same member names, storage kinds, notify bindings and
//! signatures hash identically, no matter when or how often they were built.

use sha2::{Digest, Sha256};

use crate::host::{MetaClass, MethodKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutHash([u8; 32]);

impl LayoutHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars.
    pub fn to_short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl std::fmt::Display for LayoutHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_short_hex())
    }
}

const HASH_TAG_CLASS: u8 = 0x20;
const HASH_TAG_PROPERTY: u8 = 0x21;
const HASH_TAG_SIGNAL: u8 = 0x22;
const HASH_TAG_SLOT: u8 = 0x23;
const HASH_TAG_METHOD: u8 = 0x24;
const HASH_TAG_NONE: u8 = 0x00;

struct LayoutHasher {
    hasher: Sha256,
}

impl LayoutHasher {
    fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    fn tag(mut self, tag: u8) -> Self {
        self.hasher.update([tag]);
        self
    }

    fn string(mut self, s: &str) -> Self {
        self.hasher.update((s.len() as u32).to_le_bytes());
        self.hasher.update(s.as_bytes());
        self
    }

    fn count(mut self, n: usize) -> Self {
        self.hasher.update((n as u32).to_le_bytes());
        self
    }

    fn optional(self, s: Option<&str>) -> Self {
        match s {
            Some(s) => self.tag(0x01).string(s),
            None => self.tag(HASH_TAG_NONE),
        }
    }

    fn finish(self) -> LayoutHash {
        let result = self.hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        LayoutHash(bytes)
    }
}

/// Hash the class's own members plus the name of its superclass.
pub fn hash_class(class: &MetaClass) -> LayoutHash {
    let mut hasher = LayoutHasher::new()
        .tag(HASH_TAG_CLASS)
        .string(class.name())
        .optional(class.superclass().map(|s| s.name()))
        .count(class.own_properties().len());
    for property in class.own_properties() {
        hasher = hasher
            .tag(HASH_TAG_PROPERTY)
            .string(&property.name)
            .string(property.storage.type_name())
            .count(property.notify.map_or(0, |n| n + 1))
            .tag(property.writable as u8);
    }
    hasher = hasher.count(class.own_methods().len());
    for method in class.own_methods() {
        let tag = match method.kind {
            MethodKind::Signal => HASH_TAG_SIGNAL,
            MethodKind::Slot => HASH_TAG_SLOT,
            MethodKind::Method => HASH_TAG_METHOD,
        };
        hasher = hasher
            .tag(tag)
            .string(&method.signature())
            .optional(method.return_type.as_deref());
    }
    hasher.finish()
}
