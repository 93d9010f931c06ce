use metabridge_wire::{ObjectId, Rgba};

/// A value as seen by the embedded scripting context.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Int(i32),
    UInt(u32),
    String(String),
    /// Milliseconds since the Unix epoch, UTC.
    Date(i64),
    Color(Rgba),
    Opaque(u64),
    Array(Vec<ScriptValue>),
    /// Script object with string keys, in insertion order.
    Object(Vec<(String, ScriptValue)>),
    ObjectRef(ObjectId),
}

impl ScriptValue {
    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    /// Looks up a key on a script object.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Array(items) => items.get(index),
            _ => None,
        }
    }
}
