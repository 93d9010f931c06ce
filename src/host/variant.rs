use metabridge_wire::{ListPropertyRef, ObjectId, Rgba};

use super::ScriptValue;

pub const VARIANT_TYPE: &str = "Variant";
pub const VARIANT_LIST_TYPE: &str = "VariantList";
pub const LIST_PROPERTY_TYPE: &str = "ListProperty<Object>";

/// The host's native dynamic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Invalid,
    String(String),
    Bool(bool),
    Double(f64),
    Int(i32),
    UInt(u32),
    Pointer(u64),
    Color(Rgba),
    /// Milliseconds since the Unix epoch, UTC.
    DateTime(i64),
    List(Vec<Variant>),
    Map(Vec<(String, Variant)>),
    Object(ObjectId),
    Script(ScriptValue),
    /// Materialized list of objects, e.g. the contents of a list property.
    ObjectList(Vec<ObjectId>),
    ListProperty(ListPropertyRef),
    /// A host value kind the bridge has no wire form for.
    Unsupported(String),
    /// A raw instance of a host type without runtime type registration.
    Unregistered { type_name: String, addr: u64 },
}

/// Storage kinds a typed native property may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bool,
    Double,
    Int,
    UInt,
    Pointer,
    Color,
    DateTime,
    Object,
    List,
    Map,
}

impl ValueKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::String => "String",
            ValueKind::Bool => "bool",
            ValueKind::Double => "double",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Pointer => "pointer",
            ValueKind::Color => "Color",
            ValueKind::DateTime => "DateTime",
            ValueKind::Object => "Object*",
            ValueKind::List => VARIANT_LIST_TYPE,
            ValueKind::Map => "VariantMap",
        }
    }

    pub fn default_value(self) -> Variant {
        match self {
            ValueKind::String => Variant::String(String::new()),
            ValueKind::Bool => Variant::Bool(false),
            ValueKind::Double => Variant::Double(0.0),
            ValueKind::Int => Variant::Int(0),
            ValueKind::UInt => Variant::UInt(0),
            ValueKind::Pointer => Variant::Pointer(0),
            ValueKind::Color => Variant::Color(Rgba::default()),
            ValueKind::DateTime => Variant::DateTime(0),
            ValueKind::Object | ValueKind::List | ValueKind::Map => Variant::Invalid,
        }
    }
}

impl Variant {
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Variant::String(_) => ValueKind::String,
            Variant::Bool(_) => ValueKind::Bool,
            Variant::Double(_) => ValueKind::Double,
            Variant::Int(_) => ValueKind::Int,
            Variant::UInt(_) => ValueKind::UInt,
            Variant::Pointer(_) => ValueKind::Pointer,
            Variant::Color(_) => ValueKind::Color,
            Variant::DateTime(_) => ValueKind::DateTime,
            Variant::Object(_) => ValueKind::Object,
            Variant::List(_) => ValueKind::List,
            Variant::Map(_) => ValueKind::Map,
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> &str {
        match self {
            Variant::Invalid => "invalid",
            Variant::Script(_) => "ScriptValue",
            Variant::ObjectList(_) => "ObjectList",
            Variant::ListProperty(_) => LIST_PROPERTY_TYPE,
            Variant::Unsupported(name) => name,
            Variant::Unregistered { type_name, .. } => type_name,
            other => other.kind().map_or("invalid", ValueKind::type_name),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Variant::Invalid)
    }

    /// Converts to `kind` where the host would do so implicitly.
    pub fn coerce(self, kind: ValueKind) -> Result<Variant, Variant> {
        match (self, kind) {
            (v, k) if v.kind() == Some(k) => Ok(v),
            (Variant::Int(n), ValueKind::Double) => Ok(Variant::Double(n as f64)),
            (Variant::UInt(n), ValueKind::Double) => Ok(Variant::Double(n as f64)),
            (Variant::Invalid, ValueKind::Object) => Ok(Variant::Invalid),
            (v, _) => Err(v),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Variant::Object(id) => Some(*id),
            Variant::Script(ScriptValue::ObjectRef(id)) => Some(*id),
            _ => None,
        }
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::UInt(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<ObjectId> for Variant {
    fn from(v: ObjectId) -> Self {
        Variant::Object(v)
    }
}
