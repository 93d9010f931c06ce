//! Conversion between host values and wire values.
//!
//! Packing inspects the runtime kind of a host value. Unpacking is
//! parameterized by destination: property storage receives [`Variant`]s,
//! the scripting context receives [`ScriptValue`]s. Both destinations share
//! the scalar rules and only differ in how composites and object references
//! are materialized.

use metabridge_wire::{ListPropertyRef, ObjectId, Rgba, WireValue};
use tracing::warn;

use crate::engine::Engine;
use crate::host::{ScriptValue, Variant};

pub fn pack(engine: &Engine, value: &Variant) -> WireValue {
    match value {
        Variant::Invalid => WireValue::Invalid,
        Variant::String(s) => WireValue::String(s.clone()),
        Variant::Bool(b) => WireValue::Bool(*b),
        Variant::Double(n) => WireValue::Number(*n),
        Variant::Int(n) => WireValue::Int(*n),
        Variant::UInt(n) => WireValue::Uint(*n),
        Variant::Pointer(p) => WireValue::Opaque(*p),
        Variant::Color(c) => WireValue::Color(*c),
        Variant::DateTime(ms) => WireValue::Time(*ms),
        Variant::List(items) => WireValue::List(items.iter().map(|v| pack(engine, v)).collect()),
        Variant::Map(entries) => WireValue::Map(
            entries
                .iter()
                .map(|(k, v)| (WireValue::String(k.clone()), pack(engine, v)))
                .collect(),
        ),
        Variant::Object(id) => pack_object(engine, *id),
        Variant::Script(v) => pack_script(engine, v),
        Variant::ObjectList(ids) => {
            WireValue::List(ids.iter().map(|id| pack_object(engine, *id)).collect())
        }
        Variant::ListProperty(list) => WireValue::ListProperty(*list),
        Variant::Unsupported(type_name) | Variant::Unregistered { type_name, .. } => {
            unsupported(engine, type_name)
        }
    }
}

pub fn pack_script(engine: &Engine, value: &ScriptValue) -> WireValue {
    match value {
        ScriptValue::Undefined | ScriptValue::Null => WireValue::Invalid,
        ScriptValue::Bool(b) => WireValue::Bool(*b),
        ScriptValue::Number(n) => WireValue::Number(*n),
        ScriptValue::Int(n) => WireValue::Int(*n),
        ScriptValue::UInt(n) => WireValue::Uint(*n),
        ScriptValue::String(s) => WireValue::String(s.clone()),
        ScriptValue::Date(ms) => WireValue::Time(*ms),
        ScriptValue::Color(c) => WireValue::Color(*c),
        ScriptValue::Opaque(p) => WireValue::Opaque(*p),
        ScriptValue::Array(items) => {
            WireValue::List(items.iter().map(|v| pack_script(engine, v)).collect())
        }
        ScriptValue::Object(entries) => WireValue::Map(
            entries
                .iter()
                .map(|(k, v)| (WireValue::String(k.clone()), pack_script(engine, v)))
                .collect(),
        ),
        ScriptValue::ObjectRef(id) => pack_object(engine, *id),
    }
}

/// Objects backed by a foreign value travel as their handle.
fn pack_object(engine: &Engine, id: ObjectId) -> WireValue {
    match engine.proxy(id) {
        Some(proxy) => WireValue::Foreign(proxy.handle()),
        None => WireValue::Object(id),
    }
}

fn unsupported(engine: &Engine, type_name: &str) -> WireValue {
    if engine.config().strict_packing {
        engine.fatal(&format!("cannot pack host value of type {type_name}"));
    }
    warn!(type_name, "host value has no wire form");
    WireValue::Unknown
}

/// Property-storage destination.
pub fn unpack_variant(engine: &Engine, value: WireValue) -> Variant {
    unpack::<Generic>(engine, value)
}

/// Scripting-context destination.
pub fn unpack_script(engine: &Engine, value: WireValue) -> ScriptValue {
    unpack::<Script>(engine, value)
}

trait Destination {
    type Value;

    fn invalid() -> Self::Value;
    fn string(s: String) -> Self::Value;
    fn bool(b: bool) -> Self::Value;
    fn number(n: f64) -> Self::Value;
    fn int(n: i32) -> Self::Value;
    fn uint(n: u32) -> Self::Value;
    fn opaque(p: u64) -> Self::Value;
    fn color(c: Rgba) -> Self::Value;
    fn time(ms: i64) -> Self::Value;
    fn list(items: Vec<Self::Value>) -> Self::Value;
    fn map(entries: Vec<(String, Self::Value)>) -> Self::Value;
    fn object(id: ObjectId) -> Self::Value;
    fn list_property(engine: &Engine, list: ListPropertyRef) -> Self::Value;
}

struct Generic;

impl Destination for Generic {
    type Value = Variant;

    fn invalid() -> Variant {
        Variant::Invalid
    }
    fn string(s: String) -> Variant {
        Variant::String(s)
    }
    fn bool(b: bool) -> Variant {
        Variant::Bool(b)
    }
    fn number(n: f64) -> Variant {
        Variant::Double(n)
    }
    fn int(n: i32) -> Variant {
        Variant::Int(n)
    }
    fn uint(n: u32) -> Variant {
        Variant::UInt(n)
    }
    fn opaque(p: u64) -> Variant {
        Variant::Pointer(p)
    }
    fn color(c: Rgba) -> Variant {
        Variant::Color(c)
    }
    fn time(ms: i64) -> Variant {
        Variant::DateTime(ms)
    }
    fn list(items: Vec<Variant>) -> Variant {
        Variant::List(items)
    }
    fn map(entries: Vec<(String, Variant)>) -> Variant {
        Variant::Map(entries)
    }
    fn object(id: ObjectId) -> Variant {
        Variant::Object(id)
    }
    fn list_property(_: &Engine, list: ListPropertyRef) -> Variant {
        Variant::ListProperty(list)
    }
}

struct Script;

impl Destination for Script {
    type Value = ScriptValue;

    fn invalid() -> ScriptValue {
        ScriptValue::Null
    }
    fn string(s: String) -> ScriptValue {
        ScriptValue::String(s)
    }
    fn bool(b: bool) -> ScriptValue {
        ScriptValue::Bool(b)
    }
    fn number(n: f64) -> ScriptValue {
        ScriptValue::Number(n)
    }
    fn int(n: i32) -> ScriptValue {
        ScriptValue::Int(n)
    }
    fn uint(n: u32) -> ScriptValue {
        ScriptValue::UInt(n)
    }
    fn opaque(p: u64) -> ScriptValue {
        ScriptValue::Opaque(p)
    }
    fn color(c: Rgba) -> ScriptValue {
        ScriptValue::Color(c)
    }
    fn time(ms: i64) -> ScriptValue {
        ScriptValue::Date(ms)
    }
    fn list(items: Vec<ScriptValue>) -> ScriptValue {
        ScriptValue::Array(items)
    }
    fn map(entries: Vec<(String, ScriptValue)>) -> ScriptValue {
        ScriptValue::Object(entries)
    }
    fn object(id: ObjectId) -> ScriptValue {
        ScriptValue::ObjectRef(id)
    }
    fn list_property(engine: &Engine, _: ListPropertyRef) -> ScriptValue {
        engine.fatal("list property descriptors cannot enter the scripting context")
    }
}

fn unpack<D: Destination>(engine: &Engine, value: WireValue) -> D::Value {
    match value {
        WireValue::Unknown => engine.fatal("received a value of unknown data type"),
        WireValue::Invalid => D::invalid(),
        WireValue::String(s) => D::string(s),
        WireValue::Bool(b) => D::bool(b),
        WireValue::Number(n) => D::number(n),
        WireValue::Int(n) => D::int(n),
        WireValue::Uint(n) => D::uint(n),
        WireValue::Opaque(p) => D::opaque(p),
        WireValue::Color(c) => D::color(c),
        WireValue::Time(ms) => D::time(ms),
        WireValue::List(items) => {
            D::list(items.into_iter().map(|item| unpack::<D>(engine, item)).collect())
        }
        WireValue::Map(entries) => D::map(
            entries
                .into_iter()
                .map(|(k, v)| (map_key(engine, k), unpack::<D>(engine, v)))
                .collect(),
        ),
        WireValue::Object(id) => D::object(id),
        WireValue::Foreign(handle) => match engine.object_for_handle(handle) {
            Some(id) => D::object(id),
            None => engine.fatal(&format!("{handle} has no live proxy")),
        },
        WireValue::ListProperty(list) => D::list_property(engine, list),
    }
}

fn map_key(engine: &Engine, key: WireValue) -> String {
    match key {
        WireValue::String(s) => s,
        WireValue::Int(n) => n.to_string(),
        WireValue::Uint(n) => n.to_string(),
        WireValue::Number(n) => n.to_string(),
        WireValue::Bool(b) => b.to_string(),
        other => engine.fatal(&format!("map key of type {} is not a scalar", other.data_type())),
    }
}
