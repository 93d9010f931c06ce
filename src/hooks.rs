//! Calls the bridge makes into the foreign runtime.
//!
//! Every hook receives the [`Engine`] it was called from, so the foreign side
//! may re-enter the bridge (read other properties, emit events, destroy
//! objects) while a hook is running. The engine never holds a borrow of its
//! own state across a hook call.

use metabridge_wire::{ForeignHandle, ListPropertyRef, ObjectId, WireValue};

use crate::engine::Engine;

/// Locates a field on the foreign side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Plain storage index, `-1` for computed fields.
    pub index: i32,
    pub getter: Option<i32>,
    pub setter: Option<i32>,
}

/// Error value produced by the foreign runtime's error constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorHandle(pub u64);

/// Foreign callback subscribed to a host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(pub u64);

/// Opaque render context handed to paint hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub u64);

/// Foreign-side construction recipe bound to a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignSpec(pub u64);

pub trait ForeignRuntime {
    fn read_field(&self, engine: &Engine, handle: ForeignHandle, field: FieldRef) -> WireValue;

    fn write_field(&self, engine: &Engine, handle: ForeignHandle, field: FieldRef, value: WireValue);

    /// Returns `None` for methods without outputs.
    fn call_method(
        &self,
        engine: &Engine,
        handle: ForeignHandle,
        method_index: i32,
        args: Vec<WireValue>,
    ) -> Option<WireValue>;

    /// The proxy for `handle` is gone. Called exactly once per proxy.
    fn destroyed(&self, engine: &Engine, handle: ForeignHandle);

    fn paint(&self, engine: &Engine, handle: ForeignHandle, paint_index: i32, target: RenderTarget);

    fn signal_call(&self, engine: &Engine, token: CallbackToken, args: Vec<WireValue>);

    /// The connector for `token` is gone. Called exactly once per connector.
    fn signal_disconnect(&self, engine: &Engine, token: CallbackToken);

    fn list_property_count(&self, engine: &Engine, list: &ListPropertyRef) -> usize;

    fn list_property_at(&self, engine: &Engine, list: &ListPropertyRef, index: usize) -> ObjectId;

    fn list_property_append(&self, engine: &Engine, list: &ListPropertyRef, object: ObjectId);

    fn list_property_clear(&self, engine: &Engine, list: &ListPropertyRef);

    /// Creates a fresh foreign value for a registered type.
    fn instantiate(&self, engine: &Engine, spec: ForeignSpec) -> ForeignHandle;

    fn register_error(&self, message: String) -> ErrorHandle;

    /// Last notification before the bridge aborts on a protocol violation.
    fn panic(&self, message: &str);
}
