//! Recording fake of the foreign runtime shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use metabridge::wire::{DataType, ForeignHandle, ListPropertyRef, ObjectId, WireValue};
use metabridge::{
    CallbackToken, Engine, ErrorHandle, FieldRef, ForeignRuntime, ForeignSpec, Registry,
    RenderTarget, TypeDescriptor,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ReadField(ForeignHandle, FieldRef),
    WriteField(ForeignHandle, FieldRef, WireValue),
    CallMethod(ForeignHandle, i32, Vec<WireValue>),
    Destroyed(ForeignHandle),
    Paint(ForeignHandle, i32, RenderTarget),
    SignalCall(CallbackToken, Vec<WireValue>),
    SignalDisconnect(CallbackToken),
    ListAppend(ForeignHandle, i32, ObjectId),
    ListClear(ForeignHandle, i32),
    Instantiate(ForeignSpec),
}

pub type Reentry = Rc<dyn Fn(&Engine)>;

#[derive(Default)]
pub struct RecordingRuntime {
    pub calls: RefCell<Vec<Call>>,
    /// Field storage keyed by handle and field (or getter) index.
    pub fields: RefCell<HashMap<(ForeignHandle, i32), WireValue>>,
    /// Results keyed by method index.
    pub results: RefCell<HashMap<i32, WireValue>>,
    pub lists: RefCell<HashMap<(ForeignHandle, i32), Vec<ObjectId>>>,
    pub errors: RefCell<Vec<String>>,
    pub panics: RefCell<Vec<String>>,
    /// Callbacks run from inside a hook, keyed by hook name.
    pub reentry: RefCell<HashMap<&'static str, Reentry>>,
    /// Observations recorded by reentry callbacks.
    pub notes: RefCell<Vec<String>>,
    next_handle: Cell<u64>,
}

impl RecordingRuntime {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn on(&self, hook: &'static str, f: impl Fn(&Engine) + 'static) {
        self.reentry.borrow_mut().insert(hook, Rc::new(f));
    }

    pub fn note(&self, note: impl Into<String>) {
        self.notes.borrow_mut().push(note.into());
    }

    pub fn set_field(&self, handle: ForeignHandle, index: i32, value: WireValue) {
        self.fields.borrow_mut().insert((handle, index), value);
    }

    pub fn set_result(&self, method: i32, value: WireValue) {
        self.results.borrow_mut().insert(method, value);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn reenter(&self, hook: &str, engine: &Engine) {
        let callback = self.reentry.borrow().get(hook).cloned();
        if let Some(callback) = callback {
            callback(engine);
        }
    }

    fn slot(field: FieldRef) -> i32 {
        field.getter.unwrap_or(field.index)
    }
}

impl ForeignRuntime for RecordingRuntime {
    fn read_field(&self, engine: &Engine, handle: ForeignHandle, field: FieldRef) -> WireValue {
        self.record(Call::ReadField(handle, field));
        self.reenter("read_field", engine);
        self.fields
            .borrow()
            .get(&(handle, Self::slot(field)))
            .cloned()
            .unwrap_or_default()
    }

    fn write_field(&self, engine: &Engine, handle: ForeignHandle, field: FieldRef, value: WireValue) {
        self.record(Call::WriteField(handle, field, value.clone()));
        self.fields.borrow_mut().insert((handle, Self::slot(field)), value);
        self.reenter("write_field", engine);
    }

    fn call_method(
        &self,
        engine: &Engine,
        handle: ForeignHandle,
        method_index: i32,
        args: Vec<WireValue>,
    ) -> Option<WireValue> {
        self.record(Call::CallMethod(handle, method_index, args));
        self.reenter("call_method", engine);
        self.results.borrow().get(&method_index).cloned()
    }

    fn destroyed(&self, engine: &Engine, handle: ForeignHandle) {
        self.record(Call::Destroyed(handle));
        self.reenter("destroyed", engine);
    }

    fn paint(&self, engine: &Engine, handle: ForeignHandle, paint_index: i32, target: RenderTarget) {
        self.record(Call::Paint(handle, paint_index, target));
        self.reenter("paint", engine);
    }

    fn signal_call(&self, engine: &Engine, token: CallbackToken, args: Vec<WireValue>) {
        self.record(Call::SignalCall(token, args));
        self.reenter("signal_call", engine);
    }

    fn signal_disconnect(&self, engine: &Engine, token: CallbackToken) {
        self.record(Call::SignalDisconnect(token));
        self.reenter("signal_disconnect", engine);
    }

    fn list_property_count(&self, _engine: &Engine, list: &ListPropertyRef) -> usize {
        self.lists
            .borrow()
            .get(&(list.handle, list.field_index))
            .map_or(0, Vec::len)
    }

    fn list_property_at(&self, _engine: &Engine, list: &ListPropertyRef, index: usize) -> ObjectId {
        self.lists.borrow()[&(list.handle, list.field_index)][index]
    }

    fn list_property_append(&self, _engine: &Engine, list: &ListPropertyRef, object: ObjectId) {
        self.record(Call::ListAppend(list.handle, list.field_index, object));
        self.lists
            .borrow_mut()
            .entry((list.handle, list.field_index))
            .or_default()
            .push(object);
    }

    fn list_property_clear(&self, _engine: &Engine, list: &ListPropertyRef) {
        self.record(Call::ListClear(list.handle, list.field_index));
        self.lists.borrow_mut().remove(&(list.handle, list.field_index));
    }

    fn instantiate(&self, _engine: &Engine, spec: ForeignSpec) -> ForeignHandle {
        self.record(Call::Instantiate(spec));
        let next = self.next_handle.get() + 1;
        self.next_handle.set(next);
        ForeignHandle(0x1000 + next)
    }

    fn register_error(&self, message: String) -> ErrorHandle {
        let mut errors = self.errors.borrow_mut();
        errors.push(message);
        ErrorHandle(errors.len() as u64)
    }

    fn panic(&self, message: &str) {
        self.panics.borrow_mut().push(message.to_string());
    }
}

pub fn engine() -> (Rc<RecordingRuntime>, Engine) {
    engine_with(Registry::new())
}

pub fn engine_with(registry: Rc<Registry>) -> (Rc<RecordingRuntime>, Engine) {
    let runtime = RecordingRuntime::new();
    let hooks: Rc<dyn ForeignRuntime> = runtime.clone();
    (runtime, Engine::new(hooks, registry))
}

/// Two plain fields, a list field and three methods.
pub fn gopher() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder("Gopher")
        .field("Name", DataType::String, 0)
        .field("Age", DataType::NumberI, 1)
        .list_field("Friends", 2, Some(7))
        .method("Dig", 0, 1, 1)
        .method("Rest", 1, 0, 0)
        .method("Split", 2, 2, 2)
        .build()
}

pub fn canvas() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder("Canvas")
        .field("Color", DataType::Color, 0)
        .method("Paint", 0, 1, 0)
        .paint(0)
        .build()
}
