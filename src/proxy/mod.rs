//! Host objects that stand in for foreign values.

pub(crate) mod dispatch;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use metabridge_wire::{ForeignHandle, ObjectId};

use crate::descriptor::{MetaDescriptor, TypeDescriptor};
use crate::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyFlavor {
    Plain,
    Paintable { paint_index: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Live,
    Destroyed,
}

#[derive(Debug)]
pub struct ProxyObject {
    object: ObjectId,
    handle: ForeignHandle,
    descriptor: Arc<TypeDescriptor>,
    meta: Arc<MetaDescriptor>,
    flavor: ProxyFlavor,
    state: Cell<Lifecycle>,
    in_flight: Cell<u32>,
    destroy_pending: Cell<bool>,
}

impl ProxyObject {
    pub(crate) fn new(
        object: ObjectId,
        handle: ForeignHandle,
        descriptor: Arc<TypeDescriptor>,
        meta: Arc<MetaDescriptor>,
    ) -> Self {
        let flavor = match descriptor.paint_method() {
            Some(paint_index) => ProxyFlavor::Paintable { paint_index },
            None => ProxyFlavor::Plain,
        };
        Self {
            object,
            handle,
            descriptor,
            meta,
            flavor,
            state: Cell::new(Lifecycle::Constructed),
            in_flight: Cell::new(0),
            destroy_pending: Cell::new(false),
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn handle(&self) -> ForeignHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn meta(&self) -> &Arc<MetaDescriptor> {
        &self.meta
    }

    pub fn flavor(&self) -> ProxyFlavor {
        self.flavor
    }

    pub fn state(&self) -> Lifecycle {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: Lifecycle) {
        self.state.set(state);
    }

    /// Number of dispatches for this proxy currently on the stack.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.get()
    }

    pub(crate) fn defer_destroy(&self) {
        self.destroy_pending.set(true);
    }

    pub fn destroy_pending(&self) -> bool {
        self.destroy_pending.get()
    }
}

/// Marks a proxy as busy for the lifetime of the guard. When the outermost
/// guard drops, a destruction requested in the meantime is carried out.
pub(crate) struct DispatchGuard<'e> {
    engine: &'e Engine,
    proxy: Rc<ProxyObject>,
}

impl<'e> DispatchGuard<'e> {
    pub fn enter(engine: &'e Engine, proxy: Rc<ProxyObject>) -> Self {
        proxy.in_flight.set(proxy.in_flight.get() + 1);
        Self { engine, proxy }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.proxy.in_flight.get().saturating_sub(1);
        self.proxy.in_flight.set(depth);
        if depth == 0 && self.proxy.destroy_pending.replace(false) {
            self.engine.destroy(self.proxy.object);
        }
    }
}
