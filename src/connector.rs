//! Subscriptions of foreign callbacks to host signals.

use std::collections::BTreeMap;
use std::fmt;

use metabridge_wire::{ObjectId, WireValue};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::DispatchError;
use crate::hooks::CallbackToken;
use crate::host::tree::ObjectBody;
use crate::host::{plain_object_class, MetaClass, MethodKind, Variant};
use crate::marshal::{pack, unpack_variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Connector {
    id: ConnectionId,
    source: ObjectId,
    signal: usize,
    arg_count: usize,
    token: CallbackToken,
}

/// Live connectors, in connection order.
#[derive(Default)]
pub(crate) struct ConnectorTable {
    next: u64,
    connectors: BTreeMap<ConnectionId, Connector>,
}

impl ConnectorTable {
    fn insert(&mut self, source: ObjectId, signal: usize, arg_count: usize, token: CallbackToken) -> ConnectionId {
        self.next += 1;
        let id = ConnectionId(self.next);
        self.connectors.insert(
            id,
            Connector {
                id,
                source,
                signal,
                arg_count,
                token,
            },
        );
        id
    }

    fn on_signal(&self, source: ObjectId, signal: usize) -> Vec<Connector> {
        self.connectors
            .values()
            .filter(|c| c.source == source && c.signal == signal)
            .cloned()
            .collect()
    }

    fn from_source(&self, source: ObjectId) -> Vec<ConnectionId> {
        self.connectors
            .values()
            .filter(|c| c.source == source)
            .map(|c| c.id)
            .collect()
    }
}

/// Most-derived signal named `name`.
fn find_signal(class: &MetaClass, name: &str) -> Option<usize> {
    (0..class.method_count())
        .rev()
        .find(|&i| class.method(i).is_some_and(|m| m.kind == MethodKind::Signal && m.name == name))
}

/// Transient wrappers for raw values of unregistered host types, destroyed
/// in reverse creation order when the chain drops.
pub struct ScratchChain<'e> {
    engine: &'e Engine,
    objects: Vec<ObjectId>,
}

impl<'e> ScratchChain<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            objects: Vec::new(),
        }
    }

    pub fn wrap(&mut self, type_name: &str, addr: u64) -> ObjectId {
        let class = plain_object_class();
        let first = class.property_offset();
        let obj = self
            .engine
            .tree
            .borrow_mut()
            .insert_with(class, None, |_| ObjectBody::Native);
        self.engine.store_native(obj, first, Variant::from(type_name));
        self.engine.store_native(obj, first + 1, Variant::Pointer(addr));
        self.objects.push(obj);
        obj
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Drop for ScratchChain<'_> {
    fn drop(&mut self) {
        while let Some(obj) = self.objects.pop() {
            self.engine.destroy(obj);
        }
    }
}

impl Engine {
    /// Subscribes `token` to the signal `name` of `obj`, passing the first
    /// `arg_count` signal arguments on each emission.
    ///
    /// The most-derived signal with that name decides; it must declare at
    /// least `arg_count` parameters.
    pub fn connect(
        &self,
        obj: ObjectId,
        name: &str,
        arg_count: usize,
        token: CallbackToken,
    ) -> Result<ConnectionId, DispatchError> {
        let class = self.class_of(obj)?;
        let signal = find_signal(&class, name).ok_or_else(|| DispatchError::NoSuchEvent {
            name: name.to_string(),
        })?;
        let declared = class.method(signal).map_or(0, |m| m.params.len());
        if declared < arg_count {
            return Err(DispatchError::InsufficientParameters {
                name: name.to_string(),
                declared,
                requested: arg_count,
            });
        }
        let id = self.connectors.borrow_mut().insert(obj, signal, arg_count, token);
        debug!(object = %obj, signal = name, connection = %id, "connected");
        Ok(id)
    }

    pub fn disconnect(&self, id: ConnectionId) -> Result<(), DispatchError> {
        let connector = self
            .connectors
            .borrow_mut()
            .connectors
            .remove(&id)
            .ok_or(DispatchError::UnknownConnection(id))?;
        self.runtime().signal_disconnect(self, connector.token);
        Ok(())
    }

    pub(crate) fn disconnect_object(&self, obj: ObjectId) {
        let ids = self.connectors.borrow().from_source(obj);
        for id in ids {
            match self.disconnect(id) {
                // a destroyed() observer may already have removed it
                Ok(()) | Err(DispatchError::UnknownConnection(_)) => {}
                Err(err) => warn!(%err, object = %obj, connection = %id, "disconnect failed"),
            }
        }
    }

    pub fn connection_count(&self, obj: ObjectId) -> usize {
        self.connectors.borrow().from_source(obj).len()
    }

    /// Delivers an emission of signal `signal` on `obj` to every connector.
    pub fn emit(&self, obj: ObjectId, signal: usize, args: &[Variant]) {
        let targets = self.connectors.borrow().on_signal(obj, signal);
        for connector in targets {
            if !self.connectors.borrow().connectors.contains_key(&connector.id) {
                continue;
            }
            self.forward(&connector, args);
        }
    }

    /// Emits the most-derived signal named `name` with foreign arguments.
    pub fn emit_by_name(&self, obj: ObjectId, name: &str, args: Vec<WireValue>) -> Result<(), DispatchError> {
        let class = self.class_of(obj)?;
        let signal = find_signal(&class, name).ok_or_else(|| DispatchError::NoSuchEvent {
            name: name.to_string(),
        })?;
        let declared = class.method(signal).map_or(0, |m| m.params.len());
        if declared < args.len() {
            return Err(DispatchError::InsufficientParameters {
                name: name.to_string(),
                declared,
                requested: args.len(),
            });
        }
        let args: Vec<Variant> = args.into_iter().map(|a| unpack_variant(self, a)).collect();
        self.emit(obj, signal, &args);
        Ok(())
    }

    fn forward(&self, connector: &Connector, args: &[Variant]) {
        let mut scratch = ScratchChain::new(self);
        let wire: Vec<WireValue> = (0..connector.arg_count)
            .map(|i| match args.get(i) {
                Some(Variant::Unregistered { type_name, addr }) => {
                    WireValue::Object(scratch.wrap(type_name, *addr))
                }
                Some(value) => pack(self, value),
                None => WireValue::Invalid,
            })
            .collect();
        self.runtime().signal_call(self, connector.token, wire);
        drop(scratch);
    }
}
