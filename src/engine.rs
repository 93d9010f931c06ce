//! The bridge context.
//!
//! An [`Engine`] owns the host object tree, the index from foreign handles to
//! their proxies, the event connectors and the scripting context. It is
//! single-threaded: all state sits behind `RefCell`/`Cell`, and no borrow is
//! held while a hook runs, so hooks may call back into the engine.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use metabridge_wire::{decode_with_limits, ForeignHandle, ObjectId, WireError, WireValue};
use tracing::{debug, error, warn};

use crate::config::BridgeConfig;
use crate::connector::ConnectorTable;
use crate::descriptor::{build_descriptor, TypeDescriptor};
use crate::error::DispatchError;
use crate::factory::FactoryKind;
use crate::hooks::{ErrorHandle, ForeignRuntime, RenderTarget};
use crate::host::tree::{ObjectBody, ObjectTree};
use crate::host::{object_class, MetaClass, ScriptValue, Variant, DESTROYED_SIGNAL, OBJECT_NAME_PROPERTY};
use crate::marshal::{pack_script, unpack_script};
use crate::proxy::{DispatchGuard, Lifecycle, ProxyFlavor, ProxyObject};
use crate::registry::{Registry, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Destroyed,
    /// A dispatch for the object is in flight; it is destroyed when that
    /// dispatch returns.
    Deferred,
    AlreadyGone,
}

pub struct Engine {
    runtime: Rc<dyn ForeignRuntime>,
    registry: Rc<Registry>,
    config: BridgeConfig,
    pub(crate) tree: RefCell<ObjectTree>,
    handles: RefCell<HashMap<ForeignHandle, ObjectId>>,
    pub(crate) connectors: RefCell<ConnectorTable>,
    context: RefCell<HashMap<String, ScriptValue>>,
    singletons: RefCell<HashMap<TypeId, ObjectId>>,
    deferred: RefCell<Vec<ObjectId>>,
    pending_paints: RefCell<Vec<ObjectId>>,
    painting: Cell<bool>,
    root: ObjectId,
}

impl Engine {
    pub fn new(runtime: Rc<dyn ForeignRuntime>, registry: Rc<Registry>) -> Self {
        Self::with_config(runtime, registry, BridgeConfig::default())
    }

    pub fn with_config(runtime: Rc<dyn ForeignRuntime>, registry: Rc<Registry>, config: BridgeConfig) -> Self {
        let mut tree = ObjectTree::default();
        let root = tree.insert_with(object_class(), None, |_| ObjectBody::Native);
        if let Some(slot) = tree.get_mut(root) {
            slot.properties[OBJECT_NAME_PROPERTY] = Variant::from("root");
        }
        Self {
            runtime,
            registry,
            config,
            tree: RefCell::new(tree),
            handles: RefCell::new(HashMap::new()),
            connectors: RefCell::new(ConnectorTable::default()),
            context: RefCell::new(HashMap::new()),
            singletons: RefCell::new(HashMap::new()),
            deferred: RefCell::new(Vec::new()),
            pending_paints: RefCell::new(Vec::new()),
            painting: Cell::new(false),
            root,
        }
    }

    pub fn runtime(&self) -> &dyn ForeignRuntime {
        self.runtime.as_ref()
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Owner of singletons and other engine-lifetime objects.
    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn is_alive(&self, obj: ObjectId) -> bool {
        self.tree.borrow().contains(obj)
    }

    pub fn object_count(&self) -> usize {
        self.tree.borrow().len()
    }

    pub fn class_of(&self, obj: ObjectId) -> Result<Arc<MetaClass>, DispatchError> {
        self.tree
            .borrow()
            .get(obj)
            .map(|slot| slot.class.clone())
            .ok_or(DispatchError::NotAlive(obj))
    }

    pub fn proxy(&self, obj: ObjectId) -> Option<Rc<ProxyObject>> {
        self.tree.borrow().get(obj).and_then(|slot| slot.proxy().cloned())
    }

    pub fn object_for_handle(&self, handle: ForeignHandle) -> Option<ObjectId> {
        self.handles.borrow().get(&handle).copied()
    }

    pub(crate) fn ensure_not_painting(&self, what: &'static str) -> Result<(), DispatchError> {
        if self.painting.get() {
            return Err(DispatchError::PaintInProgress(what));
        }
        Ok(())
    }

    /// A parent, when given, must be a live object.
    pub(crate) fn ensure_live_parent(&self, parent: Option<ObjectId>) -> Result<(), DispatchError> {
        match parent {
            Some(p) if !self.is_alive(p) => Err(DispatchError::NotAlive(p)),
            _ => Ok(()),
        }
    }

    /// Instantiates a native host class.
    pub fn create_object(&self, class: &Arc<MetaClass>, parent: Option<ObjectId>) -> Result<ObjectId, DispatchError> {
        self.ensure_not_painting("create objects")?;
        self.ensure_live_parent(parent)?;
        Ok(self
            .tree
            .borrow_mut()
            .insert_with(class.clone(), parent, |_| ObjectBody::Native))
    }

    /// Returns the proxy object for `handle`, creating it if the handle has
    /// no live proxy yet.
    pub fn wrap(
        &self,
        handle: ForeignHandle,
        descriptor: &Arc<TypeDescriptor>,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId, DispatchError> {
        self.ensure_not_painting("create objects")?;
        if let Some(existing) = self.object_for_handle(handle) {
            return Ok(existing);
        }
        self.ensure_live_parent(parent)?;
        let meta = build_descriptor(descriptor)?;

        let mut proxy = None;
        let id = self.tree.borrow_mut().insert_with(meta.class().clone(), parent, |id| {
            let p = Rc::new(ProxyObject::new(id, handle, descriptor.clone(), meta.clone()));
            proxy = Some(p.clone());
            ObjectBody::Proxy(p)
        });
        self.handles.borrow_mut().insert(handle, id);
        if let Some(proxy) = proxy {
            proxy.set_state(Lifecycle::Live);
        }
        debug!(%handle, object = %id, type_name = descriptor.type_name(), "wrapped foreign value");
        Ok(id)
    }

    /// Creates an instance of a registered type through its factory.
    /// Singleton types are only reachable through [`Engine::singleton`].
    pub fn create(&self, type_id: TypeId, parent: Option<ObjectId>) -> Result<ObjectId, DispatchError> {
        let factory = self.registry.factory(type_id).ok_or(DispatchError::UnknownType(type_id))?;
        if factory.kind() == FactoryKind::Singleton {
            return Err(DispatchError::SingletonType(type_id));
        }
        factory.construct(self, parent)
    }

    /// The engine-wide instance of a registered singleton type.
    pub fn singleton(&self, type_id: TypeId) -> Result<ObjectId, DispatchError> {
        let existing = self.singletons.borrow().get(&type_id).copied();
        if let Some(obj) = existing.filter(|obj| self.is_alive(*obj)) {
            return Ok(obj);
        }
        let factory = self.registry.factory(type_id).ok_or(DispatchError::UnknownType(type_id))?;
        if factory.kind() != FactoryKind::Singleton {
            return Err(DispatchError::NotASingleton(type_id));
        }
        let obj = factory.construct(self, Some(self.root))?;
        self.singletons.borrow_mut().insert(type_id, obj);
        Ok(obj)
    }

    /// Destroys `obj` and its children.
    ///
    /// Observers of `destroyed()` run first, then the object's connectors are
    /// disconnected, then children are destroyed. The foreign runtime hears
    /// about a proxy exactly once, after it has left the tree.
    pub fn destroy(&self, obj: ObjectId) -> DestroyOutcome {
        let proxy = {
            let mut tree = self.tree.borrow_mut();
            let Some(slot) = tree.get_mut(obj) else {
                return DestroyOutcome::AlreadyGone;
            };
            if slot.dying {
                return DestroyOutcome::AlreadyGone;
            }
            if let Some(proxy) = slot.proxy() {
                if proxy.in_flight() > 0 {
                    proxy.defer_destroy();
                    debug!(object = %obj, "destroy deferred until dispatch returns");
                    return DestroyOutcome::Deferred;
                }
            }
            slot.dying = true;
            slot.proxy().cloned()
        };

        self.emit(obj, DESTROYED_SIGNAL, &[]);
        self.disconnect_object(obj);
        for child in self.children(obj) {
            self.destroy(child);
        }
        self.tree.borrow_mut().remove(obj);
        self.pending_paints.borrow_mut().retain(|o| *o != obj);

        if let Some(proxy) = proxy {
            self.handles.borrow_mut().remove(&proxy.handle());
            proxy.set_state(Lifecycle::Destroyed);
            debug!(object = %obj, handle = %proxy.handle(), "proxy destroyed");
            self.runtime.destroyed(self, proxy.handle());
        }
        DestroyOutcome::Destroyed
    }

    /// Queues `obj` for destruction on the next [`process_deferred`](Self::process_deferred).
    pub fn destroy_later(&self, obj: ObjectId) {
        let mut deferred = self.deferred.borrow_mut();
        if !deferred.contains(&obj) {
            deferred.push(obj);
        }
    }

    /// Destroys everything queued by `destroy_later`; returns how many
    /// objects were actually destroyed.
    pub fn process_deferred(&self) -> usize {
        let queued = std::mem::take(&mut *self.deferred.borrow_mut());
        queued
            .into_iter()
            .filter(|obj| self.destroy(*obj) == DestroyOutcome::Destroyed)
            .count()
    }

    pub fn set_parent(&self, obj: ObjectId, parent: Option<ObjectId>) -> Result<(), DispatchError> {
        let mut tree = self.tree.borrow_mut();
        if !tree.contains(obj) {
            return Err(DispatchError::NotAlive(obj));
        }
        if let Some(parent) = parent {
            if !tree.contains(parent) {
                return Err(DispatchError::NotAlive(parent));
            }
            if parent == obj || tree.is_ancestor(obj, parent) {
                return Err(DispatchError::ParentCycle { child: obj, parent });
            }
        }
        tree.reparent(obj, parent);
        Ok(())
    }

    pub fn parent(&self, obj: ObjectId) -> Option<ObjectId> {
        self.tree.borrow().get(obj).and_then(|slot| slot.parent)
    }

    pub fn children(&self, obj: ObjectId) -> Vec<ObjectId> {
        self.tree
            .borrow()
            .get(obj)
            .map(|slot| slot.children.clone())
            .unwrap_or_default()
    }

    /// Runs the foreign paint method of a paintable proxy.
    pub fn paint(&self, obj: ObjectId, target: RenderTarget) -> Result<(), DispatchError> {
        let proxy = match self.proxy(obj) {
            Some(proxy) => proxy,
            None if self.is_alive(obj) => return Err(DispatchError::NotPaintable(obj)),
            None => return Err(DispatchError::NotAlive(obj)),
        };
        let ProxyFlavor::Paintable { paint_index } = proxy.flavor() else {
            return Err(DispatchError::NotPaintable(obj));
        };
        self.ensure_not_painting("paint")?;

        let _guard = DispatchGuard::enter(self, proxy.clone());
        self.painting.set(true);
        self.runtime.paint(self, proxy.handle(), paint_index, target);
        self.painting.set(false);
        Ok(())
    }

    pub fn schedule_paint(&self, obj: ObjectId) {
        let paintable = self
            .proxy(obj)
            .is_some_and(|p| matches!(p.flavor(), ProxyFlavor::Paintable { .. }));
        let mut pending = self.pending_paints.borrow_mut();
        if paintable && !pending.contains(&obj) {
            pending.push(obj);
        }
    }

    /// Objects that asked for a repaint since the last call.
    pub fn take_pending_paints(&self) -> Vec<ObjectId> {
        std::mem::take(&mut *self.pending_paints.borrow_mut())
    }

    /// Publishes a value to the scripting context.
    pub fn set_context_property(&self, name: impl Into<String>, value: WireValue) {
        let value = unpack_script(self, value);
        self.context.borrow_mut().insert(name.into(), value);
    }

    pub fn context_property(&self, name: &str) -> WireValue {
        let value = self.context.borrow().get(name).cloned();
        match value {
            Some(value) => pack_script(self, &value),
            None => WireValue::Invalid,
        }
    }

    pub fn script_value(&self, name: &str) -> Option<ScriptValue> {
        self.context.borrow().get(name).cloned()
    }

    /// Decodes an envelope buffer under the configured limits.
    pub fn decode_wire(&self, bytes: &[u8]) -> Result<WireValue, WireError> {
        decode_with_limits(bytes, &self.config.limits)
    }

    /// Hands a recoverable error to the foreign runtime.
    pub fn report<T>(&self, result: Result<T, DispatchError>) -> Result<T, ErrorHandle> {
        result.map_err(|err| {
            warn!(%err, "operation failed");
            self.runtime.register_error(err.to_string())
        })
    }

    /// Aborts on a protocol violation. The foreign runtime is told first.
    pub fn fatal(&self, message: &str) -> ! {
        error!(message, "protocol violation");
        self.runtime.panic(message);
        panic!("metabridge protocol violation: {message}");
    }

    /// Destroys every remaining top-level object, the root included.
    pub fn shutdown(&self) {
        let roots = self.tree.borrow().roots();
        for obj in roots {
            self.destroy(obj);
        }
        self.deferred.borrow_mut().clear();
        self.context.borrow_mut().clear();
    }
}
