//! Per-type construction entry points.
//!
//! The host's native instantiation path calls a zero-argument constructor.
//! Each registered type gets a [`Factory`] whose closure captures the type's
//! descriptor and foreign spec at registration time.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use metabridge_wire::ObjectId;

use crate::descriptor::{build_descriptor, BuildError, LayoutHash, TypeDescriptor};
use crate::engine::Engine;
use crate::error::DispatchError;
use crate::hooks::ForeignSpec;
use crate::registry::{RegistrationError, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Instance,
    Singleton,
}

/// What a factory was built from. Factories for descriptors with the same
/// layout differ only in the bound spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryStamp {
    pub layout: LayoutHash,
    pub spec: ForeignSpec,
}

type Constructor = Box<dyn Fn(&Engine, Option<ObjectId>) -> Result<ObjectId, DispatchError>>;

pub struct Factory {
    type_id: TypeId,
    kind: FactoryKind,
    stamp: FactoryStamp,
    construct: Constructor,
}

impl Factory {
    pub fn new(
        type_id: TypeId,
        descriptor: Arc<TypeDescriptor>,
        spec: ForeignSpec,
        kind: FactoryKind,
    ) -> Result<Self, BuildError> {
        let meta = build_descriptor(&descriptor)?;
        let stamp = FactoryStamp {
            layout: meta.layout_hash(),
            spec,
        };
        let construct: Constructor = Box::new(move |engine: &Engine, parent: Option<ObjectId>| {
            // checked before instantiating so no foreign value is left unwrapped
            engine.ensure_live_parent(parent)?;
            let handle = engine.runtime().instantiate(engine, spec);
            engine.wrap(handle, &descriptor, parent)
        });
        Ok(Self {
            type_id,
            kind,
            stamp,
            construct,
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn kind(&self) -> FactoryKind {
        self.kind
    }

    pub fn stamp(&self) -> FactoryStamp {
        self.stamp
    }

    /// Asks the foreign runtime for a fresh value and wraps it.
    pub fn construct(&self, engine: &Engine, parent: Option<ObjectId>) -> Result<ObjectId, DispatchError> {
        (self.construct)(engine, parent)
    }
}

#[derive(Default)]
pub struct FactoryRegistry {
    factories: RefCell<HashMap<TypeId, Rc<Factory>>>,
}

impl FactoryRegistry {
    /// Installs `factory`; a type gets at most one.
    pub fn install(&self, factory: Factory) -> Result<Rc<Factory>, RegistrationError> {
        match self.factories.borrow_mut().entry(factory.type_id) {
            Entry::Occupied(_) => Err(RegistrationError::FactoryInstalled(factory.type_id)),
            Entry::Vacant(slot) => Ok(slot.insert(Rc::new(factory)).clone()),
        }
    }

    pub fn get(&self, type_id: TypeId) -> Option<Rc<Factory>> {
        self.factories.borrow().get(&type_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.borrow().is_empty()
    }
}
