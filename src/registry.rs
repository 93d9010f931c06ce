//! Registration surface for foreign types.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::descriptor::{BuildError, TypeDescriptor};
use crate::factory::{Factory, FactoryKind, FactoryRegistry};
use crate::hooks::ForeignSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("type name must not be empty")]
    EmptyName,

    #[error("{uri} already has a type named {name}")]
    Duplicate { uri: String, name: String },

    #[error("cannot build class for {name}: {source}")]
    Build {
        name: String,
        #[source]
        source: BuildError,
    },

    #[error("a factory is already installed for {0}")]
    FactoryInstalled(TypeId),
}

#[derive(Debug, Clone)]
pub struct RegisteredType {
    pub id: TypeId,
    pub uri: String,
    pub version: (u32, u32),
    pub descriptor: Arc<TypeDescriptor>,
    pub spec: ForeignSpec,
    pub kind: FactoryKind,
}

impl RegisteredType {
    pub fn name(&self) -> &str {
        self.descriptor.type_name()
    }
}

#[derive(Default)]
pub struct Registry {
    types: RefCell<Vec<RegisteredType>>,
    factories: FactoryRegistry,
}

impl Registry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Makes `descriptor` instantiable by name within `uri`.
    pub fn register_type(
        &self,
        uri: &str,
        major: u32,
        minor: u32,
        descriptor: Arc<TypeDescriptor>,
        spec: ForeignSpec,
    ) -> Result<TypeId, RegistrationError> {
        self.register(uri, (major, minor), descriptor, spec, FactoryKind::Instance)
    }

    /// Like [`register_type`](Self::register_type), but each engine holds a
    /// single instance owned by its root object.
    pub fn register_singleton(
        &self,
        uri: &str,
        major: u32,
        minor: u32,
        descriptor: Arc<TypeDescriptor>,
        spec: ForeignSpec,
    ) -> Result<TypeId, RegistrationError> {
        self.register(uri, (major, minor), descriptor, spec, FactoryKind::Singleton)
    }

    fn register(
        &self,
        uri: &str,
        version: (u32, u32),
        descriptor: Arc<TypeDescriptor>,
        spec: ForeignSpec,
        kind: FactoryKind,
    ) -> Result<TypeId, RegistrationError> {
        let result = self.try_register(uri, version, descriptor, spec, kind);
        if let Err(err) = &result {
            warn!(uri, %err, "type registration failed");
        }
        result
    }

    fn try_register(
        &self,
        uri: &str,
        version: (u32, u32),
        descriptor: Arc<TypeDescriptor>,
        spec: ForeignSpec,
        kind: FactoryKind,
    ) -> Result<TypeId, RegistrationError> {
        let name = descriptor.type_name().to_string();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.lookup(uri, &name).is_some() {
            return Err(RegistrationError::Duplicate {
                uri: uri.to_string(),
                name,
            });
        }

        let id = TypeId(self.types.borrow().len() as u32 + 1);
        let factory = Factory::new(id, descriptor.clone(), spec, kind).map_err(|source| {
            RegistrationError::Build {
                name: name.clone(),
                source,
            }
        })?;
        self.factories.install(factory)?;

        self.types.borrow_mut().push(RegisteredType {
            id,
            uri: uri.to_string(),
            version,
            descriptor,
            spec,
            kind,
        });
        info!(uri, name = %name, %id, ?kind, "registered type");
        Ok(id)
    }

    pub fn lookup(&self, uri: &str, name: &str) -> Option<TypeId> {
        self.types
            .borrow()
            .iter()
            .find(|t| t.uri == uri && t.name() == name)
            .map(|t| t.id)
    }

    pub fn get(&self, id: TypeId) -> Option<RegisteredType> {
        self.types.borrow().iter().find(|t| t.id == id).cloned()
    }

    pub fn factory(&self, id: TypeId) -> Option<Rc<Factory>> {
        self.factories.get(id)
    }

    pub fn types(&self) -> Vec<RegisteredType> {
        self.types.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }
}
