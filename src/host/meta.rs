//! Class descriptors of the host object system.
//!
//! Members are addressed by absolute index: a class's own properties start at
//! `property_offset` (the total property count of its superclass chain) and
//! its own methods at `method_offset`. Lookups walk the chain from the most
//! derived class towards the root.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use thiserror::Error;

use metabridge_wire::ObjectId;

use super::variant::{ValueKind, Variant, LIST_PROPERTY_TYPE, VARIANT_TYPE};
use crate::engine::Engine;
use crate::error::DispatchError;

/// Operation requested through the generic meta-call entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaCall {
    ReadProperty,
    WriteProperty,
    InvokeMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Signal,
    Slot,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Holds any dynamic value.
    Variant,
    ListProperty,
    Typed(ValueKind),
}

impl StorageKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StorageKind::Variant => VARIANT_TYPE,
            StorageKind::ListProperty => LIST_PROPERTY_TYPE,
            StorageKind::Typed(kind) => kind.type_name(),
        }
    }

    pub(crate) fn default_value(&self) -> Variant {
        match self {
            StorageKind::Typed(kind) => kind.default_value(),
            _ => Variant::Invalid,
        }
    }
}

/// Native implementation of a slot or method.
pub type NativeHandler =
    Arc<dyn Fn(&Engine, ObjectId, &[Variant]) -> Result<Variant, DispatchError> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error("malformed method signature: {0:?}")]
    MalformedSignature(String),

    #[error("property \"{property}\" notifies through {index}, which is not a signal")]
    InvalidNotify { property: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub storage: StorageKind,
    /// Absolute index of the change signal.
    pub notify: Option<usize>,
    pub writable: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, storage: StorageKind) -> Self {
        Self {
            name: name.into(),
            storage,
            notify: None,
            writable: true,
        }
    }

    pub fn notify(mut self, signal: usize) -> Self {
        self.notify = Some(signal);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub handler: Option<NativeHandler>,
}

impl MethodDef {
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }

    pub fn is_invokable(&self) -> bool {
        matches!(self.kind, MethodKind::Slot | MethodKind::Method)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("signature", &self.signature())
            .field("kind", &self.kind)
            .field("return_type", &self.return_type)
            .field("native", &self.handler.is_some())
            .finish()
    }
}

/// Splits `name(T1,T2)` into its name and parameter types.
pub fn parse_signature(signature: &str) -> Result<(String, Vec<String>), MetaError> {
    let malformed = || MetaError::MalformedSignature(signature.to_string());
    let open = signature.find('(').ok_or_else(malformed)?;
    let inner = signature[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
    let name = signature[..open].trim();
    if name.is_empty() || inner.contains(['(', ')']) {
        return Err(malformed());
    }
    if inner.trim().is_empty() {
        return Ok((name.to_string(), Vec::new()));
    }
    let params: Vec<String> = inner.split(',').map(|p| p.trim().to_string()).collect();
    if params.iter().any(String::is_empty) {
        return Err(malformed());
    }
    Ok((name.to_string(), params))
}

#[derive(Debug)]
pub struct MetaClass {
    name: String,
    superclass: Option<Arc<MetaClass>>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    property_offset: usize,
    method_offset: usize,
}

impl MetaClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Arc<MetaClass>> {
        self.superclass.as_ref()
    }

    pub fn property_offset(&self) -> usize {
        self.property_offset
    }

    pub fn method_offset(&self) -> usize {
        self.method_offset
    }

    /// Total property count including superclasses.
    pub fn property_count(&self) -> usize {
        self.property_offset + self.properties.len()
    }

    pub fn method_count(&self) -> usize {
        self.method_offset + self.methods.len()
    }

    pub fn own_properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn own_methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn property(&self, index: usize) -> Option<&PropertyDef> {
        if index >= self.property_offset {
            self.properties.get(index - self.property_offset)
        } else {
            self.superclass.as_ref()?.property(index)
        }
    }

    pub fn method(&self, index: usize) -> Option<&MethodDef> {
        if index >= self.method_offset {
            self.methods.get(index - self.method_offset)
        } else {
            self.superclass.as_ref()?.method(index)
        }
    }

    /// Most-derived property with this name.
    pub fn index_of_property(&self, name: &str) -> Option<usize> {
        (0..self.property_count())
            .rev()
            .find(|&i| self.property(i).is_some_and(|p| p.name == name))
    }

    pub fn inherits(&self, name: &str) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.name == name {
                return true;
            }
            class = c.superclass.as_deref();
        }
        false
    }
}

pub struct MetaClassBuilder {
    name: String,
    superclass: Option<Arc<MetaClass>>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    property_offset: usize,
    method_offset: usize,
}

impl MetaClassBuilder {
    pub fn new(name: impl Into<String>, superclass: Option<Arc<MetaClass>>) -> Self {
        let (property_offset, method_offset) = superclass
            .as_ref()
            .map_or((0, 0), |s| (s.property_count(), s.method_count()));
        Self {
            name: name.into(),
            superclass,
            properties: Vec::new(),
            methods: Vec::new(),
            property_offset,
            method_offset,
        }
    }

    fn push_method(
        &mut self,
        signature: &str,
        kind: MethodKind,
        return_type: Option<&str>,
        handler: Option<NativeHandler>,
    ) -> Result<usize, MetaError> {
        let (name, params) = parse_signature(signature)?;
        Ok(self.push_def(MethodDef {
            name,
            kind,
            params,
            return_type: return_type.map(str::to_string),
            handler,
        }))
    }

    /// Returns the absolute index of the new signal.
    pub fn add_signal(&mut self, signature: &str) -> Result<usize, MetaError> {
        self.push_method(signature, MethodKind::Signal, None, None)
    }

    pub fn add_method(&mut self, signature: &str, return_type: Option<&str>) -> Result<usize, MetaError> {
        self.push_method(signature, MethodKind::Method, return_type, None)
    }

    pub fn add_slot(&mut self, signature: &str, handler: NativeHandler) -> Result<usize, MetaError> {
        self.push_method(signature, MethodKind::Slot, None, Some(handler))
    }

    pub fn add_native_method(
        &mut self,
        signature: &str,
        return_type: Option<&str>,
        handler: NativeHandler,
    ) -> Result<usize, MetaError> {
        self.push_method(signature, MethodKind::Method, return_type, Some(handler))
    }

    /// Returns the absolute index of the new property.
    pub fn add_property(&mut self, property: PropertyDef) -> Result<usize, MetaError> {
        if let Some(index) = property.notify {
            let is_signal = if index >= self.method_offset {
                self.methods.get(index - self.method_offset)
            } else {
                self.superclass.as_ref().and_then(|s| s.method(index))
            }
            .is_some_and(|m| m.kind == MethodKind::Signal);
            if !is_signal {
                return Err(MetaError::InvalidNotify {
                    property: property.name,
                    index,
                });
            }
        }
        Ok(self.push_property(property))
    }

    pub fn build(self) -> Arc<MetaClass> {
        Arc::new(MetaClass {
            name: self.name,
            superclass: self.superclass,
            properties: self.properties,
            methods: self.methods,
            property_offset: self.property_offset,
            method_offset: self.method_offset,
        })
    }
}

pub const OBJECT_CLASS: &str = "Object";
pub const PAINTED_ITEM_CLASS: &str = "PaintedItem";
pub const PLAIN_OBJECT_CLASS: &str = "PlainObject";

/// `destroyed()` on the root class.
pub const DESTROYED_SIGNAL: usize = 0;
pub const OBJECT_NAME_PROPERTY: usize = 0;

fn nullary(name: &str, kind: MethodKind, handler: Option<NativeHandler>) -> MethodDef {
    MethodDef {
        name: name.to_string(),
        kind,
        params: Vec::new(),
        return_type: None,
        handler,
    }
}

impl MetaClassBuilder {
    fn push_def(&mut self, def: MethodDef) -> usize {
        self.methods.push(def);
        self.method_offset + self.methods.len() - 1
    }

    fn push_property(&mut self, property: PropertyDef) -> usize {
        self.properties.push(property);
        self.property_offset + self.properties.len() - 1
    }
}

static OBJECT: Lazy<Arc<MetaClass>> = Lazy::new(|| {
    let mut b = MetaClassBuilder::new(OBJECT_CLASS, None);
    b.push_def(nullary("destroyed", MethodKind::Signal, None));
    let name_changed = b.push_def(nullary("objectNameChanged", MethodKind::Signal, None));
    b.push_def(nullary(
        "deleteLater",
        MethodKind::Slot,
        Some(Arc::new(|engine: &Engine, obj: ObjectId, _: &[Variant]| -> Result<Variant, DispatchError> {
            engine.destroy_later(obj);
            Ok(Variant::Invalid)
        })),
    ));
    b.push_property(
        PropertyDef::new("objectName", StorageKind::Typed(ValueKind::String)).notify(name_changed),
    );
    b.build()
});

static PAINTED_ITEM: Lazy<Arc<MetaClass>> = Lazy::new(|| {
    let mut b = MetaClassBuilder::new(PAINTED_ITEM_CLASS, Some(OBJECT.clone()));
    let width_changed = b.push_def(nullary("widthChanged", MethodKind::Signal, None));
    let height_changed = b.push_def(nullary("heightChanged", MethodKind::Signal, None));
    b.push_def(nullary(
        "update",
        MethodKind::Slot,
        Some(Arc::new(|engine: &Engine, obj: ObjectId, _: &[Variant]| -> Result<Variant, DispatchError> {
            engine.schedule_paint(obj);
            Ok(Variant::Invalid)
        })),
    ));
    b.push_property(
        PropertyDef::new("width", StorageKind::Typed(ValueKind::Double)).notify(width_changed),
    );
    b.push_property(
        PropertyDef::new("height", StorageKind::Typed(ValueKind::Double)).notify(height_changed),
    );
    b.build()
});

static PLAIN_OBJECT: Lazy<Arc<MetaClass>> = Lazy::new(|| {
    let mut b = MetaClassBuilder::new(PLAIN_OBJECT_CLASS, Some(OBJECT.clone()));
    b.push_property(PropertyDef::new("plainType", StorageKind::Typed(ValueKind::String)).read_only());
    b.push_property(PropertyDef::new("plainAddr", StorageKind::Typed(ValueKind::Pointer)).read_only());
    b.build()
});

/// Root of every class hierarchy.
pub fn object_class() -> Arc<MetaClass> {
    OBJECT.clone()
}

/// Base of objects that render through a paint callback.
pub fn painted_item_class() -> Arc<MetaClass> {
    PAINTED_ITEM.clone()
}

/// Transient wrapper for raw values of unregistered host types.
pub fn plain_object_class() -> Arc<MetaClass> {
    PLAIN_OBJECT.clone()
}
