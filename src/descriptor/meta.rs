use std::collections::HashSet;
use std::sync::Arc;

use metabridge_wire::DataType;
use tracing::debug;

use super::layout::{hash_class, LayoutHash};
use super::{BuildError, TypeDescriptor};
use crate::host::{
    object_class, painted_item_class, MetaCall, MetaClass, MetaClassBuilder, PropertyDef, StorageKind,
};

/// Host class synthesized from a [`TypeDescriptor`].
///
/// Own methods are laid out as `[F change signals][M methods]`, own
/// properties as `[F fields]`, where F and M are the descriptor's field and
/// method counts.
#[derive(Debug)]
pub struct MetaDescriptor {
    class: Arc<MetaClass>,
    field_count: usize,
    method_count: usize,
    layout: LayoutHash,
}

/// What a class-local index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Field(usize),
    ChangeSignal(usize),
    Method(usize),
    OutOfRange,
}

impl MetaDescriptor {
    pub fn class(&self) -> &Arc<MetaClass> {
        &self.class
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn method_count(&self) -> usize {
        self.method_count
    }

    pub fn layout_hash(&self) -> LayoutHash {
        self.layout
    }

    /// Absolute method index of a field's change signal.
    pub fn change_signal(&self, field: usize) -> usize {
        self.class.method_offset() + field
    }

    pub fn resolve(&self, call: MetaCall, local: usize) -> Resolved {
        match call {
            MetaCall::ReadProperty | MetaCall::WriteProperty if local < self.field_count => {
                Resolved::Field(local)
            }
            MetaCall::InvokeMethod if local < self.field_count => Resolved::ChangeSignal(local),
            MetaCall::InvokeMethod if local < self.field_count + self.method_count => {
                Resolved::Method(local - self.field_count)
            }
            _ => Resolved::OutOfRange,
        }
    }
}

/// Returns the class for `descriptor`, synthesizing it on first use.
///
/// The result is cached on the descriptor; later calls return the same `Arc`.
pub fn build_descriptor(descriptor: &TypeDescriptor) -> Result<Arc<MetaDescriptor>, BuildError> {
    descriptor
        .meta_cell()
        .get_or_try_init(|| synthesize(descriptor).map(Arc::new))
        .cloned()
}

fn validate(descriptor: &TypeDescriptor) -> Result<(), BuildError> {
    let type_name = descriptor.type_name();
    if type_name.is_empty() {
        return Err(BuildError::EmptyTypeName);
    }
    let mut seen = HashSet::new();
    for member in descriptor.fields().iter().chain(descriptor.methods()) {
        if member.name.is_empty() {
            return Err(BuildError::EmptyMemberName {
                type_name: type_name.to_string(),
            });
        }
        if !seen.insert(member.name.as_str()) {
            return Err(BuildError::DuplicateMember {
                type_name: type_name.to_string(),
                name: member.name.clone(),
            });
        }
    }
    for field in descriptor.fields() {
        if matches!(field.kind, DataType::Method | DataType::Unknown) {
            return Err(BuildError::FieldKind {
                type_name: type_name.to_string(),
                name: field.name.clone(),
                kind: field.kind,
            });
        }
    }
    for method in descriptor.methods() {
        if method.kind != DataType::Method {
            return Err(BuildError::MethodKind {
                type_name: type_name.to_string(),
                name: method.name.clone(),
                kind: method.kind,
            });
        }
    }
    Ok(())
}

fn synthesize(descriptor: &TypeDescriptor) -> Result<MetaDescriptor, BuildError> {
    validate(descriptor)?;

    let superclass = if descriptor.paint_method().is_some() {
        painted_item_class()
    } else {
        object_class()
    };
    let mut builder = MetaClassBuilder::new(descriptor.type_name(), Some(superclass));

    for field in descriptor.fields() {
        let signal = builder.add_signal(&format!("__{}Changed()", field.name))?;
        let storage = match field.kind {
            DataType::ListProperty => StorageKind::ListProperty,
            _ => StorageKind::Variant,
        };
        builder.add_property(PropertyDef::new(field.name.clone(), storage).notify(signal))?;
    }
    for method in descriptor.methods() {
        builder.add_method(&method.signature(), method.result_type())?;
    }

    let class = builder.build();
    let layout = hash_class(&class);
    debug!(
        type_name = descriptor.type_name(),
        fields = descriptor.fields().len(),
        methods = descriptor.methods().len(),
        %layout,
        "synthesized class"
    );
    Ok(MetaDescriptor {
        class,
        field_count: descriptor.fields().len(),
        method_count: descriptor.methods().len(),
        layout,
    })
}
