//! Declarative descriptions of foreign types.
//!
//! A [`TypeDescriptor`] lists the fields and methods a foreign type exposes.
//! It is immutable once built and carries a write-once slot for the class
//! synthesized from it (see [`build_descriptor`]).

mod layout;
mod meta;

pub use layout::{hash_class, LayoutHash};
pub use meta::{build_descriptor, MetaDescriptor, Resolved};

use std::sync::Arc;

use metabridge_wire::DataType;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hooks::FieldRef;
use crate::host::{MetaError, VARIANT_LIST_TYPE, VARIANT_TYPE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("type name must not be empty")]
    EmptyTypeName,

    #[error("type {type_name} declares a member with an empty name")]
    EmptyMemberName { type_name: String },

    #[error("type {type_name} declares \"{name}\" more than once")]
    DuplicateMember { type_name: String, name: String },

    #[error("field {type_name}.{name} cannot have kind {kind}")]
    FieldKind {
        type_name: String,
        name: String,
        kind: DataType,
    },

    #[error("method {type_name}.{name} must have kind method, not {kind}")]
    MethodKind {
        type_name: String,
        name: String,
        kind: DataType,
    },

    #[error(transparent)]
    Meta(#[from] MetaError),
}

fn no_index() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: DataType,
    /// Foreign field or method index; `-1` for computed fields.
    #[serde(default = "no_index")]
    pub index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<i32>,
    #[serde(default)]
    pub num_in: usize,
    #[serde(default)]
    pub num_out: usize,
}

impl MemberDescriptor {
    pub fn field_ref(&self) -> FieldRef {
        FieldRef {
            index: self.index,
            getter: self.getter,
            setter: self.setter,
        }
    }

    pub fn is_computed(&self) -> bool {
        self.getter.is_some() && self.index < 0
    }

    /// Host call signature, e.g. `move(Variant,Variant)`.
    pub fn signature(&self) -> String {
        let params = vec![VARIANT_TYPE; self.num_in];
        format!("{}({})", self.name, params.join(","))
    }

    pub fn result_type(&self) -> Option<&'static str> {
        match self.num_out {
            0 => None,
            1 => Some(VARIANT_TYPE),
            _ => Some(VARIANT_LIST_TYPE),
        }
    }
}

/// Lowers the leading run of capitals: `FooBar` → `fooBar`, `URLPath` →
/// `urlPath`, `ID` → `id`.
pub fn lowered_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<(usize, char)> = None;
    for (i, ch) in name.char_indices() {
        if !ch.is_uppercase() {
            if let Some((prev_i, p)) = prev {
                if prev_i == 0 || ch == '_' {
                    out.extend(p.to_lowercase());
                } else {
                    out.push(p);
                }
            }
            out.push_str(&name[i..]);
            return out;
        }
        if let Some((_, p)) = prev {
            out.extend(p.to_lowercase());
        }
        prev = Some((i, ch));
    }
    if let Some((_, p)) = prev {
        out.extend(p.to_lowercase());
    }
    out
}

#[derive(Debug)]
pub struct TypeDescriptor {
    type_name: String,
    fields: Vec<MemberDescriptor>,
    methods: Vec<MemberDescriptor>,
    paint: Option<i32>,
    meta: OnceCell<Arc<MetaDescriptor>>,
}

impl TypeDescriptor {
    pub fn builder(type_name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            def: TypeDef {
                name: type_name.into(),
                fields: Vec::new(),
                methods: Vec::new(),
                paint: None,
            },
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[MemberDescriptor] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberDescriptor] {
        &self.methods
    }

    pub fn field(&self, index: usize) -> Option<&MemberDescriptor> {
        self.fields.get(index)
    }

    pub fn method(&self, index: usize) -> Option<&MemberDescriptor> {
        self.methods.get(index)
    }

    /// Foreign paint method index, if the type renders itself.
    pub fn paint_method(&self) -> Option<i32> {
        self.paint
    }

    pub(crate) fn meta_cell(&self) -> &OnceCell<Arc<MetaDescriptor>> {
        &self.meta
    }
}

/// Serializable form of a type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<MemberDescriptor>,
    #[serde(default)]
    pub methods: Vec<MemberDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint: Option<i32>,
}

impl From<TypeDef> for TypeDescriptor {
    fn from(def: TypeDef) -> Self {
        let lower = |mut m: MemberDescriptor| {
            m.name = lowered_name(&m.name);
            m
        };
        TypeDescriptor {
            type_name: def.name,
            fields: def.fields.into_iter().map(lower).collect(),
            methods: def.methods.into_iter().map(lower).collect(),
            paint: def.paint,
            meta: OnceCell::new(),
        }
    }
}

pub struct TypeDescriptorBuilder {
    def: TypeDef,
}

impl TypeDescriptorBuilder {
    pub fn field(mut self, name: &str, kind: DataType, index: i32) -> Self {
        self.def.fields.push(MemberDescriptor {
            name: name.to_string(),
            kind,
            index,
            getter: None,
            setter: None,
            num_in: 0,
            num_out: 0,
        });
        self
    }

    /// A field backed by getter/setter methods instead of storage.
    pub fn computed_field(mut self, name: &str, kind: DataType, getter: i32, setter: Option<i32>) -> Self {
        self.def.fields.push(MemberDescriptor {
            name: name.to_string(),
            kind,
            index: no_index(),
            getter: Some(getter),
            setter,
            num_in: 0,
            num_out: 0,
        });
        self
    }

    pub fn list_field(mut self, name: &str, index: i32, setter: Option<i32>) -> Self {
        self.def.fields.push(MemberDescriptor {
            name: name.to_string(),
            kind: DataType::ListProperty,
            index,
            getter: None,
            setter,
            num_in: 0,
            num_out: 0,
        });
        self
    }

    pub fn method(mut self, name: &str, index: i32, num_in: usize, num_out: usize) -> Self {
        self.def.methods.push(MemberDescriptor {
            name: name.to_string(),
            kind: DataType::Method,
            index,
            getter: None,
            setter: None,
            num_in,
            num_out,
        });
        self
    }

    pub fn paint(mut self, method_index: i32) -> Self {
        self.def.paint = Some(method_index);
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(self.def.into())
    }
}
