//! Minimal host object system the bridge projects foreign values into:
//! dynamic values, class descriptors with inheritance offsets, and an
//! ownership tree of live objects.

mod meta;
mod script;
pub(crate) mod tree;
mod variant;

pub use meta::{
    object_class, painted_item_class, parse_signature, plain_object_class, MetaCall, MetaClass,
    MetaClassBuilder, MetaError, MethodDef, MethodKind, NativeHandler, PropertyDef, StorageKind,
    DESTROYED_SIGNAL, OBJECT_CLASS, OBJECT_NAME_PROPERTY, PAINTED_ITEM_CLASS, PLAIN_OBJECT_CLASS,
};
pub use script::ScriptValue;
pub use variant::{ValueKind, Variant, LIST_PROPERTY_TYPE, VARIANT_LIST_TYPE, VARIANT_TYPE};
