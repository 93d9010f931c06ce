use metabridge_wire::{ForeignHandle, ObjectId};
use thiserror::Error;

use crate::connector::ConnectionId;
use crate::descriptor::BuildError;
use crate::host::MetaCall;
use crate::registry::TypeId;

/// Recoverable failures of object operations. These are returned to the
/// caller and can be turned into a foreign error with [`Engine::report`].
///
/// [`Engine::report`]: crate::engine::Engine::report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{0} is not alive")]
    NotAlive(ObjectId),

    #[error("cannot access non-existent property \"{name}\" on type {class}")]
    NoSuchProperty { class: String, name: String },

    #[error("cannot set non-writable property \"{name}\" on type {class}")]
    NotWritable { class: String, name: String },

    #[error("cannot set property \"{name}\" with type {expected} to value of {got}")]
    TypeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    #[error("object does not expose a method \"{name}\"")]
    NoSuchMethod { name: String },

    #[error("method \"{name}\" has too few parameters for provided arguments ({declared} < {provided})")]
    TooFewParameters {
        name: String,
        declared: usize,
        provided: usize,
    },

    #[error("invalid parameters to method \"{name}\": {reason}")]
    InvocationFailed { name: String, reason: String },

    #[error("object does not expose a \"{name}\" signal")]
    NoSuchEvent { name: String },

    #[error("signal \"{name}\" has too few parameters for provided function ({declared} < {requested})")]
    InsufficientParameters {
        name: String,
        declared: usize,
        requested: usize,
    },

    #[error("{0} is not backed by a foreign value")]
    NotAProxy(ObjectId),

    #[error("{0} cannot paint")]
    NotPaintable(ObjectId),

    #[error("cannot {0} while painting")]
    PaintInProgress(&'static str),

    #[error("{call:?} index {index} is out of range for type {class}")]
    IndexOutOfRange {
        class: String,
        call: MetaCall,
        index: usize,
    },

    #[error("{call:?} needs {expected} argument slots, got {got}")]
    ArgumentSlots {
        call: MetaCall,
        expected: usize,
        got: usize,
    },

    #[error("field index {index} is out of range for type {type_name}")]
    UnknownField { type_name: String, index: usize },

    #[error("no live object for {0}")]
    UnknownHandle(ForeignHandle),

    #[error("type {0} is not registered")]
    UnknownType(TypeId),

    #[error("type {0} is registered as a singleton")]
    SingletonType(TypeId),

    #[error("type {0} is not registered as a singleton")]
    NotASingleton(TypeId),

    #[error("no connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("parenting {child} under {parent} would create a cycle")]
    ParentCycle { child: ObjectId, parent: ObjectId },

    #[error(transparent)]
    Build(#[from] BuildError),
}
