//! metabridge: foreign values as host objects
//!
//! Values owned by a foreign runtime are projected into a reflective host
//! object system. Each registered foreign type gets a synthesized host class;
//! each foreign value gets a proxy object whose property reads, writes,
//! method calls and signals are forwarded across the boundary as wire values.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Engine                      │
//! │                                              │
//! │  registry   - types and their factories      │
//! │  descriptor - type -> host class synthesis   │
//! │  proxy      - meta-call dispatch             │
//! │  connector  - host signals -> foreign calls  │
//! │  marshal    - Variant <-> WireValue          │
//! │                                              │
//! ├──────────────────────────────────────────────┤
//! │   ForeignRuntime hooks   │   host object tree│
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let registry = Registry::new();
//! let point = TypeDescriptor::builder("Point")
//!     .field("X", DataType::Number, 0)
//!     .field("Y", DataType::Number, 1)
//!     .method("Length", 0, 0, 1)
//!     .build();
//! let id = registry.register_type("geometry", 1, 0, point, ForeignSpec(1))?;
//!
//! let engine = Engine::new(runtime, registry);
//! let obj = engine.create(id, None)?;
//! engine.write(obj, "x", WireValue::Number(3.0))?;
//! let len = engine.invoke(obj, "length", vec![])?;
//! ```

pub mod config;
pub mod connector;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod host;
pub mod marshal;
mod object;
pub mod proxy;
pub mod registry;

pub use metabridge_wire as wire;
pub use metabridge_wire::{DataType, ForeignHandle, ListPropertyRef, ObjectId, Rgba, WireValue};

pub use config::{BridgeConfig, ConfigError};
pub use connector::{ConnectionId, ScratchChain};
pub use descriptor::{build_descriptor, BuildError, LayoutHash, MetaDescriptor, TypeDef, TypeDescriptor};
pub use engine::{DestroyOutcome, Engine};
pub use error::DispatchError;
pub use factory::{Factory, FactoryKind, FactoryStamp};
pub use hooks::{CallbackToken, ErrorHandle, FieldRef, ForeignRuntime, ForeignSpec, RenderTarget};
pub use host::{MetaCall, ScriptValue, Variant};
pub use proxy::{Lifecycle, ProxyFlavor, ProxyObject};
pub use registry::{RegisteredType, Registry, RegistrationError, TypeId};
