//! Generic meta-call entry point.
//!
//! Indices are absolute. Members below a proxy class's own offset belong to
//! the host base classes and are served from native storage; the proxy's own
//! range is routed to the foreign runtime through the hook interface.

use std::rc::Rc;

use metabridge_wire::{DataType, ForeignHandle, ObjectId, WireValue};
use tracing::trace;

use super::{DispatchGuard, ProxyObject};
use crate::descriptor::Resolved;
use crate::engine::Engine;
use crate::error::DispatchError;
use crate::host::{MetaCall, MetaClass, MethodKind, PropertyDef, StorageKind, Variant};
use crate::marshal::{pack, unpack_variant};

fn require_slots(call: MetaCall, args: &[Variant], expected: usize) -> Result<(), DispatchError> {
    if args.len() < expected {
        return Err(DispatchError::ArgumentSlots {
            call,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn out_of_range(class: &MetaClass, call: MetaCall, index: usize) -> DispatchError {
    DispatchError::IndexOutOfRange {
        class: class.name().to_string(),
        call,
        index,
    }
}

/// Checks a value against a property's storage kind.
pub(crate) fn check_storage(property: &PropertyDef, value: Variant) -> Result<Variant, DispatchError> {
    let mismatch = |got: &Variant| DispatchError::TypeMismatch {
        name: property.name.clone(),
        expected: property.storage.type_name().to_string(),
        got: got.type_name().to_string(),
    };
    match property.storage {
        StorageKind::Variant => Ok(value),
        StorageKind::ListProperty => match value {
            Variant::ListProperty(_) => Ok(value),
            other => Err(mismatch(&other)),
        },
        StorageKind::Typed(kind) => value.coerce(kind).map_err(|v| mismatch(&v)),
    }
}

impl Engine {
    /// Reads, writes or invokes member `index` of `obj`.
    ///
    /// Slot 0 of `args` carries the property value or the method result;
    /// method arguments follow from slot 1.
    pub fn meta_call(
        &self,
        obj: ObjectId,
        call: MetaCall,
        index: usize,
        args: &mut [Variant],
    ) -> Result<(), DispatchError> {
        let (class, proxy) = {
            let tree = self.tree.borrow();
            let slot = tree.get(obj).ok_or(DispatchError::NotAlive(obj))?;
            (slot.class.clone(), slot.proxy().cloned())
        };
        if self.config().trace_dispatch {
            trace!(object = %obj, ?call, index, class = class.name(), "meta call");
        }

        let own_start = match call {
            MetaCall::ReadProperty | MetaCall::WriteProperty => class.property_offset(),
            MetaCall::InvokeMethod => class.method_offset(),
        };
        match proxy {
            Some(proxy) if index >= own_start => {
                self.dispatch_proxy(&proxy, &class, call, index - own_start, args)
            }
            _ => self.dispatch_native(obj, &class, call, index, args),
        }
    }

    fn dispatch_proxy(
        &self,
        proxy: &Rc<ProxyObject>,
        class: &MetaClass,
        call: MetaCall,
        local: usize,
        args: &mut [Variant],
    ) -> Result<(), DispatchError> {
        let meta = proxy.meta().clone();
        let descriptor = proxy.descriptor().clone();
        let obj = proxy.object();
        let handle = proxy.handle();

        let resolved = meta.resolve(call, local);
        let offset = match call {
            MetaCall::InvokeMethod => class.method_offset(),
            _ => class.property_offset(),
        };
        let member = match resolved {
            Resolved::Field(i) | Resolved::ChangeSignal(i) => descriptor.field(i),
            Resolved::Method(m) => descriptor.method(m),
            Resolved::OutOfRange => None,
        };
        let Some(member) = member else {
            return Err(out_of_range(class, call, offset + local));
        };

        let _guard = DispatchGuard::enter(self, proxy.clone());
        match (resolved, call) {
            (Resolved::Field(_), MetaCall::ReadProperty) => {
                require_slots(call, args, 1)?;
                let value = self.runtime().read_field(self, handle, member.field_ref());
                args[0] = if member.kind == DataType::ListProperty {
                    self.expect_list_property(handle, &member.name, value)
                } else {
                    unpack_variant(self, value)
                };
            }
            (Resolved::Field(i), _) => {
                require_slots(call, args, 1)?;
                self.ensure_not_painting("write properties")?;
                let value = pack(self, &args[0]);
                self.runtime().write_field(self, handle, member.field_ref(), value);
                self.emit(obj, meta.change_signal(i), &[]);
            }
            (Resolved::ChangeSignal(i), _) => {
                self.emit(obj, meta.change_signal(i), &[]);
            }
            (Resolved::Method(_), _) => {
                let num_in = member.num_in;
                require_slots(call, args, num_in + 1)?;
                let wire: Vec<WireValue> = args[1..=num_in].iter().map(|a| pack(self, a)).collect();
                let result = self.runtime().call_method(self, handle, member.index, wire);
                if member.num_out > 0 {
                    args[0] = result.map(|v| unpack_variant(self, v)).unwrap_or_default();
                }
            }
            (Resolved::OutOfRange, _) => return Err(out_of_range(class, call, offset + local)),
        }
        Ok(())
    }

    fn expect_list_property(&self, handle: ForeignHandle, field: &str, value: WireValue) -> Variant {
        match value {
            WireValue::ListProperty(list) => Variant::ListProperty(list),
            other => self.fatal(&format!(
                "list field \"{field}\" of {handle} read back as {} instead of a list property",
                other.data_type()
            )),
        }
    }

    fn dispatch_native(
        &self,
        obj: ObjectId,
        class: &MetaClass,
        call: MetaCall,
        index: usize,
        args: &mut [Variant],
    ) -> Result<(), DispatchError> {
        match call {
            MetaCall::ReadProperty => {
                class.property(index).ok_or_else(|| out_of_range(class, call, index))?;
                require_slots(call, args, 1)?;
                args[0] = self
                    .tree
                    .borrow()
                    .get(obj)
                    .and_then(|slot| slot.properties.get(index).cloned())
                    .unwrap_or_default();
            }
            MetaCall::WriteProperty => {
                let property = class.property(index).ok_or_else(|| out_of_range(class, call, index))?;
                require_slots(call, args, 1)?;
                if !property.writable {
                    return Err(DispatchError::NotWritable {
                        class: class.name().to_string(),
                        name: property.name.clone(),
                    });
                }
                let value = check_storage(property, args[0].clone())?;
                let changed = self.store_native(obj, index, value);
                if let (true, Some(signal)) = (changed, property.notify) {
                    self.emit(obj, signal, &[]);
                }
            }
            MetaCall::InvokeMethod => {
                let method = class.method(index).ok_or_else(|| out_of_range(class, call, index))?;
                if method.kind == MethodKind::Signal {
                    self.emit(obj, index, args.get(1..).unwrap_or_default());
                    return Ok(());
                }
                let arity = method.params.len();
                require_slots(call, args, arity + 1)?;
                args[0] = match &method.handler {
                    Some(handler) => handler(self, obj, &args[1..=arity])?,
                    None => Variant::Invalid,
                };
            }
        }
        Ok(())
    }

    /// Writes native storage without type or writability checks. Returns
    /// whether the stored value changed.
    pub(crate) fn store_native(&self, obj: ObjectId, index: usize, value: Variant) -> bool {
        let mut tree = self.tree.borrow_mut();
        match tree.get_mut(obj).and_then(|slot| slot.properties.get_mut(index)) {
            Some(stored) if *stored != value => {
                *stored = value;
                true
            }
            _ => false,
        }
    }

    /// Reports a mutation made on the foreign side: fires the field's change
    /// signal on the proxy for `handle`.
    pub fn field_changed(&self, handle: ForeignHandle, field: usize) -> Result<(), DispatchError> {
        let obj = self
            .object_for_handle(handle)
            .ok_or(DispatchError::UnknownHandle(handle))?;
        let proxy = self.proxy(obj).ok_or(DispatchError::NotAProxy(obj))?;
        let meta = proxy.meta();
        if field >= meta.field_count() {
            return Err(DispatchError::UnknownField {
                type_name: proxy.descriptor().type_name().to_string(),
                index: field,
            });
        }
        self.emit(obj, meta.change_signal(field), &[]);
        Ok(())
    }
}
