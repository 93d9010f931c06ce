//! Name-based operations on live objects.
//!
//! These resolve a member by name against the object's class and then go
//! through [`Engine::meta_call`], so proxies and native objects behave alike.

use metabridge_wire::{ForeignHandle, ListPropertyRef, ObjectId, WireValue};

use crate::engine::Engine;
use crate::error::DispatchError;
use crate::host::{MetaCall, MetaClass, Variant, LIST_PROPERTY_TYPE, OBJECT_NAME_PROPERTY};
use crate::marshal::{pack, unpack_variant};
use crate::proxy::dispatch::check_storage;

fn no_such_property(class: &MetaClass, name: &str) -> DispatchError {
    DispatchError::NoSuchProperty {
        class: class.name().to_string(),
        name: name.to_string(),
    }
}

/// Most-derived invokable method named `name`, preferring one whose arity
/// matches `arity` exactly.
fn find_method(class: &MetaClass, name: &str, arity: usize) -> Result<usize, DispatchError> {
    let named = |i: &usize| {
        class
            .method(*i)
            .is_some_and(|m| m.is_invokable() && m.name == name)
    };
    let exact = (0..class.method_count())
        .rev()
        .filter(named)
        .find(|&i| class.method(i).is_some_and(|m| m.params.len() == arity));
    if let Some(index) = exact {
        return Ok(index);
    }

    let index = (0..class.method_count())
        .rev()
        .find(named)
        .ok_or_else(|| DispatchError::NoSuchMethod {
            name: name.to_string(),
        })?;
    let declared = class.method(index).map_or(0, |m| m.params.len());
    if declared < arity {
        return Err(DispatchError::TooFewParameters {
            name: name.to_string(),
            declared,
            provided: arity,
        });
    }
    Ok(index)
}

impl Engine {
    pub fn property(&self, obj: ObjectId, name: &str) -> Result<Variant, DispatchError> {
        let class = self.class_of(obj)?;
        let index = class
            .index_of_property(name)
            .ok_or_else(|| no_such_property(&class, name))?;
        let mut slots = [Variant::Invalid];
        self.meta_call(obj, MetaCall::ReadProperty, index, &mut slots)?;
        let [value] = slots;
        Ok(value)
    }

    pub fn set_property(&self, obj: ObjectId, name: &str, value: Variant) -> Result<(), DispatchError> {
        let class = self.class_of(obj)?;
        let index = class
            .index_of_property(name)
            .ok_or_else(|| no_such_property(&class, name))?;
        let property = class
            .property(index)
            .ok_or_else(|| no_such_property(&class, name))?;
        if !property.writable {
            return Err(DispatchError::NotWritable {
                class: class.name().to_string(),
                name: name.to_string(),
            });
        }
        let value = check_storage(property, value)?;
        self.meta_call(obj, MetaCall::WriteProperty, index, &mut [value])
    }

    /// Reads a property and packs it for the foreign runtime.
    pub fn read(&self, obj: ObjectId, name: &str) -> Result<WireValue, DispatchError> {
        let value = self.property(obj, name)?;
        Ok(pack(self, &value))
    }

    pub fn write(&self, obj: ObjectId, name: &str, value: WireValue) -> Result<(), DispatchError> {
        let value = unpack_variant(self, value);
        self.set_property(obj, name, value)
    }

    /// Calls the method `name` with foreign arguments.
    ///
    /// A method whose arity matches the argument count exactly wins. Otherwise
    /// the most-derived method of that name is used, with missing trailing
    /// arguments left invalid; it must declare at least as many parameters as
    /// were provided.
    pub fn invoke(&self, obj: ObjectId, name: &str, args: Vec<WireValue>) -> Result<WireValue, DispatchError> {
        let class = self.class_of(obj)?;
        let index = find_method(&class, name, args.len())?;
        let declared = class.method(index).map_or(0, |m| m.params.len());

        let mut slots = vec![Variant::Invalid; declared + 1];
        for (slot, arg) in slots[1..].iter_mut().zip(args) {
            *slot = unpack_variant(self, arg);
        }
        self.meta_call(obj, MetaCall::InvokeMethod, index, &mut slots)
            .map_err(|err| match err {
                DispatchError::NotAlive(_) => err,
                other => DispatchError::InvocationFailed {
                    name: name.to_string(),
                    reason: other.to_string(),
                },
            })?;
        Ok(pack(self, &slots[0]))
    }

    pub fn object_name(&self, obj: ObjectId) -> Result<String, DispatchError> {
        let tree = self.tree.borrow();
        let slot = tree.get(obj).ok_or(DispatchError::NotAlive(obj))?;
        Ok(slot
            .properties
            .get(OBJECT_NAME_PROPERTY)
            .and_then(Variant::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// First descendant of `obj` named `name`, searched depth first.
    pub fn find_child(&self, obj: ObjectId, name: &str) -> Result<Option<ObjectId>, DispatchError> {
        if !self.is_alive(obj) {
            return Err(DispatchError::NotAlive(obj));
        }
        for child in self.children(obj) {
            if self.object_name(child)? == name {
                return Ok(Some(child));
            }
            if let Some(found) = self.find_child(child, name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub fn type_name(&self, obj: ObjectId) -> Result<String, DispatchError> {
        Ok(self.class_of(obj)?.name().to_string())
    }

    pub fn foreign_handle(&self, obj: ObjectId) -> Result<ForeignHandle, DispatchError> {
        if !self.is_alive(obj) {
            return Err(DispatchError::NotAlive(obj));
        }
        self.proxy(obj)
            .map(|p| p.handle())
            .ok_or(DispatchError::NotAProxy(obj))
    }

    /// Owner of `list` and the name of the field it belongs to.
    fn list_owner(&self, list: &ListPropertyRef) -> Result<(ObjectId, String), DispatchError> {
        let obj = self
            .object_for_handle(list.handle)
            .ok_or(DispatchError::UnknownHandle(list.handle))?;
        let proxy = self.proxy(obj).ok_or(DispatchError::NotAProxy(obj))?;
        let name = proxy
            .descriptor()
            .fields()
            .iter()
            .find(|f| f.index == list.field_index)
            .map(|f| f.name.clone())
            .ok_or_else(|| DispatchError::UnknownField {
                type_name: proxy.descriptor().type_name().to_string(),
                index: list.field_index.max(0) as usize,
            })?;
        Ok((obj, name))
    }

    fn writable_list(&self, list: &ListPropertyRef) -> Result<(), DispatchError> {
        let (obj, name) = self.list_owner(list)?;
        if list.setter_index.is_none() {
            return Err(DispatchError::NotWritable {
                class: self.type_name(obj)?,
                name,
            });
        }
        self.ensure_not_painting("modify list properties")
    }

    pub fn list_count(&self, list: &ListPropertyRef) -> Result<usize, DispatchError> {
        self.list_owner(list)?;
        Ok(self.runtime().list_property_count(self, list))
    }

    pub fn list_at(&self, list: &ListPropertyRef, index: usize) -> Result<ObjectId, DispatchError> {
        let count = self.list_count(list)?;
        if index >= count {
            return Err(DispatchError::IndexOutOfRange {
                class: LIST_PROPERTY_TYPE.to_string(),
                call: MetaCall::ReadProperty,
                index,
            });
        }
        Ok(self.runtime().list_property_at(self, list, index))
    }

    pub fn list_append(&self, list: &ListPropertyRef, item: ObjectId) -> Result<(), DispatchError> {
        self.writable_list(list)?;
        if !self.is_alive(item) {
            return Err(DispatchError::NotAlive(item));
        }
        self.runtime().list_property_append(self, list, item);
        Ok(())
    }

    pub fn list_clear(&self, list: &ListPropertyRef) -> Result<(), DispatchError> {
        self.writable_list(list)?;
        self.runtime().list_property_clear(self, list);
        Ok(())
    }

    /// Every element of `list`, in order.
    pub fn list_contents(&self, list: &ListPropertyRef) -> Result<Variant, DispatchError> {
        let count = self.list_count(list)?;
        let items = (0..count)
            .map(|i| self.runtime().list_property_at(self, list, i))
            .collect();
        Ok(Variant::ObjectList(items))
    }
}
