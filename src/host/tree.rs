use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use metabridge_wire::ObjectId;

use super::meta::MetaClass;
use super::variant::Variant;
use crate::proxy::ProxyObject;

pub(crate) enum ObjectBody {
    Native,
    Proxy(Rc<ProxyObject>),
}

pub(crate) struct ObjectSlot {
    pub class: Arc<MetaClass>,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    /// Native storage, indexed by absolute property index.
    pub properties: Vec<Variant>,
    pub body: ObjectBody,
    /// Set once destruction has started.
    pub dying: bool,
}

impl ObjectSlot {
    pub fn proxy(&self) -> Option<&Rc<ProxyObject>> {
        match &self.body {
            ObjectBody::Proxy(proxy) => Some(proxy),
            ObjectBody::Native => None,
        }
    }
}

/// Ownership tree of live host objects. Ids are never reused.
#[derive(Default)]
pub(crate) struct ObjectTree {
    next_id: u64,
    objects: HashMap<ObjectId, ObjectSlot>,
}

impl ObjectTree {
    pub fn insert_with(
        &mut self,
        class: Arc<MetaClass>,
        parent: Option<ObjectId>,
        body: impl FnOnce(ObjectId) -> ObjectBody,
    ) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        let properties = (0..class.property_count())
            .map(|i| class.property(i).map(|p| p.storage.default_value()).unwrap_or_default())
            .collect();
        let parent = parent.filter(|p| self.objects.contains_key(p));
        if let Some(p) = parent.and_then(|p| self.objects.get_mut(&p)) {
            p.children.push(id);
        }
        self.objects.insert(
            id,
            ObjectSlot {
                class,
                parent,
                children: Vec::new(),
                properties,
                body: body(id),
                dying: false,
            },
        );
        id
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectSlot> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ObjectSlot> {
        self.objects.get_mut(&id)
    }

    /// Removes the object and detaches it from its parent. Children are left
    /// in place with no parent.
    pub fn remove(&mut self, id: ObjectId) -> Option<ObjectSlot> {
        let slot = self.objects.remove(&id)?;
        if let Some(parent) = slot.parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        for child in &slot.children {
            if let Some(child) = self.objects.get_mut(child) {
                child.parent = None;
            }
        }
        Some(slot)
    }

    pub fn is_ancestor(&self, ancestor: ObjectId, mut id: ObjectId) -> bool {
        while let Some(parent) = self.objects.get(&id).and_then(|s| s.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Caller checks liveness and cycles.
    pub fn reparent(&mut self, id: ObjectId, parent: Option<ObjectId>) {
        let old = self.objects.get(&id).and_then(|s| s.parent);
        if let Some(old) = old.and_then(|p| self.objects.get_mut(&p)) {
            old.children.retain(|c| *c != id);
        }
        if let Some(new) = parent.and_then(|p| self.objects.get_mut(&p)) {
            new.children.push(id);
        }
        if let Some(slot) = self.objects.get_mut(&id) {
            slot.parent = parent;
        }
    }

    pub fn roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, slot)| slot.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        roots.sort();
        roots
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}
