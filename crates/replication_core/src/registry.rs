//! # Object Registry
//!
//! Authoritative store of every live replicated object. Owns id allocation,
//! creation, destruction and relocation, and keeps a `(parent, zone)`
//! location index that the interest manager queries.

use crate::avatar::AvatarMotion;
use crate::error::{ReplicationError, ReplicationResult};
use crate::fields;
use crate::types::{ObjectId, TypeTag, ZoneId};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Role specific state carried by the authoritative copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Behavior {
    #[default]
    None,
    Avatar(AvatarMotion),
}

/// The authoritative record of a replicated object.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatedObject {
    pub id: ObjectId,
    pub type_tag: TypeTag,
    pub parent_id: ObjectId,
    pub zone_id: ZoneId,
    /// Stored required/ram field values.
    pub fields: BTreeMap<String, Vec<Value>>,
    pub behavior: Behavior,
}

impl ReplicatedObject {
    pub fn location(&self) -> (ObjectId, ZoneId) {
        (self.parent_id, self.zone_id)
    }

    pub fn motion(&self) -> Option<&AvatarMotion> {
        match &self.behavior {
            Behavior::Avatar(motion) => Some(motion),
            Behavior::None => None,
        }
    }

    pub fn motion_mut(&mut self) -> Option<&mut AvatarMotion> {
        match &mut self.behavior {
            Behavior::Avatar(motion) => Some(motion),
            Behavior::None => None,
        }
    }
}

/// Authoritative object store.
#[derive(Debug)]
pub struct ObjectRegistry {
    objects: HashMap<ObjectId, ReplicatedObject>,
    by_location: BTreeMap<(ObjectId, ZoneId), BTreeSet<ObjectId>>,
    next_id: u64,
    max_id: u64,
}

impl ObjectRegistry {
    /// Creates an empty registry allocating ids from `min_id..=max_id`.
    pub fn new(min_id: u64, max_id: u64) -> Self {
        Self {
            objects: HashMap::new(),
            by_location: BTreeMap::new(),
            next_id: min_id.max(1),
            max_id,
        }
    }

    /// Creates an object with a fresh id.
    ///
    /// # Arguments
    ///
    /// * `type_tag` - Class of the new object
    /// * `parent_id` - Existing object or `ObjectId::ROOT`
    /// * `zone_id` - Zone under the parent
    ///
    /// # Returns
    ///
    /// The new id. Ids are never handed out twice.
    pub fn create(
        &mut self,
        type_tag: TypeTag,
        parent_id: ObjectId,
        zone_id: ZoneId,
    ) -> ReplicationResult<ObjectId> {
        self.check_parent(type_tag, parent_id)?;

        // Ids may have been taken by create_with_id; skip over them.
        while self.objects.contains_key(&ObjectId(self.next_id)) {
            self.next_id += 1;
        }
        if self.next_id > self.max_id {
            return Err(ReplicationError::IdPoolExhausted);
        }
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        self.insert(id, type_tag, parent_id, zone_id);
        Ok(id)
    }

    /// Creates an object with a well-known id.
    pub fn create_with_id(
        &mut self,
        id: ObjectId,
        type_tag: TypeTag,
        parent_id: ObjectId,
        zone_id: ZoneId,
    ) -> ReplicationResult<()> {
        if id.is_root() || self.objects.contains_key(&id) {
            return Err(ReplicationError::DuplicateObject(id));
        }
        self.check_parent(type_tag, parent_id)?;
        self.insert(id, type_tag, parent_id, zone_id);
        Ok(())
    }

    fn check_parent(&self, type_tag: TypeTag, parent_id: ObjectId) -> ReplicationResult<()> {
        if parent_id.is_root() || self.objects.contains_key(&parent_id) {
            Ok(())
        } else {
            Err(ReplicationError::InvalidParent {
                parent: parent_id,
                type_tag,
            })
        }
    }

    fn insert(&mut self, id: ObjectId, type_tag: TypeTag, parent_id: ObjectId, zone_id: ZoneId) {
        let fields = fields::required_defaults(type_tag)
            .into_iter()
            .map(|(name, args)| (name.to_string(), args))
            .collect();
        let behavior = match type_tag {
            TypeTag::Avatar => Behavior::Avatar(AvatarMotion::new()),
            TypeTag::SessionRoot | TypeTag::ZoneRoot => Behavior::None,
        };
        self.objects.insert(
            id,
            ReplicatedObject {
                id,
                type_tag,
                parent_id,
                zone_id,
                fields,
                behavior,
            },
        );
        self.by_location
            .entry((parent_id, zone_id))
            .or_default()
            .insert(id);
        debug!("🧱 Created {} {} under {} zone {}", type_tag, id, parent_id, zone_id);
    }

    /// Removes an object and all of its descendants.
    ///
    /// # Returns
    ///
    /// The removed records, deepest descendants first and `id` last.
    pub fn destroy(&mut self, id: ObjectId) -> ReplicationResult<Vec<ReplicatedObject>> {
        if !self.objects.contains_key(&id) {
            return Err(ReplicationError::ObjectNotFound(id));
        }

        let order = self.subtree_post_order(id);
        let mut removed = Vec::with_capacity(order.len());
        for oid in order {
            if let Some(object) = self.objects.remove(&oid) {
                self.unindex(&object);
                debug!("🗑️ Destroyed {} {}", object.type_tag, oid);
                removed.push(object);
            }
        }
        Ok(removed)
    }

    fn subtree_post_order(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((oid, expanded)) = stack.pop() {
            if expanded {
                order.push(oid);
                continue;
            }
            stack.push((oid, true));
            for child in self.children_of(oid) {
                stack.push((child, false));
            }
        }
        order
    }

    /// Direct children of an object across all zones.
    pub fn children_of(&self, parent: ObjectId) -> Vec<ObjectId> {
        self.by_location
            .range((parent, ZoneId::MIN)..=(parent, ZoneId::MAX))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    fn unindex(&mut self, object: &ReplicatedObject) {
        let key = object.location();
        if let Some(ids) = self.by_location.get_mut(&key) {
            ids.remove(&object.id);
            if ids.is_empty() {
                self.by_location.remove(&key);
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> ReplicationResult<&ReplicatedObject> {
        self.objects
            .get(&id)
            .ok_or(ReplicationError::ObjectNotFound(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> ReplicationResult<&mut ReplicatedObject> {
        self.objects
            .get_mut(&id)
            .ok_or(ReplicationError::ObjectNotFound(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Objects located at `(parent, zone)`, in id order.
    pub fn objects_in(&self, parent: ObjectId, zone: ZoneId) -> impl Iterator<Item = ObjectId> + '_ {
        self.by_location
            .get(&(parent, zone))
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Moves an object to a new location.
    ///
    /// # Returns
    ///
    /// The previous location.
    pub fn relocate(
        &mut self,
        id: ObjectId,
        parent_id: ObjectId,
        zone_id: ZoneId,
    ) -> ReplicationResult<(ObjectId, ZoneId)> {
        let type_tag = self.get(id)?.type_tag;
        self.check_parent(type_tag, parent_id)?;
        if parent_id == id || self.subtree_post_order(id).contains(&parent_id) {
            return Err(ReplicationError::InvalidParent {
                parent: parent_id,
                type_tag,
            });
        }

        let object = self.get(id)?.clone();
        let previous = object.location();
        self.unindex(&object);
        let record = self.get_mut(id)?;
        record.parent_id = parent_id;
        record.zone_id = zone_id;
        self.by_location
            .entry((parent_id, zone_id))
            .or_default()
            .insert(id);
        Ok(previous)
    }

    /// Stores a field value if the class keeps it.
    ///
    /// # Returns
    ///
    /// Whether the value was stored.
    pub fn store_field(&mut self, id: ObjectId, field: &str, args: &[Value]) -> ReplicationResult<bool> {
        let object = self.get_mut(id)?;
        let def = fields::field_def(object.type_tag, field)?;
        if !def.flags.is_stored() {
            return Ok(false);
        }
        object.fields.insert(field.to_string(), args.to_vec());
        Ok(true)
    }

    /// Iterates all objects in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ReplicatedObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
