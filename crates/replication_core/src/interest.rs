//! # Interest Manager
//!
//! Tracks which `(parent, zone)` scopes each channel subscribes to and which
//! views have actually been delivered to it. Visibility changes are computed
//! by [`InterestManager::reconcile`], which diffs the desired view set of a
//! channel against what it already holds and yields the notices that bring
//! the client up to date.
//!
//! The desired view set of a channel is every non-global object whose
//! location matches one of its registrations, plus every object it owns.
//! Owned objects are always delivered as owner-views.

use crate::directory::ChannelDirectory;
use crate::messages::ClientMessage;
use crate::registry::ObjectRegistry;
use crate::types::{ChannelId, ObjectId, ViewRole, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A channel's subscription to a `(parent, zone)` scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterestRegistration {
    pub channel_id: ChannelId,
    pub parent_id: ObjectId,
    pub zone_id: ZoneId,
}

/// Interest registrations and delivered views.
#[derive(Debug, Default)]
pub struct InterestManager {
    scopes: HashMap<ChannelId, BTreeSet<(ObjectId, ZoneId)>>,
    watchers: HashMap<(ObjectId, ZoneId), BTreeSet<ChannelId>>,
    delivered: HashMap<ChannelId, BTreeMap<ObjectId, ViewRole>>,
    viewers: HashMap<ObjectId, BTreeSet<ChannelId>>,
}

impl InterestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in a scope.
    ///
    /// # Returns
    ///
    /// The registration and whether it is new. Re-registering an existing
    /// scope changes nothing.
    pub fn add_interest(
        &mut self,
        channel: ChannelId,
        parent: ObjectId,
        zone: ZoneId,
    ) -> (InterestRegistration, bool) {
        let registration = InterestRegistration {
            channel_id: channel,
            parent_id: parent,
            zone_id: zone,
        };
        let added = self.scopes.entry(channel).or_default().insert((parent, zone));
        if added {
            self.watchers.entry((parent, zone)).or_default().insert(channel);
            debug!("👁️ {} added interest in {}:{}", channel, parent, zone);
        }
        (registration, added)
    }

    /// Removes a registration. Returns whether it existed.
    pub fn remove_interest(&mut self, channel: ChannelId, parent: ObjectId, zone: ZoneId) -> bool {
        let removed = match self.scopes.get_mut(&channel) {
            Some(set) => {
                let removed = set.remove(&(parent, zone));
                if set.is_empty() {
                    self.scopes.remove(&channel);
                }
                removed
            }
            None => false,
        };
        if removed {
            if let Some(set) = self.watchers.get_mut(&(parent, zone)) {
                set.remove(&channel);
                if set.is_empty() {
                    self.watchers.remove(&(parent, zone));
                }
            }
            debug!("🙈 {} removed interest in {}:{}", channel, parent, zone);
        }
        removed
    }

    pub fn interests_of(&self, channel: ChannelId) -> Vec<InterestRegistration> {
        self.scopes
            .get(&channel)
            .into_iter()
            .flat_map(|set| set.iter())
            .map(|(parent, zone)| InterestRegistration {
                channel_id: channel,
                parent_id: *parent,
                zone_id: *zone,
            })
            .collect()
    }

    pub fn has_interest(&self, channel: ChannelId, parent: ObjectId, zone: ZoneId) -> bool {
        self.scopes
            .get(&channel)
            .is_some_and(|set| set.contains(&(parent, zone)))
    }

    /// Channels registered for a scope.
    pub fn watchers_of(&self, parent: ObjectId, zone: ZoneId) -> impl Iterator<Item = ChannelId> + '_ {
        self.watchers
            .get(&(parent, zone))
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Channels currently holding a view of an object, with their role.
    pub fn viewers_of(&self, object: ObjectId) -> Vec<(ChannelId, ViewRole)> {
        self.viewers
            .get(&object)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|channel| Some((*channel, self.view_role(*channel, object)?)))
            .collect()
    }

    /// Role of the view a channel holds, if any.
    pub fn view_role(&self, channel: ChannelId, object: ObjectId) -> Option<ViewRole> {
        self.delivered.get(&channel)?.get(&object).copied()
    }

    /// Views delivered to a channel, in id order.
    pub fn visible_to(&self, channel: ChannelId) -> BTreeMap<ObjectId, ViewRole> {
        self.delivered.get(&channel).cloned().unwrap_or_default()
    }

    /// Forgets every view of a destroyed object.
    ///
    /// # Returns
    ///
    /// Channels that held a view.
    pub fn forget_object(&mut self, object: ObjectId) -> Vec<ChannelId> {
        let channels: Vec<ChannelId> = self
            .viewers
            .remove(&object)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for channel in &channels {
            if let Some(map) = self.delivered.get_mut(channel) {
                map.remove(&object);
            }
        }
        channels
    }

    /// Removes every registration and view of a channel.
    ///
    /// # Returns
    ///
    /// The number of registrations removed.
    pub fn drop_channel(&mut self, channel: ChannelId) -> usize {
        let scopes = self.scopes.remove(&channel).unwrap_or_default();
        for scope in &scopes {
            if let Some(set) = self.watchers.get_mut(scope) {
                set.remove(&channel);
                if set.is_empty() {
                    self.watchers.remove(scope);
                }
            }
        }
        if let Some(views) = self.delivered.remove(&channel) {
            for object in views.keys() {
                if let Some(set) = self.viewers.get_mut(object) {
                    set.remove(&channel);
                    if set.is_empty() {
                        self.viewers.remove(object);
                    }
                }
            }
        }
        scopes.len()
    }

    /// Brings a channel's delivered views in line with its interests and
    /// ownerships.
    ///
    /// # Returns
    ///
    /// Notices to send to the channel: deletions first, then creations and
    /// role changes in id order.
    pub fn reconcile(
        &mut self,
        channel: ChannelId,
        registry: &ObjectRegistry,
        directory: &ChannelDirectory,
    ) -> Vec<ClientMessage> {
        let desired = self.desired_views(channel, registry, directory);
        let current = self.delivered.remove(&channel).unwrap_or_default();
        let mut messages = Vec::new();

        for object in current.keys().rev() {
            if !desired.contains_key(object) {
                if let Some(set) = self.viewers.get_mut(object) {
                    set.remove(&channel);
                    if set.is_empty() {
                        self.viewers.remove(object);
                    }
                }
                messages.push(ClientMessage::ObjectDeleted { object_id: *object });
            }
        }

        for (object, role) in &desired {
            match current.get(object) {
                Some(existing) if existing == role => {}
                Some(_) => messages.push(ClientMessage::ObjectRoleChanged {
                    object_id: *object,
                    role: *role,
                }),
                None => {
                    let Ok(record) = registry.get(*object) else {
                        continue;
                    };
                    self.viewers.entry(*object).or_default().insert(channel);
                    messages.push(ClientMessage::ObjectCreated {
                        object_id: record.id,
                        type_tag: record.type_tag,
                        parent_id: record.parent_id,
                        zone_id: record.zone_id,
                        role: *role,
                        fields: record.fields.clone(),
                    });
                }
            }
        }

        if !desired.is_empty() {
            self.delivered.insert(channel, desired);
        }
        messages
    }

    fn desired_views(
        &self,
        channel: ChannelId,
        registry: &ObjectRegistry,
        directory: &ChannelDirectory,
    ) -> BTreeMap<ObjectId, ViewRole> {
        let mut desired = BTreeMap::new();
        if let Some(scopes) = self.scopes.get(&channel) {
            for (parent, zone) in scopes {
                for object in registry.objects_in(*parent, *zone) {
                    desired.insert(object, ViewRole::ClientView);
                }
            }
        }
        for object in directory.owned_by(channel) {
            if registry.contains(object) {
                desired.insert(object, ViewRole::OwnerView);
            }
        }
        desired.retain(|object, _| {
            registry
                .get(*object)
                .is_ok_and(|record| !record.type_tag.is_global())
        });
        desired
    }

    pub fn registration_count(&self) -> usize {
        self.scopes.values().map(BTreeSet::len).sum()
    }

    /// Whether anything still references the channel.
    pub fn references(&self, channel: ChannelId) -> bool {
        self.scopes.contains_key(&channel)
            || self.delivered.contains_key(&channel)
            || self.watchers.values().any(|set| set.contains(&channel))
            || self.viewers.values().any(|set| set.contains(&channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    struct Fixture {
        registry: ObjectRegistry,
        directory: ChannelDirectory,
        interest: InterestManager,
        zone_root: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut registry = ObjectRegistry::new(100, 10_000);
        let zone_root = registry.create(TypeTag::ZoneRoot, ObjectId::ROOT, ZoneId(1)).unwrap();
        Fixture {
            registry,
            directory: ChannelDirectory::new(),
            interest: InterestManager::new(),
            zone_root,
        }
    }

    fn created(messages: &[ClientMessage]) -> Vec<(ObjectId, ViewRole)> {
        messages
            .iter()
            .filter_map(|m| match m {
                ClientMessage::ObjectCreated { object_id, role, .. } => Some((*object_id, *role)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_add_interest_delivers_existing_objects_once() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        let b = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(5)).unwrap();

        let (_, added) = f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        assert!(added);
        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(created(&msgs), vec![(a, ViewRole::ClientView), (b, ViewRole::ClientView)]);

        let (_, added) = f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        assert!(!added);
        assert!(f.interest.reconcile(ch, &f.registry, &f.directory).is_empty());
        assert_eq!(f.interest.registration_count(), 1);
    }

    #[test]
    fn test_remove_interest_deletes_views() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        f.interest.reconcile(ch, &f.registry, &f.directory);

        assert!(f.interest.remove_interest(ch, f.zone_root, ZoneId(0)));
        assert!(!f.interest.remove_interest(ch, f.zone_root, ZoneId(0)));
        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(msgs, vec![ClientMessage::ObjectDeleted { object_id: a }]);
        assert!(f.interest.visible_to(ch).is_empty());
        assert!(f.interest.viewers_of(a).is_empty());
    }

    #[test]
    fn test_overlapping_interests_keep_view() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        let other_root = f.registry.create(TypeTag::ZoneRoot, ObjectId::ROOT, ZoneId(1)).unwrap();
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        let b = f.registry.create(TypeTag::Avatar, other_root, ZoneId(0)).unwrap();

        f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        f.interest.add_interest(ch, other_root, ZoneId(0));
        f.interest.reconcile(ch, &f.registry, &f.directory);

        f.interest.remove_interest(ch, other_root, ZoneId(0));
        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(msgs, vec![ClientMessage::ObjectDeleted { object_id: b }]);
        assert_eq!(f.interest.view_role(ch, a), Some(ViewRole::ClientView));
    }

    #[test]
    fn test_owner_view_supersedes_client_view() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        f.directory.bind_owner(a, ch).unwrap();

        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(created(&msgs), vec![(a, ViewRole::OwnerView)]);

        f.directory.unbind_owner(a);
        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(
            msgs,
            vec![ClientMessage::ObjectRoleChanged {
                object_id: a,
                role: ViewRole::ClientView
            }]
        );
    }

    #[test]
    fn test_owned_object_visible_without_interest() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(9)).unwrap();
        f.directory.bind_owner(a, ch).unwrap();
        let msgs = f.interest.reconcile(ch, &f.registry, &f.directory);
        assert_eq!(created(&msgs), vec![(a, ViewRole::OwnerView)]);
        assert_eq!(f.interest.viewers_of(a), vec![(ch, ViewRole::OwnerView)]);
    }

    #[test]
    fn test_global_objects_are_never_views() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        f.registry
            .create_with_id(ObjectId(50), TypeTag::SessionRoot, ObjectId::ROOT, ZoneId(0))
            .unwrap();
        f.interest.add_interest(ch, ObjectId::ROOT, ZoneId(0));
        assert!(f.interest.reconcile(ch, &f.registry, &f.directory).is_empty());
    }

    #[test]
    fn test_drop_channel_clears_everything() {
        let mut f = fixture();
        let ch = f.directory.open_channel(1);
        f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        f.interest.add_interest(ch, f.zone_root, ZoneId(0));
        f.interest.add_interest(ch, f.zone_root, ZoneId(1));
        f.interest.reconcile(ch, &f.registry, &f.directory);

        assert_eq!(f.interest.drop_channel(ch), 2);
        assert!(!f.interest.references(ch));
        assert_eq!(f.interest.watchers_of(f.zone_root, ZoneId(0)).count(), 0);
    }

    #[test]
    fn test_forget_object_returns_viewers() {
        let mut f = fixture();
        let a_ch = f.directory.open_channel(1);
        let b_ch = f.directory.open_channel(2);
        let a = f.registry.create(TypeTag::Avatar, f.zone_root, ZoneId(0)).unwrap();
        for ch in [a_ch, b_ch] {
            f.interest.add_interest(ch, f.zone_root, ZoneId(0));
            f.interest.reconcile(ch, &f.registry, &f.directory);
        }
        assert_eq!(f.interest.forget_object(a), vec![a_ch, b_ch]);
        assert_eq!(f.interest.view_role(a_ch, a), None);
    }
}
