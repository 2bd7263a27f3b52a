//! Shared replication state and the structural operations on it.
//!
//! [`World`] bundles the registry, directory, interest manager and scheduler
//! so a single lock covers all of them. Every method that changes
//! visibility delivers the resulting notices before returning.

use crate::config::ReplicationConfig;
use crate::directory::ChannelDirectory;
use crate::error::{ReplicationError, ReplicationResult};
use crate::interest::InterestManager;
use crate::messages::ClientMessage;
use crate::registry::{ObjectRegistry, ReplicatedObject};
use crate::scheduler::TaskScheduler;
use crate::sink::MessageSink;
use crate::types::{ChannelId, EjectReason, ObjectId, SessionState, TypeTag, ZoneId};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub(crate) struct World {
    pub(crate) registry: ObjectRegistry,
    pub(crate) directory: ChannelDirectory,
    pub(crate) interest: InterestManager,
    pub(crate) scheduler: TaskScheduler,
    pub(crate) ticks: u64,
}

impl World {
    pub(crate) fn new(config: &ReplicationConfig) -> Self {
        Self {
            registry: ObjectRegistry::new(config.min_object_id, config.max_object_id),
            directory: ChannelDirectory::new(),
            interest: InterestManager::new(),
            scheduler: TaskScheduler::new(),
            ticks: 0,
        }
    }

    /// Queues a message for a channel. Ejected or unknown channels get nothing.
    pub(crate) fn send(&self, channel: ChannelId, message: ClientMessage, sink: &dyn MessageSink) {
        match self.directory.get(channel) {
            Ok(record) if record.state != SessionState::Ejected => {
                sink.deliver(record.recipient(), message);
            }
            _ => {}
        }
    }

    /// Recomputes visibility for the given channels and sends the differences.
    pub(crate) fn reconcile<I>(&mut self, channels: I, sink: &dyn MessageSink)
    where
        I: IntoIterator<Item = ChannelId>,
    {
        let channels: BTreeSet<ChannelId> = channels.into_iter().collect();
        for channel in channels {
            if !self.directory.contains(channel) {
                continue;
            }
            let messages = self.interest.reconcile(channel, &self.registry, &self.directory);
            for message in messages {
                self.send(channel, message, sink);
            }
        }
    }

    /// Channels whose view set may change when something happens at a location.
    pub(crate) fn watchers(&self, parent: ObjectId, zone: ZoneId) -> Vec<ChannelId> {
        self.interest.watchers_of(parent, zone).collect()
    }

    /// Creates an object without announcing it.
    pub(crate) fn insert_object(
        &mut self,
        type_tag: TypeTag,
        parent: ObjectId,
        zone: ZoneId,
    ) -> ReplicationResult<ObjectId> {
        let id = self.registry.create(type_tag, parent, zone)?;
        if type_tag == TypeTag::Avatar {
            self.scheduler.register(id);
        }
        Ok(id)
    }

    /// Creates an object and announces it to every interested channel.
    pub(crate) fn create_object(
        &mut self,
        type_tag: TypeTag,
        parent: ObjectId,
        zone: ZoneId,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<ObjectId> {
        let id = self.insert_object(type_tag, parent, zone)?;
        let watchers = self.watchers(parent, zone);
        self.reconcile(watchers, sink);
        Ok(id)
    }

    /// Destroys an object and its descendants, deepest first.
    ///
    /// Every channel holding a view gets `ObjectDeleted`. Channels that held
    /// a destroyed object as a session object are ejected.
    ///
    /// # Returns
    ///
    /// The destroyed records in destruction order.
    pub(crate) fn destroy_object(
        &mut self,
        id: ObjectId,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<Vec<ReplicatedObject>> {
        let removed = self.registry.destroy(id)?;
        let mut orphaned_sessions = BTreeSet::new();

        for object in &removed {
            self.scheduler.cancel(object.id);
            for channel in self.interest.forget_object(object.id) {
                self.send(channel, ClientMessage::ObjectDeleted { object_id: object.id }, sink);
            }
            self.directory.unbind_owner(object.id);
            orphaned_sessions.extend(self.directory.remove_session_object(object.id));
        }

        for channel in orphaned_sessions {
            let message = EjectReason::SessionObjectDeleted.default_message();
            self.directory
                .eject(channel, EjectReason::SessionObjectDeleted, message, sink)?;
        }
        Ok(removed)
    }

    /// Moves an object and updates visibility on both sides of the move.
    pub(crate) fn relocate(
        &mut self,
        id: ObjectId,
        parent: ObjectId,
        zone: ZoneId,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<()> {
        let (old_parent, old_zone) = self.registry.relocate(id, parent, zone)?;
        let mut affected: BTreeSet<ChannelId> = self
            .interest
            .viewers_of(id)
            .into_iter()
            .map(|(channel, _)| channel)
            .collect();
        affected.extend(self.watchers(parent, zone));
        affected.extend(self.directory.owner_of(id));
        debug!(
            "🚚 Moved object {} from {}:{} to {}:{}",
            id, old_parent, old_zone, parent, zone
        );
        self.reconcile(affected, sink);
        Ok(())
    }

    /// Creates the avatar of a freshly authenticated channel.
    ///
    /// All bookkeeping happens first and is rolled back on failure. Nothing
    /// is sent until the session is established, then the channel receives
    /// `StateChanged` followed by its view set, with the avatar as an
    /// owner-view, and other watchers of the zone receive client-views.
    pub(crate) fn provision_avatar(
        &mut self,
        channel: ChannelId,
        zone_root: ObjectId,
        zone: ZoneId,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<ObjectId> {
        let avatar = self.insert_object(TypeTag::Avatar, zone_root, zone)?;
        let (_, interest_added) = self.interest.add_interest(channel, zone_root, zone);

        let steps = self
            .directory
            .bind_owner(avatar, channel)
            .and_then(|_| self.directory.add_session_object(channel, avatar))
            .and_then(|_| self.directory.mark_established(channel));

        if let Err(err) = steps {
            warn!("❌ Avatar provisioning for {} failed: {}", channel, err);
            self.directory.unbind_owner(avatar);
            self.directory.remove_session_object(avatar);
            if interest_added {
                self.interest.remove_interest(channel, zone_root, zone);
            }
            self.scheduler.cancel(avatar);
            self.registry.destroy(avatar)?;
            return Err(err);
        }

        info!("🧍 Provisioned avatar {} for {}", avatar, channel);
        self.send(
            channel,
            ClientMessage::StateChanged {
                state: SessionState::Established,
            },
            sink,
        );
        self.reconcile([channel], sink);
        let others: Vec<ChannelId> = self
            .watchers(zone_root, zone)
            .into_iter()
            .filter(|watcher| *watcher != channel)
            .collect();
        self.reconcile(others, sink);
        Ok(avatar)
    }

    /// Removes a channel, its interests and bindings, then destroys its
    /// session objects.
    ///
    /// # Returns
    ///
    /// `false` if the channel was already gone.
    pub(crate) fn teardown_channel(
        &mut self,
        channel: ChannelId,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<bool> {
        if !self.directory.contains(channel) {
            return Ok(false);
        }
        let removed_interests = self.interest.drop_channel(channel);
        let closed = self.directory.close_channel(channel)?;

        let mut destroyed = 0;
        for object in &closed.record.session_objects {
            if self.registry.contains(*object) {
                destroyed += self.destroy_object(*object, sink)?.len();
            }
        }
        info!(
            "👋 {} torn down: {} interests, {} bindings, {} session objects destroyed",
            channel,
            removed_interests,
            closed.owned.len(),
            destroyed
        );
        Ok(true)
    }

    /// Fails with `ChannelNotFound` unless the channel exists.
    pub(crate) fn require_channel(&self, channel: ChannelId) -> ReplicationResult<()> {
        if self.directory.contains(channel) {
            Ok(())
        } else {
            Err(ReplicationError::ChannelNotFound(channel))
        }
    }
}
