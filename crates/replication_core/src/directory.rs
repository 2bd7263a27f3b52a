//! # Channel/Owner Directory
//!
//! Maps transport connections to channels, tracks session state, ownership
//! bindings and session objects, and performs ejection.

use crate::error::{ReplicationError, ReplicationResult};
use crate::messages::ClientMessage;
use crate::sink::{MessageSink, Recipient};
use crate::types::{ChannelId, ClientRef, EjectReason, ObjectId, SessionState};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-channel bookkeeping.
#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub id: ChannelId,
    pub client: ClientRef,
    pub state: SessionState,
    /// Objects torn down automatically when the channel goes away.
    pub session_objects: BTreeSet<ObjectId>,
    pub intent_violations: u32,
    pub login_pending: bool,
    pub opened_at: Instant,
}

impl ChannelRecord {
    pub fn recipient(&self) -> Recipient {
        Recipient {
            channel: self.id,
            client: self.client,
        }
    }
}

/// What was left behind by a closed channel.
#[derive(Debug)]
pub struct ClosedChannel {
    pub record: ChannelRecord,
    /// Objects the channel owned at close time. Their bindings are gone.
    pub owned: BTreeSet<ObjectId>,
}

/// Channel, session and ownership bookkeeping.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: HashMap<ChannelId, ChannelRecord>,
    by_client: HashMap<ClientRef, ChannelId>,
    owners: HashMap<ObjectId, ChannelId>,
    owned: HashMap<ChannelId, BTreeSet<ObjectId>>,
    next_channel: u64,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self {
            next_channel: 1,
            ..Default::default()
        }
    }

    /// Opens a channel for a transport connection.
    ///
    /// Opening twice for the same client returns the existing channel.
    pub fn open_channel(&mut self, client: ClientRef) -> ChannelId {
        if let Some(existing) = self.by_client.get(&client) {
            return *existing;
        }
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        self.channels.insert(
            id,
            ChannelRecord {
                id,
                client,
                state: SessionState::Unauthenticated,
                session_objects: BTreeSet::new(),
                intent_violations: 0,
                login_pending: false,
                opened_at: Instant::now(),
            },
        );
        self.by_client.insert(client, id);
        debug!("📡 Opened {} for client {}", id, client);
        id
    }

    pub fn channel_for(&self, client: ClientRef) -> ReplicationResult<ChannelId> {
        self.by_client
            .get(&client)
            .copied()
            .ok_or(ReplicationError::ClientNotFound(client))
    }

    pub fn get(&self, channel: ChannelId) -> ReplicationResult<&ChannelRecord> {
        self.channels
            .get(&channel)
            .ok_or(ReplicationError::ChannelNotFound(channel))
    }

    pub fn get_mut(&mut self, channel: ChannelId) -> ReplicationResult<&mut ChannelRecord> {
        self.channels
            .get_mut(&channel)
            .ok_or(ReplicationError::ChannelNotFound(channel))
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.channels.contains_key(&channel)
    }

    pub fn state(&self, channel: ChannelId) -> ReplicationResult<SessionState> {
        Ok(self.get(channel)?.state)
    }

    pub fn recipient(&self, channel: ChannelId) -> ReplicationResult<Recipient> {
        Ok(self.get(channel)?.recipient())
    }

    /// Unauthenticated -> Established.
    pub fn mark_established(&mut self, channel: ChannelId) -> ReplicationResult<()> {
        let record = self.get_mut(channel)?;
        if record.state != SessionState::Unauthenticated {
            return Err(ReplicationError::InvalidSessionState {
                channel,
                actual: record.state,
                expected: SessionState::Unauthenticated,
            });
        }
        record.state = SessionState::Established;
        info!("✅ {} established", channel);
        Ok(())
    }

    /// Binds an object to its owning channel.
    ///
    /// Rebinding to the same channel is a no-op; a different owner is rejected
    /// and the existing binding is kept.
    pub fn bind_owner(&mut self, object: ObjectId, channel: ChannelId) -> ReplicationResult<()> {
        if !self.channels.contains_key(&channel) {
            return Err(ReplicationError::ChannelNotFound(channel));
        }
        match self.owners.get(&object) {
            Some(owner) if *owner == channel => return Ok(()),
            Some(owner) => {
                return Err(ReplicationError::AlreadyOwned {
                    object,
                    owner: *owner,
                })
            }
            None => {}
        }
        self.owners.insert(object, channel);
        self.owned.entry(channel).or_default().insert(object);
        debug!("🔑 {} now owns object {}", channel, object);
        Ok(())
    }

    /// Removes the ownership binding of an object.
    ///
    /// # Returns
    ///
    /// The previous owner, if any.
    pub fn unbind_owner(&mut self, object: ObjectId) -> Option<ChannelId> {
        let owner = self.owners.remove(&object)?;
        if let Some(set) = self.owned.get_mut(&owner) {
            set.remove(&object);
            if set.is_empty() {
                self.owned.remove(&owner);
            }
        }
        Some(owner)
    }

    pub fn owner_of(&self, object: ObjectId) -> Option<ChannelId> {
        self.owners.get(&object).copied()
    }

    pub fn owned_by(&self, channel: ChannelId) -> impl Iterator<Item = ObjectId> + '_ {
        self.owned
            .get(&channel)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn add_session_object(&mut self, channel: ChannelId, object: ObjectId) -> ReplicationResult<()> {
        self.get_mut(channel)?.session_objects.insert(object);
        Ok(())
    }

    /// Forgets a destroyed session object.
    ///
    /// # Returns
    ///
    /// Channels that held it as a session object.
    pub fn remove_session_object(&mut self, object: ObjectId) -> Vec<ChannelId> {
        let mut holders: Vec<ChannelId> = self
            .channels
            .values_mut()
            .filter_map(|record| record.session_objects.remove(&object).then_some(record.id))
            .collect();
        holders.sort_unstable();
        holders
    }

    /// Counts an intent violation and returns the new total.
    pub fn record_intent_violation(&mut self, channel: ChannelId) -> ReplicationResult<u32> {
        let record = self.get_mut(channel)?;
        record.intent_violations += 1;
        Ok(record.intent_violations)
    }

    /// Moves the channel to Ejected and tells the transport to close it.
    ///
    /// The eject notice is queued before the close request. Ejecting an
    /// already ejected channel does nothing.
    ///
    /// # Returns
    ///
    /// Whether this call performed the ejection.
    pub fn eject(
        &mut self,
        channel: ChannelId,
        reason: EjectReason,
        message: &str,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<bool> {
        let record = self.get_mut(channel)?;
        if record.state == SessionState::Ejected {
            return Ok(false);
        }
        record.state = SessionState::Ejected;
        let to = record.recipient();
        warn!("⛔ Ejecting {} (code {}): {}", channel, reason.code(), message);
        sink.deliver(to, ClientMessage::eject(reason, message));
        sink.close(to, reason, message);
        Ok(true)
    }

    /// Removes a channel and all of its ownership bindings.
    pub fn close_channel(&mut self, channel: ChannelId) -> ReplicationResult<ClosedChannel> {
        let record = self
            .channels
            .remove(&channel)
            .ok_or(ReplicationError::ChannelNotFound(channel))?;
        self.by_client.remove(&record.client);
        let owned = self.owned.remove(&channel).unwrap_or_default();
        for object in &owned {
            self.owners.remove(object);
        }
        debug!("📴 Closed {} ({} owned objects released)", channel, owned.len());
        Ok(ClosedChannel { record, owned })
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn binding_count(&self) -> usize {
        self.owners.len()
    }

    /// Whether any binding still references the channel.
    pub fn references(&self, channel: ChannelId) -> bool {
        self.owned.contains_key(&channel) || self.owners.values().any(|owner| *owner == channel)
    }
}
