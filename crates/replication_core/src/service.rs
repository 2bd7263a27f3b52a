//! # Replication Service
//!
//! The explicitly constructed owner of all replication state. Connection
//! handlers and the simulation loop share it through `Arc` and call into it
//! concurrently; every operation takes the world lock for its whole
//! mutation and fan-out, except the credential check which runs unlocked.

use crate::config::ReplicationConfig;
use crate::error::{ReplicationError, ReplicationResult};
use crate::fields;
use crate::interest::InterestRegistration;
use crate::messages::FieldUpdateRequest;
use crate::registry::ReplicatedObject;
use crate::session::{Authenticator, LoginOutcome, StaticCredentials};
use crate::sink::MessageSink;
use crate::types::{ChannelId, ClientRef, EjectReason, ObjectId, SessionState, TypeTag, ViewRole, ZoneId};
use crate::world::World;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Summary of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TickReport {
    /// Objects visited by the scheduler.
    pub ticked: usize,
    /// Position updates that were broadcast.
    pub broadcasts: usize,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplicationStats {
    pub objects: usize,
    pub channels: usize,
    pub interests: usize,
    pub ownership_bindings: usize,
    pub scheduled_tasks: usize,
    pub ticks: u64,
}

/// What the router decided to do with a client update once the lock is released.
enum Followup {
    None,
    Login { username: String, password: String },
}

/// Authoritative replication service.
pub struct ReplicationService {
    config: ReplicationConfig,
    world: Mutex<World>,
    sink: Arc<dyn MessageSink>,
    authenticator: Arc<dyn Authenticator>,
    session_root: ObjectId,
    zone_root: ObjectId,
}

impl std::fmt::Debug for ReplicationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationService")
            .field("session_root", &self.session_root)
            .field("zone_root", &self.zone_root)
            .finish_non_exhaustive()
    }
}

impl ReplicationService {
    /// Creates the service and its bootstrap objects.
    ///
    /// The SessionRoot is created under the world root with its well-known
    /// id, the zone root is allocated under the world root in the configured
    /// zone.
    ///
    /// # Arguments
    ///
    /// * `config` - Replication configuration, validated here
    /// * `sink` - Transport used for all client deliveries
    /// * `authenticator` - Credential check used by the login flow
    pub fn new(
        config: ReplicationConfig,
        sink: Arc<dyn MessageSink>,
        authenticator: Arc<dyn Authenticator>,
    ) -> ReplicationResult<Self> {
        config
            .validate()
            .map_err(ReplicationError::InvalidConfig)?;

        let mut world = World::new(&config);
        let session_root = config.session_root_id;
        world
            .registry
            .create_with_id(session_root, TypeTag::SessionRoot, ObjectId::ROOT, ZoneId(0))?;
        let zone_root = world
            .registry
            .create(TypeTag::ZoneRoot, ObjectId::ROOT, config.zone_root_zone)?;

        info!(
            "🌍 Replication world ready (session root {}, zone root {})",
            session_root, zone_root
        );

        Ok(Self {
            config,
            world: Mutex::new(world),
            sink,
            authenticator,
            session_root,
            zone_root,
        })
    }

    /// Creates the service with the placeholder account list from `config`.
    pub fn with_static_credentials(
        config: ReplicationConfig,
        sink: Arc<dyn MessageSink>,
    ) -> ReplicationResult<Self> {
        let authenticator = Arc::new(StaticCredentials::new(&config.accounts));
        Self::new(config, sink, authenticator)
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn session_root(&self) -> ObjectId {
        self.session_root
    }

    pub fn zone_root(&self) -> ObjectId {
        self.zone_root
    }

    // --- Channel/Owner Directory -------------------------------------------

    /// Opens a channel for a new transport connection.
    pub async fn open_channel(&self, client: ClientRef) -> ChannelId {
        self.world.lock().await.directory.open_channel(client)
    }

    pub async fn channel_for(&self, client: ClientRef) -> ReplicationResult<ChannelId> {
        self.world.lock().await.directory.channel_for(client)
    }

    pub async fn session_state(&self, channel: ChannelId) -> ReplicationResult<SessionState> {
        self.world.lock().await.directory.state(channel)
    }

    /// Binds ownership and gives the owner its owner-view.
    pub async fn bind_owner(&self, object: ObjectId, channel: ChannelId) -> ReplicationResult<()> {
        let mut world = self.world.lock().await;
        world.registry.get(object)?;
        world.directory.bind_owner(object, channel)?;
        world.reconcile([channel], self.sink.as_ref());
        Ok(())
    }

    /// Removes the ownership binding. The former owner keeps a client-view
    /// only if it still has interest in the object's location.
    pub async fn unbind_owner(&self, object: ObjectId) -> ReplicationResult<Option<ChannelId>> {
        let mut world = self.world.lock().await;
        world.registry.get(object)?;
        let previous = world.directory.unbind_owner(object);
        world.reconcile(previous, self.sink.as_ref());
        Ok(previous)
    }

    pub async fn owner_of(&self, object: ObjectId) -> Option<ChannelId> {
        self.world.lock().await.directory.owner_of(object)
    }

    /// Ties an object's lifetime to the channel.
    pub async fn add_session_object(&self, channel: ChannelId, object: ObjectId) -> ReplicationResult<()> {
        let mut world = self.world.lock().await;
        world.registry.get(object)?;
        world.directory.add_session_object(channel, object)
    }

    /// Forcibly disconnects a channel with a reason code and message.
    pub async fn eject(&self, channel: ChannelId, reason: EjectReason, message: &str) -> ReplicationResult<bool> {
        let mut world = self.world.lock().await;
        world.directory.eject(channel, reason, message, self.sink.as_ref())
    }

    /// Unwinds everything a channel holds: interests, ownership bindings and
    /// session objects.
    ///
    /// # Returns
    ///
    /// `false` if the channel was already gone.
    pub async fn disconnect(&self, channel: ChannelId) -> ReplicationResult<bool> {
        let mut world = self.world.lock().await;
        world.teardown_channel(channel, self.sink.as_ref())
    }

    /// Disconnects whatever channel is bound to a transport handle.
    pub async fn disconnect_client(&self, client: ClientRef) -> ReplicationResult<bool> {
        let mut world = self.world.lock().await;
        match world.directory.channel_for(client) {
            Ok(channel) => world.teardown_channel(channel, self.sink.as_ref()),
            Err(_) => Ok(false),
        }
    }

    // --- Object Registry ---------------------------------------------------

    /// Creates an object and announces it to interested channels.
    pub async fn create_object(
        &self,
        type_tag: TypeTag,
        parent: ObjectId,
        zone: ZoneId,
    ) -> ReplicationResult<ObjectId> {
        let mut world = self.world.lock().await;
        world.create_object(type_tag, parent, zone, self.sink.as_ref())
    }

    /// Destroys an object and its descendants.
    ///
    /// # Returns
    ///
    /// Ids of the destroyed objects, deepest first.
    pub async fn destroy_object(&self, id: ObjectId) -> ReplicationResult<Vec<ObjectId>> {
        let mut world = self.world.lock().await;
        let removed = world.destroy_object(id, self.sink.as_ref())?;
        Ok(removed.into_iter().map(|object| object.id).collect())
    }

    /// Returns a snapshot of the authoritative record.
    pub async fn get_object(&self, id: ObjectId) -> ReplicationResult<ReplicatedObject> {
        self.world.lock().await.registry.get(id).cloned()
    }

    /// Moves an object to another parent/zone.
    pub async fn set_location(&self, id: ObjectId, parent: ObjectId, zone: ZoneId) -> ReplicationResult<()> {
        let mut world = self.world.lock().await;
        world.relocate(id, parent, zone, self.sink.as_ref())
    }

    // --- Interest Manager --------------------------------------------------

    /// Grants a channel visibility into a scope.
    pub async fn add_interest(
        &self,
        channel: ChannelId,
        parent: ObjectId,
        zone: ZoneId,
    ) -> ReplicationResult<InterestRegistration> {
        let mut world = self.world.lock().await;
        world.require_channel(channel)?;
        let (registration, added) = world.interest.add_interest(channel, parent, zone);
        if added {
            world.reconcile([channel], self.sink.as_ref());
        }
        Ok(registration)
    }

    /// Revokes a scope. Returns whether the registration existed.
    pub async fn remove_interest(&self, channel: ChannelId, parent: ObjectId, zone: ZoneId) -> ReplicationResult<bool> {
        let mut world = self.world.lock().await;
        world.require_channel(channel)?;
        let removed = world.interest.remove_interest(channel, parent, zone);
        if removed {
            world.reconcile([channel], self.sink.as_ref());
        }
        Ok(removed)
    }

    pub async fn interests(&self, channel: ChannelId) -> Vec<InterestRegistration> {
        self.world.lock().await.interest.interests_of(channel)
    }

    /// Views currently delivered to a channel.
    pub async fn visible_objects(&self, channel: ChannelId) -> BTreeMap<ObjectId, ViewRole> {
        self.world.lock().await.interest.visible_to(channel)
    }

    // --- Update Router -----------------------------------------------------

    /// Applies an authoritative field update and fans it out.
    ///
    /// # Returns
    ///
    /// The number of channels the update was delivered to.
    pub async fn route_update(&self, object: ObjectId, field: &str, args: Vec<Value>) -> ReplicationResult<usize> {
        let mut world = self.world.lock().await;
        world.route_update(object, field, &args, None, self.sink.as_ref())
    }

    /// Handles a field update received from a client.
    ///
    /// Updates the sender is not allowed to make eject the sender. Updates
    /// from ejected channels are dropped.
    pub async fn handle_client_update(
        &self,
        channel: ChannelId,
        request: FieldUpdateRequest,
    ) -> ReplicationResult<()> {
        let followup = {
            let mut world = self.world.lock().await;
            if world.directory.state(channel)? == SessionState::Ejected {
                debug!("Dropping update from ejected {}", channel);
                return Ok(());
            }

            let authorized = match world.authorize(channel, &request)? {
                Ok(authorized) => authorized,
                Err(rejection) => {
                    warn!(
                        "🚫 Rejected {}.{} from {}: {}",
                        request.object_id, request.field, channel, rejection.detail
                    );
                    world.directory.eject(
                        channel,
                        rejection.reason,
                        rejection.reason.default_message(),
                        self.sink.as_ref(),
                    )?;
                    return Ok(());
                }
            };

            match (authorized.type_tag, authorized.def.name) {
                (TypeTag::SessionRoot, fields::LOGIN) => Followup::Login {
                    username: string_arg(&request.args, 0),
                    password: string_arg(&request.args, 1),
                },
                (TypeTag::Avatar, fields::INDICATE_INTENT) => {
                    let heading = number_arg(&request.args, 0);
                    let speed = number_arg(&request.args, 1);
                    world.apply_client_intent(
                        channel,
                        request.object_id,
                        heading,
                        speed,
                        self.config.intent_policy,
                        self.sink.as_ref(),
                    )?;
                    Followup::None
                }
                _ => {
                    world.relay_client_field(channel, &request, authorized.def, self.sink.as_ref())?;
                    Followup::None
                }
            }
        };

        if let Followup::Login { username, password } = followup {
            match self.login(channel, &username, &password).await {
                Ok(_) => {}
                Err(err @ ReplicationError::InvalidSessionState { .. })
                | Err(err @ ReplicationError::LoginInProgress(_)) => {
                    warn!("🔁 Ignoring login from {}: {}", channel, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    // --- Session Controller ------------------------------------------------

    /// Authenticates a channel and provisions its avatar.
    ///
    /// Rejected credentials eject the channel with `BadCredentials`. A login
    /// on a channel that is not Unauthenticated, or while another login is
    /// pending, fails without side effects.
    pub async fn login(&self, channel: ChannelId, username: &str, password: &str) -> ReplicationResult<LoginOutcome> {
        {
            let mut world = self.world.lock().await;
            let record = world.directory.get_mut(channel)?;
            if record.state != SessionState::Unauthenticated {
                return Err(ReplicationError::InvalidSessionState {
                    channel,
                    actual: record.state,
                    expected: SessionState::Unauthenticated,
                });
            }
            if record.login_pending {
                return Err(ReplicationError::LoginInProgress(channel));
            }
            record.login_pending = true;
        }

        debug!("🔐 Authenticating '{}' on {}", username, channel);
        let verdict = self.authenticator.authenticate(username, password).await;

        let mut world = self.world.lock().await;
        let record = world.directory.get_mut(channel)?;
        record.login_pending = false;
        if record.state != SessionState::Unauthenticated {
            return Err(ReplicationError::InvalidSessionState {
                channel,
                actual: record.state,
                expected: SessionState::Unauthenticated,
            });
        }

        match verdict {
            Ok(true) => {
                let avatar = world.provision_avatar(
                    channel,
                    self.zone_root,
                    self.config.avatar_zone,
                    self.sink.as_ref(),
                )?;
                info!("🎉 '{}' logged in on {} with avatar {}", username, channel, avatar);
                Ok(LoginOutcome::Established { avatar })
            }
            Ok(false) => {
                warn!("🔒 Bad credentials for '{}' on {}", username, channel);
                let reason = EjectReason::BadCredentials;
                world
                    .directory
                    .eject(channel, reason, reason.default_message(), self.sink.as_ref())?;
                Ok(LoginOutcome::Rejected)
            }
            Err(err) => {
                error!("❌ Authenticator failed for {}: {}", channel, err);
                let reason = EjectReason::BadCredentials;
                world
                    .directory
                    .eject(channel, reason, reason.default_message(), self.sink.as_ref())?;
                Err(err)
            }
        }
    }

    // --- Avatar Motion -----------------------------------------------------

    /// Sets an avatar's motion intent from the authoritative side.
    ///
    /// Out-of-range values fail with `InvalidIntent` and change nothing.
    pub async fn set_intent(&self, avatar: ObjectId, heading: f64, speed: f64) -> ReplicationResult<()> {
        let mut world = self.world.lock().await;
        let record = world.registry.get_mut(avatar)?;
        let type_tag = record.type_tag;
        match record.motion_mut() {
            Some(motion) => motion.set_intent(heading, speed),
            None => Err(ReplicationError::UnknownField {
                type_tag,
                field: fields::INDICATE_INTENT.to_string(),
            }),
        }
    }

    /// Advances every scheduled object by `dt` seconds and broadcasts the
    /// resulting positions.
    pub async fn tick(&self, dt: f64) -> ReplicationResult<TickReport> {
        let mut world = self.world.lock().await;
        let mut report = TickReport::default();

        for id in world.scheduler.scheduled() {
            report.ticked += 1;
            let transform = match world.registry.get_mut(id)?.motion_mut() {
                Some(motion) => motion.tick(dt, &self.config.motion),
                None => None,
            };
            if let Some(transform) = transform {
                let args = transform.xyzh_args();
                world.route_update(id, fields::SET_XYZH, &args, None, self.sink.as_ref())?;
                report.broadcasts += 1;
            }
        }

        world.ticks += 1;
        Ok(report)
    }

    // --- Observability -----------------------------------------------------

    pub async fn stats(&self) -> ReplicationStats {
        let world = self.world.lock().await;
        ReplicationStats {
            objects: world.registry.len(),
            channels: world.directory.channel_count(),
            interests: world.interest.registration_count(),
            ownership_bindings: world.directory.binding_count(),
            scheduled_tasks: world.scheduler.len(),
            ticks: world.ticks,
        }
    }

    /// Whether any interest or ownership entry still references the channel.
    pub async fn references_channel(&self, channel: ChannelId) -> bool {
        let world = self.world.lock().await;
        world.directory.references(channel) || world.interest.references(channel)
    }
}

fn string_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    args.get(index).and_then(Value::as_f64).unwrap_or(f64::NAN)
}
