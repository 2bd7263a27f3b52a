//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct, which ties the
//! replication service to the WebSocket transport and drives the avatar
//! motion tick.

use crate::{
    config::ServerConfig,
    connection::{ConnectionManager, GameServerResponseSender},
    error::ServerError,
    security::SecurityManager,
    server::handlers::handle_connection,
};
use replication_core::{Authenticator, ReplicationService, StaticCredentials};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// The core game server structure.
///
/// `GameServer` owns the replication service, the connection manager that
/// carries its deliveries, and the security checks applied to every
/// connection and frame.
///
/// # Architecture
///
/// * **Replication Service**: all object, channel and interest state
/// * **Connection Management**: WebSocket lifecycle and outbound queues
/// * **Security**: ban list, per-IP caps and frame validation
/// * **Motion Tick**: periodic avatar integration at `tick_interval_ms`
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// The replication service every frame is routed into
    service: Arc<ReplicationService>,

    /// Manager for client connections and messaging
    connection_manager: Arc<ConnectionManager>,

    /// Connection and frame validation
    security_manager: Arc<SecurityManager>,

    /// Flipped to `true` to stop the accept and tick loops
    shutdown_sender: watch::Sender<bool>,
}

impl std::fmt::Debug for GameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameServer")
            .field("bind_address", &self.config.bind_address)
            .field("connections", &self.connection_manager.connection_count())
            .finish_non_exhaustive()
    }
}

impl GameServer {
    /// Creates a new game server that checks logins against the placeholder
    /// accounts in the replication config.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    ///
    /// # Returns
    ///
    /// A new `GameServer`, or an error if the replication config is invalid.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let authenticator = Arc::new(StaticCredentials::new(&config.replication.accounts));
        Self::with_authenticator(config, authenticator)
    }

    /// Creates a new game server with a custom credential check.
    ///
    /// # Component Initialization
    ///
    /// 1. Creates the connection manager
    /// 2. Wraps it in the response sender the service delivers through
    /// 3. Bootstraps the replication service
    /// 4. Creates the security manager
    pub fn with_authenticator(
        config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ServerError> {
        let connection_manager = Arc::new(ConnectionManager::new());
        let response_sender = Arc::new(GameServerResponseSender::new(connection_manager.clone()));
        let service = Arc::new(ReplicationService::new(
            config.replication.clone(),
            response_sender,
            authenticator,
        )?);
        let security_manager = Arc::new(SecurityManager::new(config.security.clone()));
        let (shutdown_sender, _) = watch::channel(false);

        Ok(Self {
            config,
            service,
            connection_manager,
            security_manager,
            shutdown_sender,
        })
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Binds a listener on the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address))
            })
    }

    /// Accepts connections on `listener` until [`GameServer::shutdown`] is
    /// called.
    ///
    /// # Startup Sequence
    ///
    /// 1. Start the motion tick if configured
    /// 2. Accept connections, refusing any beyond `max_connections`
    /// 3. Spawn a handler per connection
    /// 4. Stop the tick loop on shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;
        info!("🚀 Starting game server on {}", local_addr);
        info!(
            "🌍 Session root {} / zone root {}",
            self.service.session_root(),
            self.service.zone_root()
        );

        let tick_task = self.start_motion_tick();
        match &tick_task {
            Some(_) => info!("🕒 Motion tick started with interval: {}ms", self.config.tick_interval_ms),
            None => info!("⏸️ Motion tick disabled (interval: 0ms)"),
        }

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let handshake_timeout = Duration::from_secs(self.config.connection_timeout.max(1));

        loop {
            if *shutdown_receiver.borrow() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if self.connection_manager.connection_count() >= self.config.max_connections {
                            warn!("🚫 Refusing {}: {} connections open", addr, self.config.max_connections);
                            drop(stream);
                        } else {
                            self.spawn_handler(stream, addr, handshake_timeout);
                        }
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_receiver.changed() => {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                }
            }
        }

        info!("🧹 Performing server cleanup...");
        if let Some(task) = tick_task {
            if let Err(e) = task.await {
                error!("Motion tick task failed: {}", e);
            }
        }
        Ok(())
    }

    /// Spawns the handler task for an accepted connection.
    fn spawn_handler(&self, stream: TcpStream, addr: SocketAddr, handshake_timeout: Duration) {
        let connection_manager = self.connection_manager.clone();
        let service = self.service.clone();
        let security_manager = self.security_manager.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(
                stream,
                addr,
                connection_manager,
                service,
                security_manager,
                handshake_timeout,
            )
            .await
            {
                debug!("Connection error: {}", e);
            }
        });
    }

    /// Starts the loop that advances avatars and broadcasts their positions.
    ///
    /// Each tick passes the measured time since the previous one, so a
    /// delayed tick moves avatars proportionally further.
    fn start_motion_tick(&self) -> Option<JoinHandle<()>> {
        if self.config.tick_interval_ms == 0 {
            return None;
        }

        let service = self.service.clone();
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);

        Some(tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_tick = Instant::now();

            loop {
                if *shutdown_receiver.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_receiver.changed() => {
                        info!("🕒 Motion tick stopping - shutdown initiated");
                        break;
                    }
                }

                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;

                match service.tick(dt).await {
                    Ok(report) => trace!(
                        "🕒 Tick: {} avatars, {} position broadcasts",
                        report.ticked, report.broadcasts
                    ),
                    // Continue ticking even if one tick fails
                    Err(e) => error!("Motion tick failed: {}", e),
                }
            }
        }))
    }

    /// Initiates shutdown of the accept and tick loops.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Server shutdown requested");
        self.shutdown_sender.send_replace(true);
        Ok(())
    }

    /// Gets the replication service.
    pub fn get_replication_service(&self) -> Arc<ReplicationService> {
        self.service.clone()
    }

    /// Gets the connection manager.
    pub fn get_connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Gets the security manager.
    pub fn get_security_manager(&self) -> Arc<SecurityManager> {
        self.security_manager.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
