//! Connection handling logic for WebSocket clients.
//!
//! This module contains the per-connection logic: WebSocket handshaking,
//! channel opening, frame processing, ejection and cleanup.

use crate::{
    connection::{ConnectionId, ConnectionManager, Outbound},
    error::ServerError,
    messaging::{encode_message, route_client_message},
    security::SecurityManager,
};
use futures::{SinkExt, StreamExt};
use replication_core::{ChannelId, EjectReason, ReplicationService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, trace, warn};

/// Offset added to eject codes to land in the application range of
/// WebSocket close codes.
pub const CLOSE_CODE_BASE: u16 = 4000;

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Check the remote IP against the ban list and per-IP cap
/// 2. Perform the WebSocket handshake within the configured timeout
/// 3. Register the connection and open its replication channel
/// 4. Run the incoming and outgoing tasks until either ends
/// 5. Tear the channel down and release the connection
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `connection_manager` - Manager for tracking connections
/// * `service` - The replication service frames are routed into
/// * `security_manager` - Frame and connection validation
/// * `handshake_timeout` - Upper bound on the WebSocket handshake
///
/// # Returns
///
/// `Ok(())` if the connection was handled successfully, or a `ServerError`
/// if it was refused or the handshake failed.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    service: Arc<ReplicationService>,
    security_manager: Arc<SecurityManager>,
    handshake_timeout: Duration,
) -> Result<(), ServerError> {
    security_manager
        .validate_connection(addr.ip())
        .await
        .map_err(|e| ServerError::Network(format!("Connection from {addr} refused: {e}")))?;

    let result = serve_connection(
        stream,
        addr,
        &connection_manager,
        &service,
        &security_manager,
        handshake_timeout,
    )
    .await;

    security_manager.on_disconnect(addr.ip()).await;
    result
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: &Arc<ConnectionManager>,
    service: &Arc<ReplicationService>,
    security_manager: &Arc<SecurityManager>,
    handshake_timeout: Duration,
) -> Result<(), ServerError> {
    let ws_stream = match tokio::time::timeout(handshake_timeout, accept_async(stream)).await {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            return Err(ServerError::Network(format!("WebSocket handshake failed: {e}")))
        }
        Err(_) => {
            return Err(ServerError::Network(format!(
                "WebSocket handshake with {addr} timed out"
            )))
        }
    };

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let (connection_id, outbound) = connection_manager.add_connection(addr);
    let channel = service.open_channel(connection_id).await;
    connection_manager.set_channel(connection_id, channel);
    debug!("📡 Connection {} bound to {}", connection_id, channel);

    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming frame task - validates and routes frames to the service
    let incoming_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = security_manager.validate_message(text.as_bytes()) {
                        warn!("🛡️ Rejected frame from connection {}: {}", connection_id, e);
                        eject_malformed(service, channel).await;
                        continue;
                    }
                    if let Err(e) =
                        route_client_message(text.as_str(), connection_id, channel, service).await
                    {
                        error!("❌ Message routing error on connection {}: {}", connection_id, e);
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!("🛡️ Binary frame from connection {}", connection_id);
                    eject_malformed(service, channel).await;
                }
                Ok(Message::Close(_)) => {
                    debug!("🔌 Client {} requested close", connection_id);
                    break;
                }
                Ok(Message::Ping(data)) => {
                    let mut ws_sender = ws_sender_incoming.lock().await;
                    let _ = ws_sender.send(Message::Pong(data)).await;
                }
                Err(e) => {
                    error!("WebSocket error for connection {}: {}", connection_id, e);
                    break;
                }
                _ => {}
            }
        }
    };

    let outgoing_task = write_outbound(connection_id, outbound, ws_sender_outgoing);

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    if let Err(e) = service.disconnect_client(connection_id).await {
        error!("Failed to tear down {} for connection {}: {}", channel, connection_id, e);
    }
    connection_manager.remove_connection(connection_id);
    Ok(())
}

/// Drains a connection's outbound queue onto its socket.
///
/// Stops after writing a close frame, or when the socket fails.
async fn write_outbound<S>(
    connection_id: ConnectionId,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    ws_sender: Arc<tokio::sync::Mutex<S>>,
) where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(message) => {
                let text = match encode_message(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };
                trace!("📤 {} -> connection {}", message.kind(), connection_id);
                let mut ws_sender = ws_sender.lock().await;
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    error!("Failed to send message: {}", e);
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                debug!("🚪 Closing connection {} with code {}", connection_id, code);
                let mut ws_sender = ws_sender.lock().await;
                let _ = ws_sender.send(close_message(code, &reason)).await;
                break;
            }
        }
    }
}

/// Builds the close frame carrying an eject code and message.
pub fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(CLOSE_CODE_BASE.saturating_add(code)),
        reason: format!("{code}: {reason}").into(),
    }))
}

async fn eject_malformed(service: &ReplicationService, channel: ChannelId) {
    let reason = EjectReason::MalformedUpdate;
    if let Err(e) = service.eject(channel, reason, reason.default_message()).await {
        error!("Failed to eject {}: {}", channel, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_frame_carries_code_and_message() {
        match close_message(122, "Bad credentials") {
            Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 4122);
                assert_eq!(frame.reason.as_str(), "122: Bad credentials");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
