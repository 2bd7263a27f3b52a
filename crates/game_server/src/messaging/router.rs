//! Message routing logic for dispatching client frames to the replication
//! service.

use crate::{connection::ConnectionId, error::ServerError, messaging::decode_frame};
use replication_core::{ChannelId, EjectReason, ReplicationService};
use tracing::{trace, warn};

/// Routes a raw client frame to the replication service.
///
/// # Arguments
///
/// * `text` - The raw frame text from the client (expected to be JSON)
/// * `connection_id` - The connection the frame arrived on
/// * `channel` - The replication channel bound to that connection
/// * `service` - The replication service that owns all object state
///
/// # Returns
///
/// `Ok(())` once the frame was handled, including frames that got the sender
/// ejected, or a `ServerError` if the service failed.
///
/// # Message Flow
///
/// 1. Decode the text as a field update
/// 2. Undecodable frames eject the channel with `MalformedUpdate`
/// 3. Hand the update to the service, which authorizes, applies and fans it out
pub async fn route_client_message(
    text: &str,
    connection_id: ConnectionId,
    channel: ChannelId,
    service: &ReplicationService,
) -> Result<(), ServerError> {
    let request = match decode_frame(text) {
        Ok(request) => request,
        Err(e) => {
            warn!("🚫 Undecodable frame on connection {}: {}", connection_id, e);
            let reason = EjectReason::MalformedUpdate;
            service
                .eject(channel, reason, reason.default_message())
                .await?;
            return Ok(());
        }
    };

    trace!(
        "📨 Routing {}.{} from connection {}",
        request.object_id, request.field, connection_id
    );
    service.handle_client_update(channel, request).await?;
    Ok(())
}
