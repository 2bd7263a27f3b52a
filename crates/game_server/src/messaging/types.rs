//! Wire format of the WebSocket text frames.
//!
//! Inbound frames are field updates addressed to an object:
//!
//! ```json
//! { "object_id": 1234, "field": "login", "args": ["guest", "guest"] }
//! ```
//!
//! Outbound frames are [`ClientMessage`] values tagged by `"type"`:
//!
//! ```json
//! { "type": "field_update", "object_id": 100000001, "field": "setXYZH", "args": [0.0, 1.6, 0.0, 90.0] }
//! ```

use crate::error::ServerError;
use replication_core::{ClientMessage, FieldUpdateRequest};

/// Parses an inbound text frame.
pub fn decode_frame(text: &str) -> Result<FieldUpdateRequest, serde_json::Error> {
    serde_json::from_str(text)
}

/// Serializes an outbound message into a text frame payload.
pub fn encode_message(message: &ClientMessage) -> Result<String, ServerError> {
    serde_json::to_string(message)
        .map_err(|e| ServerError::Internal(format!("Failed to encode {}: {e}", message.kind())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication_core::{EjectReason, ObjectId};
    use serde_json::json;

    #[test]
    fn test_decode_login_frame() {
        let request =
            decode_frame(r#"{"object_id": 1234, "field": "login", "args": ["guest", "guest"]}"#)
                .unwrap();
        assert_eq!(request.object_id, ObjectId(1234));
        assert_eq!(request.field, "login");
        assert_eq!(request.args, vec![json!("guest"), json!("guest")]);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        assert!(decode_frame(r#"{"object_id": 1234}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn test_encode_eject() {
        let text = encode_message(&ClientMessage::eject(EjectReason::CheatDetected, "Invalid input"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "eject");
        assert_eq!(value["code"], 152);
        assert_eq!(value["message"], "Invalid input");
    }
}
