use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, NotificationKind};

/// Commands sent FROM client TO server over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Enter a conversation room to receive its message broadcasts.
    /// Joining a room the connection is already in is a no-op.
    JoinConversation { conversation_id: Uuid },

    /// Leave a conversation room. Leaving a room the connection is not
    /// in is a no-op.
    LeaveConversation { conversation_id: Uuid },

    /// Send a chat message. `ack` is an optional client-chosen reference;
    /// when present the server answers with a MessageAck carrying it, so
    /// the client can distinguish "sent" from "pending".
    SendMessage {
        conversation_id: Uuid,
        content: String,
        #[serde(default)]
        attachments: Vec<String>,
        #[serde(default)]
        ack: Option<u64>,
    },
}

/// Events sent FROM server TO client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was posted in a conversation this connection has joined
    NewMessage {
        conversation_id: Uuid,
        message: ChatMessage,
    },

    /// A notification addressed to this connection's user. Carries enough
    /// of the payload for the client to refresh its unread badge without
    /// a round trip.
    NewNotification {
        id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
        link: String,
        payload: serde_json::Value,
    },

    /// Per-send acknowledgment, echoed only to the sending connection.
    /// Exactly one of `message` / `error` is set.
    MessageAck {
        ack: u64,
        success: bool,
        message: Option<ChatMessage>,
        error: Option<String>,
    },
}
