use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;
use crate::models::StreamScope;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was posted
    MessageCreate {
        scope: StreamScope,
        message: MessageResponse,
    },

    /// A message body was edited
    MessageUpdate {
        scope: StreamScope,
        message: MessageResponse,
    },

    /// A message (and its replies) was deleted
    MessageDelete {
        scope: StreamScope,
        message_id: Uuid,
    },

    /// A user started typing in a channel
    TypingStart {
        scope: StreamScope,
        user_id: Uuid,
        username: String,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },

    /// A reaction was added to a message
    ReactionAdd {
        scope: StreamScope,
        message_id: Uuid,
        member_id: Uuid,
        value: String,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        scope: StreamScope,
        message_id: Uuid,
        member_id: Uuid,
        value: String,
    },
}

impl GatewayEvent {
    /// Returns the stream scope if this event belongs to a specific channel
    /// or conversation. Events that return `None` are global and are
    /// delivered to every connected client.
    pub fn scope(&self) -> Option<StreamScope> {
        match self {
            Self::MessageCreate { scope, .. }
            | Self::MessageUpdate { scope, .. }
            | Self::MessageDelete { scope, .. }
            | Self::TypingStart { scope, .. }
            | Self::ReactionAdd { scope, .. }
            | Self::ReactionRemove { scope, .. } => Some(*scope),
            Self::Ready { .. } | Self::PresenceUpdate { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Replace this connection's channel subscription set. Only events for
    /// subscribed channels are forwarded; conversation events are always
    /// delivered directly to the two participants and need no subscription.
    Subscribe { channel_ids: Vec<Uuid> },

    /// Indicate typing in a channel
    StartTyping { channel_id: Uuid },
}
