use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member's role within one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

/// Where a message lives. A top-level message belongs to exactly one channel
/// or one conversation; a reply belongs to the thread rooted at its parent
/// message and inherits the parent's channel/conversation columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageScope {
    Channel(Uuid),
    Conversation(Uuid),
    Thread(Uuid),
}

/// Stream identity used for gateway event routing. Channel events are
/// broadcast and filtered against per-connection subscriptions; conversation
/// events are delivered only to the two participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum StreamScope {
    Channel(Uuid),
    Conversation(Uuid),
}
