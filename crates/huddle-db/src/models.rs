/// Database row types that map directly to SQLite rows.
/// Distinct from the huddle-types API models to keep the store layer
/// independent; ids and timestamps stay TEXT here and are parsed at the
/// API boundary.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub image: Option<String>,
    pub created_at: String,
}

pub struct WorkspaceRow {
    pub id: String,
    pub name: String,
    pub join_code: String,
    pub creator_user_id: String,
    pub created_at: String,
}

pub struct MemberRow {
    pub id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

impl MemberRow {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Member joined with its user record, for roster listings.
pub struct MemberWithUserRow {
    pub member: MemberRow,
    pub username: String,
    pub image: Option<String>,
}

pub struct ChannelRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub workspace_id: String,
    pub member_one_id: String,
    pub member_two_id: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct MessageRow {
    pub id: String,
    pub workspace_id: String,
    pub member_id: String,
    pub channel_id: Option<String>,
    pub conversation_id: Option<String>,
    pub parent_message_id: Option<String>,
    pub body: String,
    pub image_id: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    /// Joined from members -> users.
    pub author_name: String,
    pub author_image: Option<String>,
}

pub struct ReactionRow {
    pub id: String,
    pub workspace_id: String,
    pub message_id: String,
    pub member_id: String,
    pub value: String,
    pub created_at: String,
}

/// Outcome of a reaction toggle. Tagged so callers never infer
/// add-vs-remove from row presence.
#[derive(Debug, PartialEq, Eq)]
pub enum ReactionToggle {
    Added(String),
    Removed(String),
}

/// Derived per-thread-root summary, folded from the replies of one page
/// of messages.
pub struct ThreadSummaryRow {
    pub parent_message_id: String,
    pub count: u64,
    pub last_reply_at: String,
    pub last_reply_author_name: String,
    pub last_reply_author_image: Option<String>,
}

pub struct UploadRow {
    pub id: String,
    pub owner_user_id: String,
    pub token: String,
    pub size: Option<i64>,
    pub expires_at: String,
    pub created_at: String,
}
