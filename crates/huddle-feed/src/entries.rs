use chrono::{DateTime, Utc};
use uuid::Uuid;

use huddle_types::api::MessageResponse;

use crate::assembler::FeedEntry;

/// Author continuity is keyed on the workspace member, not the user, so a
/// person's messages in two workspaces never merge.
impl FeedEntry for MessageResponse {
    fn author_member(&self) -> Uuid {
        self.member_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
