pub mod channels;
pub mod conversations;
pub mod members;
pub mod messages;
pub mod reactions;
pub mod uploads;
pub mod users;
pub mod workspaces;

pub(crate) use members::{member_for, require_admin, require_member};
