pub mod auth;
pub mod channels;
pub mod conversations;
pub(crate) mod convert;
pub mod error;
pub mod files;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod workspaces;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ApiResult};
