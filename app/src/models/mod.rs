pub mod categories;
pub mod colors;
pub mod guild;
pub mod user;

pub use guild::{Category, GuildData, RoleUse, Team};
pub use user::UserData;

/// A stored document: category name to its JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;
