//! The user profile the backend returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tether_protocol::UserId;

/// User-identifying data returned by the backend.
///
/// A `Profile` is an immutable snapshot. The session manager replaces it
/// wholesale on every successful fetch and never edits it in place.
///
/// The backend's documents are loosely shaped, so only `id` is required.
/// The identifier is accepted as `id` or `_id`, and any fields not named
/// here are kept in [`extra`](Self::extra).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The user's identifier, also the realtime idempotency key.
    #[serde(alias = "_id")]
    pub id: UserId,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Email address.
    #[serde(default)]
    pub email: String,

    /// Role, e.g. `"user"` or `"admin"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Whether the email address has been verified.
    #[serde(default)]
    pub is_account_verified: bool,

    /// Activity history, newest last. Entries are passed through as-is.
    #[serde(default)]
    pub activities: Vec<Value>,

    /// Every other field the backend sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Creates a profile with only an identifier set.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            email: String::new(),
            role: None,
            is_account_verified: false,
            activities: Vec::new(),
            extra: Map::new(),
        }
    }

    /// `true` if the profile's role is `"admin"`.
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
