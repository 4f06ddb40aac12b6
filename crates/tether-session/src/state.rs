//! The in-memory session state.

use crate::Profile;

/// What the rest of the application sees of authentication.
///
/// Owned by the [`SessionManager`](crate::SessionManager) and only ever
/// changed through its operations. Never persisted; it is rebuilt from
/// the stored credential and the backend on every start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// `true` once the backend has confirmed the stored credential.
    pub authenticated: bool,

    /// The signed-in user's profile.
    pub user: Option<Profile>,

    /// `true` only while an auth check is in flight.
    pub loading: bool,
}

impl Session {
    /// The signed-in user's profile, if authenticated.
    pub fn current_user(&self) -> Option<&Profile> {
        self.user.as_ref().filter(|_| self.authenticated)
    }
}
