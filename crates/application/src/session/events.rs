//! Session lifecycle events.

/// Events broadcast by the token store for UI and navigation collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials and profile were stored after a login.
    LoggedIn {
        /// Id of the authenticated user.
        user_id: String,
    },
    /// The access token was refreshed.
    Refreshed,
    /// The user logged out explicitly.
    LoggedOut,
    /// The session was torn down because it could not be refreshed.
    ///
    /// Listeners are expected to redirect to the login flow.
    Expired {
        /// Why the refresh failed.
        reason: String,
    },
}

impl SessionEvent {
    /// Returns true if the session no longer holds credentials after this event.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::Expired { .. })
    }
}
