//! Session state: credentials and the cached user profile.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Access and refresh token issued together by the backend.
///
/// This is the only unit in which credentials are written, so the two
/// tokens are always set and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Longer-lived credential used only to mint a new access token.
    pub refresh_token: String,
}

impl TokenPair {
    /// Creates a new token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Returns the `Authorization` header value for the access token.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        bearer(&self.access_token)
    }
}

/// Cached user profile. The backend remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend identifier.
    #[serde(alias = "_id")]
    pub id: String,
    /// Login email.
    pub email: String,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Role names granted to the user.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl User {
    /// Returns "First Last", trimmed when either part is empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Returns true if the user holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Authenticated state of the running client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Current access token, if logged in.
    pub access_token: Option<String>,
    /// Current refresh token, if logged in.
    pub refresh_token: Option<String>,
    /// Cached profile, if a login has completed since the last logout.
    pub user: Option<User>,
}

impl Session {
    /// Returns an empty (logged-out) session.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user: None,
        }
    }

    /// Returns true if both credentials are present.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    /// Replaces both credentials.
    pub fn set_tokens(&mut self, tokens: TokenPair) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
    }
}

/// Formats a bearer `Authorization` header value.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Returns a loggable preview of a token (first 8 chars + ...).
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.chars().count() > 12 {
        let head: String = token.chars().take(8).collect();
        format!("{head}...")
    } else {
        "***".to_string()
    }
}
