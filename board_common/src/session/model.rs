use serde::{Deserialize, Serialize};

/// Profile snapshot of the signed-in user.
///
/// Denormalised from the verify endpoint at sign-in time and never refreshed
/// afterwards, so it may go stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// GitHub handle.
    pub handle: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Leaderboard track, e.g. `fullstack` or `aiml`.
    pub category: String,
    pub points: i64,
    pub pull_request_count: i64,
    pub issues_solved_count: i64,
}

/// Credentials plus identity of the signed-in user.
///
/// A `Session` always carries both an access token and an identity; the
/// absence of a session is modelled as `Option<Session>::None`, so a partial
/// session cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub identity: Identity,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, identity: Identity) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            identity,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Copy of this session with a new access token; identity and refresh
    /// token are kept as they are.
    #[must_use]
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_identity(handle: &str) -> Identity {
    Identity {
        handle: handle.to_string(),
        display_name: Some("Alice Liddell".into()),
        email: None,
        category: "fullstack".into(),
        points: 120,
        pull_request_count: 4,
        issues_solved_count: 3,
    }
}
