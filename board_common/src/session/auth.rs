//! Sign-in completion and sign-out.
//!
//! After the OAuth round-trip the backend hands the client an access token and
//! the GitHub handle. [`complete_sign_in`] verifies the token and installs the
//! resulting session.

use serde::Deserialize;

use super::model::{Identity, Session};
use crate::error::ClientError;
use crate::retrieve::{ApiClient, ApiRequest, ApiResponse};

pub const VERIFY_PATH: &str = "/api/v1/auth/verify";

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: Option<VerifiedUser>,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    github_username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    pr_count: Option<i64>,
    #[serde(default)]
    issues_solved: Option<i64>,
}

impl From<VerifiedUser> for Identity {
    fn from(user: VerifiedUser) -> Self {
        Self {
            handle: user.github_username,
            display_name: user.full_name,
            email: user.email,
            category: user.category.unwrap_or_else(|| "fullstack".to_string()),
            points: user.points.unwrap_or(0),
            pull_request_count: user.pr_count.unwrap_or(0),
            issues_solved_count: user.issues_solved.unwrap_or(0),
        }
    }
}

/// Verify `access_token` and, if the backend returns a user, install a new
/// session for it. Both the token and the handle from the callback must be
/// present. On any failure the current session is left untouched.
pub async fn complete_sign_in(
    client: &ApiClient,
    access_token: &str,
    handle: &str,
    refresh_token: Option<&str>,
) -> ApiResponse<Identity> {
    if access_token.trim().is_empty() || handle.trim().is_empty() {
        return ApiResponse::failed(&ClientError::InvalidRequest(
            "sign-in callback needs both a token and a username".into(),
        ));
    }

    // The verify call must use the new token and must not refresh (or clear)
    // whatever session is currently installed.
    let request = ApiRequest::get(VERIFY_PATH)
        .header("Authorization", format!("Bearer {access_token}"))
        .without_refresh();
    let response = client.call::<VerifyResponse>(&request).await;
    if !response.success {
        return ApiResponse {
            success: false,
            data: None,
            error: response.error,
            status: response.status,
        };
    }

    let Some(user) = response.data.and_then(|r| r.user) else {
        return ApiResponse::failed(&ClientError::Decode("verify response has no user".into()));
    };
    if !user.github_username.eq_ignore_ascii_case(handle) {
        tracing::warn!(
            callback = handle,
            verified = %user.github_username,
            "Callback username differs from verified user"
        );
    }

    let identity = Identity::from(user);
    let mut session = Session::new(access_token, identity.clone());
    if let Some(refresh) = refresh_token {
        session = session.with_refresh_token(refresh);
    }
    if let Err(e) = client.session().set(session) {
        tracing::error!(error = %e, "Verified but the session could not be persisted");
        return ApiResponse::failed(&e);
    }
    tracing::info!(handle = %identity.handle, "Signed in");
    ApiResponse {
        success: true,
        data: Some(identity),
        error: None,
        status: response.status,
    }
}

/// Drop the current session.
///
/// # Errors
///
/// Returns [`ClientError::Storage`] if the persisted copy cannot be removed.
pub fn sign_out(client: &ApiClient) -> Result<(), ClientError> {
    client.session().clear()?;
    tracing::info!("Signed out");
    Ok(())
}
