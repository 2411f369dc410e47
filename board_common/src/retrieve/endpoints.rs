//! Typed helpers for the backend's read endpoints. Each one goes through
//! [`ApiClient::call`], so it gets the same refresh-and-retry behaviour.

use super::api_client::{ApiClient, ApiRequest, ApiResponse};
use crate::error::ClientError;
use crate::models::{
    Issue, IssuesResponse, Leaderboards, LeaderboardResponse, Profile, ProjectsResponse,
    Registration, RegistrationsResponse, Repository,
};

pub const LEADERBOARD_PATH: &str = "/leaderboard";
pub const PROFILE_PATH: &str = "/profile";
pub const REGISTRATIONS_PATH: &str = "/registrations";
pub const PROJECTS_PATH: &str = "/projects";
pub const ISSUES_PATH: &str = "/issues";
pub const RECENT_UPDATES_PATH: &str = "/updates/latest";
pub const LIVE_UPDATES_PATH: &str = "/updates/live";

impl ApiClient {
    pub async fn fetch_leaderboards(&self) -> ApiResponse<Leaderboards> {
        self.call::<LeaderboardResponse>(&ApiRequest::get(LEADERBOARD_PATH))
            .await
            .map(|r| r.leaderboards)
    }

    pub async fn fetch_profile(&self, handle: &str) -> ApiResponse<Profile> {
        self.call(&ApiRequest::get(PROFILE_PATH).query("user", handle))
            .await
    }

    pub async fn fetch_registrations(&self) -> ApiResponse<Vec<Registration>> {
        self.call::<RegistrationsResponse>(&ApiRequest::get(REGISTRATIONS_PATH))
            .await
            .map(|r| r.profiles)
    }

    pub async fn fetch_projects(&self) -> ApiResponse<Vec<Repository>> {
        self.call::<ProjectsResponse>(&ApiRequest::get(PROJECTS_PATH))
            .await
            .map(|r| r.projects)
    }

    pub async fn fetch_issues(&self, repo_id: &str) -> ApiResponse<Vec<Issue>> {
        let url = match self.issues_url(repo_id) {
            Ok(url) => url,
            Err(e) => return ApiResponse::failed(&e),
        };
        self.call::<IssuesResponse>(&ApiRequest::get(url))
            .await
            .map(|r| r.issues)
    }

    /// `/issues/{repo_id}` with the id encoded as a single path segment.
    fn issues_url(&self, repo_id: &str) -> Result<String, ClientError> {
        let mut url = self.config().endpoint(ISSUES_PATH)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidRequest("backend url cannot take a path".into()))?
            .push(repo_id);
        Ok(url.to_string())
    }
}
