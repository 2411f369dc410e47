//! # Repository Catalog
//!
//! ## Purpose:
//! Caches the participating repositories and their issues so that browsing
//! does not hit the backend on every view. Entries expire after a TTL
//! (fifteen minutes by default). Refreshing the repository list drops every
//! cached issue list, since repository ids may have changed.
//!
//! A failed refresh is logged and the cached value (or an empty list) is
//! returned; callers never see an error from the catalog.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::{Issue, Repository};
use crate::retrieve::ApiClient;

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    repos: Option<Cached<Vec<Repository>>>,
    issues: HashMap<String, Cached<Vec<Issue>>>,
}

pub struct RepositoryCatalog {
    client: Arc<ApiClient>,
    ttl: Duration,
    state: Mutex<CatalogState>,
}

impl RepositoryCatalog {
    /// Catalog using the client's configured TTL.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let ttl = client.config().catalog_ttl();
        Self::with_ttl(client, ttl)
    }

    #[must_use]
    pub fn with_ttl(client: Arc<ApiClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// All repositories, refetched when the cache is empty or stale.
    pub async fn get_all_repos(&self) -> Vec<Repository> {
        let mut state = self.state.lock().await;
        let stale = match &state.repos {
            Some(cached) => cached.value.is_empty() || !cached.is_fresh(self.ttl),
            None => true,
        };
        if stale {
            let response = self.client.fetch_projects().await;
            match response.data {
                Some(repos) if response.success => {
                    tracing::debug!(count = repos.len(), "Repository list refreshed");
                    state.repos = Some(Cached::new(repos));
                    state.issues.clear();
                }
                _ => {
                    tracing::error!(
                        error = ?response.error,
                        "Failed to fetch repos, serving cached list"
                    );
                }
            }
        }
        state
            .repos
            .as_ref()
            .map(|cached| cached.value.clone())
            .unwrap_or_default()
    }

    /// Issues of one repository, refetched when missing or stale.
    pub async fn get_issues_for_repo(&self, repo_id: &str) -> Vec<Issue> {
        let mut state = self.state.lock().await;
        let stale = state
            .issues
            .get(repo_id)
            .map_or(true, |cached| !cached.is_fresh(self.ttl));
        if stale {
            let response = self.client.fetch_issues(repo_id).await;
            match response.data {
                Some(issues) if response.success => {
                    tracing::debug!(repo_id, count = issues.len(), "Issues refreshed");
                    state.issues.insert(repo_id.to_string(), Cached::new(issues));
                }
                _ => {
                    tracing::error!(
                        repo_id,
                        error = ?response.error,
                        "Failed to fetch issues, serving cached list"
                    );
                }
            }
        }
        state
            .issues
            .get(repo_id)
            .map(|cached| cached.value.clone())
            .unwrap_or_default()
    }

    /// Forget everything; the next read refetches.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        *state = CatalogState::default();
    }
}

impl std::fmt::Debug for RepositoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryCatalog")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
