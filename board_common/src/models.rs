//! # Backend Response Models
//!
//! Shapes of the JSON documents served by the leaderboard backend. Fields the
//! backend may omit are `Option` or `#[serde(default)]`.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept an identifier sent either as a JSON string or a number.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// One row of a track leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub github_username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub pr_count: i64,
    #[serde(default)]
    pub issues_solved: i64,
    pub rank: u32,
}

/// Both track leaderboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboards {
    #[serde(default)]
    pub fullstack: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub aiml: Vec<LeaderboardEntry>,
}

impl Leaderboards {
    /// Rank of `handle` on whichever track lists it, fullstack first.
    #[must_use]
    pub fn rank_of(&self, handle: &str) -> Option<u32> {
        self.fullstack
            .iter()
            .chain(self.aiml.iter())
            .find(|entry| entry.github_username.eq_ignore_ascii_case(handle))
            .map(|entry| entry.rank)
    }

    #[must_use]
    pub fn track(&self, category: &str) -> Option<&[LeaderboardEntry]> {
        match category {
            "fullstack" => Some(&self.fullstack),
            "aiml" => Some(&self.aiml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeaderboardResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub leaderboards: Leaderboards,
}

/// Public profile page data for one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub message: Option<String>,
    pub github_username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bounty: i64,
    #[serde(default)]
    pub pull_request_count: i64,
    #[serde(default)]
    pub pull_request_merged: i64,
    #[serde(default)]
    pub pending_issue_count: i64,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub documentation_count: i64,
    #[serde(default)]
    pub bug_report_count: i64,
    #[serde(default)]
    pub feature_count: i64,
    #[serde(default)]
    pub test_count: i64,
    #[serde(default)]
    pub badges: Vec<String>,
}

impl Profile {
    /// First, middle and last name joined with single spaces.
    #[must_use]
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub full_name: Option<String>,
    pub github_username: String,
    #[serde(default)]
    pub bounty: i64,
    #[serde(default)]
    pub solutions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationsResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Registration>,
}

/// A participating repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectsResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub projects: Vec<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub username: String,
}

/// An open issue of a repository, possibly claimed by contributors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(deserialize_with = "string_or_number")]
    pub issue_id: String,
    pub title: String,
    pub issue_url: String,
    #[serde(default)]
    pub claimants: Vec<Claimant>,
}

impl Issue {
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        !self.claimants.is_empty()
    }

    #[must_use]
    pub fn claimed_by(&self) -> Vec<&str> {
        self.claimants.iter().map(|c| c.username.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuesResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(handle: &str, rank: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            github_username: handle.into(),
            full_name: None,
            category: None,
            points: 0,
            pr_count: 0,
            issues_solved: 0,
            rank,
        }
    }

    #[test]
    fn rank_of_searches_both_tracks() {
        let boards = Leaderboards {
            fullstack: vec![entry("alice", 1), entry("bob", 2)],
            aiml: vec![entry("carol", 1)],
        };
        assert_eq!(boards.rank_of("bob"), Some(2));
        assert_eq!(boards.rank_of("Carol"), Some(1));
        assert_eq!(boards.rank_of("dave"), None);
    }

    #[test]
    fn leaderboard_response_decodes() {
        let body = json!({
            "message": "ok",
            "leaderboards": {
                "fullstack": [{
                    "github_username": "alice",
                    "full_name": "Alice Liddell",
                    "category": "fullstack",
                    "points": 120,
                    "pr_count": 4,
                    "issues_solved": 3,
                    "rank": 1
                }],
                "aiml": []
            }
        });
        let response: LeaderboardResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.leaderboards.fullstack[0].points, 120);
        assert!(response.leaderboards.aiml.is_empty());
    }

    #[test]
    fn issue_claimants_are_optional() {
        let unclaimed: Issue = serde_json::from_value(json!({
            "issue_id": 7,
            "title": "Fix login",
            "issue_url": "https://github.com/org/repo/issues/7"
        }))
        .unwrap();
        assert!(!unclaimed.is_claimed());

        let claimed: Issue = serde_json::from_value(json!({
            "issue_id": 8,
            "title": "Add tests",
            "issue_url": "https://github.com/org/repo/issues/8",
            "claimants": [{"username": "alice"}, {"username": "bob"}]
        }))
        .unwrap();
        assert_eq!(claimed.claimed_by(), vec!["alice", "bob"]);
    }

    #[test]
    fn repository_ids_accept_strings_and_numbers() {
        let numeric: Repository = serde_json::from_value(json!({
            "id": 12, "name": "board", "url": "https://github.com/org/board"
        }))
        .unwrap();
        let text: Repository = serde_json::from_value(json!({
            "id": "repo-12", "name": "board", "url": "https://github.com/org/board",
            "maintainers": ["alice"], "tags": ["rust"]
        }))
        .unwrap();
        assert_eq!(numeric.id, "12");
        assert_eq!(text.id, "repo-12");
        assert_eq!(text.maintainers, vec!["alice"]);
    }

    #[test]
    fn profile_full_name_skips_missing_parts() {
        let profile: Profile = serde_json::from_value(json!({
            "github_username": "alice",
            "first_name": "Alice",
            "last_name": "Liddell",
            "badges": ["first-pr"]
        }))
        .unwrap();
        assert_eq!(profile.full_name(), "Alice Liddell");
        assert_eq!(profile.badges, vec!["first-pr"]);
    }
}
