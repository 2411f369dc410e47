use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of feed categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "top3")]
    TopRank,
    #[serde(rename = "bounty")]
    Bounty,
    #[serde(rename = "issue")]
    Issue,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::TopRank, Category::Bounty, Category::Issue];

    /// Map a server label onto the enum: case-insensitive, hyphens removed,
    /// anything unrecognised becomes [`Category::Issue`].
    #[must_use]
    pub fn normalize(label: &str) -> Self {
        let key: String = label
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "top3" => Self::TopRank,
            "bounty" => Self::Bounty,
            _ => Self::Issue,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TopRank => "top3",
            Self::Bounty => "bounty",
            Self::Issue => "issue",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of an entry. Bulk entries carry the server's time string, streamed
/// ones their epoch-millisecond timestamp. Not used for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Epoch(i64),
    Timestamp(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(ms) => write!(f, "{ms}"),
            Self::Timestamp(s) => f.write_str(s),
        }
    }
}

/// One line of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: EntryId,
    pub category: Category,
    pub actor: String,
    pub message: String,
    /// ISO-8601, UTC, millisecond precision.
    pub occurred_at: String,
}

/// Display-only projection of the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    #[must_use]
    pub fn matches(self, entry: &FeedEntry) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => entry.category == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "top3" => Ok(Self::Only(Category::TopRank)),
            "bounty" => Ok(Self::Only(Category::Bounty)),
            "issue" => Ok(Self::Only(Category::Issue)),
            other => Err(format!("unknown category filter '{other}'")),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(category) => category.fmt(f),
        }
    }
}

pub(crate) fn to_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `1700000000000` → `2023-11-14T22:13:20.000Z`.
#[must_use]
pub fn epoch_millis_to_iso(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(to_iso)
}

/// Parse a server time string. RFC 3339 strings keep their offset; naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` strings are taken as UTC.
#[must_use]
pub fn server_time_to_iso(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_iso(at.with_timezone(&Utc)));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| to_iso(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ignores_case_and_hyphens() {
        assert_eq!(Category::normalize("Top-3"), Category::TopRank);
        assert_eq!(Category::normalize("BOUNTY"), Category::Bounty);
        assert_eq!(Category::normalize("b-o-u-n-t-y"), Category::Bounty);
        assert_eq!(Category::normalize("issue"), Category::Issue);
    }

    #[test]
    fn unknown_labels_become_issue() {
        for label in ["issue-report", "pr-merged", "", "top-4", "🎉"] {
            assert_eq!(Category::normalize(label), Category::Issue, "{label}");
        }
    }

    #[test]
    fn epoch_conversion_is_utc_with_millis() {
        assert_eq!(
            epoch_millis_to_iso(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert_eq!(epoch_millis_to_iso(0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn server_time_accepts_offsets_and_naive_values() {
        assert_eq!(
            server_time_to_iso("2024-03-01T12:00:00+02:00").as_deref(),
            Some("2024-03-01T10:00:00.000Z")
        );
        assert_eq!(
            server_time_to_iso("2024-03-01T12:00:00.123456").as_deref(),
            Some("2024-03-01T12:00:00.123Z")
        );
        assert_eq!(
            server_time_to_iso("2024-03-01 12:00:00").as_deref(),
            Some("2024-03-01T12:00:00.000Z")
        );
        assert_eq!(server_time_to_iso("yesterday"), None);
    }

    #[test]
    fn filter_parses_all_and_labels() {
        assert_eq!("all".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "Top3".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(Category::TopRank))
        );
        assert!("misc".parse::<CategoryFilter>().is_err());
    }
}
