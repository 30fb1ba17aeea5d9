//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs behavior such as the target repository,
//! the trailing time frame, and concurrency limits for GitHub API access.

use crate::window::TimeFrame;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Which commit on a PR anchors the lead-time measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitCounting {
    First,
    Last,
}

impl Default for CommitCounting {
    fn default() -> Self {
        Self::Last
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Owner of the repository to analyze.
    pub repo_owner: String,

    /// Name of the repository to analyze.
    pub repo_name: String,

    /// Optional GitHub Personal Access Token for private repos and higher rate limits.
    pub github_token: Option<String>,

    /// Trailing window to aggregate over. Accepts "30", "30d" or "4w".
    #[serde(default, deserialize_with = "deserialize_time_frame")]
    pub time_frame: TimeFrame,

    /// Branch whose workflow runs count as deployments.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Explicit workflow ids to track. Empty means every workflow in the repo.
    /// Expected format: comma-separated numeric ids, e.g. "1234,5678".
    #[serde(default, deserialize_with = "deserialize_workflow_ids")]
    pub workflows: Vec<u64>,

    /// Whether lead time starts at the first or the last commit of a PR.
    #[serde(default)]
    pub commit_counting: CommitCounting,

    /// Optional team name for response metrics. Slugified before use.
    pub team: Option<String>,

    /// Worker count for per-item follow-up fetches (reviews, commits, files).
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Process-wide cap on simultaneously in-flight GitHub requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_requests: usize,

    /// Page size for collection endpoints, capped at GitHub's maximum of 100.
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Base URL of the GitHub API. Overridable for tests.
    #[serde(default = "default_api_url")]
    pub github_api_url: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_max_in_flight() -> usize {
    10
}

fn default_per_page() -> u8 {
    100
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        let mut config: Self = envy::from_env()?;
        config.per_page = config.per_page.min(100);
        Ok(config)
    }

    pub fn repo_id(&self) -> RepoId {
        RepoId {
            owner: self.repo_owner.clone(),
            repo: self.repo_name.clone(),
        }
    }

    /// The configured team name as a GitHub team slug (lowercased, spaces to hyphens).
    pub fn team_slug(&self) -> Option<String> {
        self.team.as_deref().map(slugify)
    }
}

fn slugify(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn deserialize_time_frame<'de, D>(deserializer: D) -> Result<TimeFrame, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn deserialize_workflow_ids<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid workflow id '{part}'")))
        })
        .collect()
}
