use crate::config::{AppConfig, RepoId};
use crate::error::{AppError, Result};
use crate::governor::{Governor, GovernorConfig};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRef {
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub requested_teams: Vec<TeamRef>,
    #[serde(default)]
    pub user: Option<Author>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrFile {
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrCommit {
    pub commit: CommitData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitData {
    #[serde(default)]
    pub committer: Option<CommitSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSignature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowList {
    pub workflows: Vec<Workflow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRunList {
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Typed GitHub REST client. All requests pass through the governor, and
/// collection endpoints are consumed through [`GitHubClient::paginate`]-built
/// streams that follow the `Link` header.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    governor: Governor,
    per_page: u8,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let governor_config = GovernorConfig {
            max_in_flight: config.max_in_flight_requests,
            ..GovernorConfig::default()
        };
        Self::with_governor(config, governor_config)
    }

    /// Like [`GitHubClient::new`] but with explicit governor timings. Used by
    /// tests to shrink backoff floors.
    pub fn with_governor(config: &AppConfig, governor_config: GovernorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &config.github_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| AppError::Config("token contains invalid header bytes".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("dora-metrics/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.github_api_url.trim_end_matches('/').to_string(),
            governor: Governor::new(governor_config),
            per_page: config.per_page.min(100),
        })
    }

    async fn get(&self, url: Url) -> Result<Response> {
        self.governor.send(self.http.get(url)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get(url).await?;
        Ok(response.json::<T>().await?)
    }

    fn collection_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let per_page = self.per_page.to_string();
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", &per_page);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Follows `Link: <...>; rel="next"` pagination lazily, yielding items in
    /// page order. The stream is one-pass; pagination stops at the first page
    /// with no next link or no items. A mid-pagination failure surfaces as one
    /// `Err` item, after which the stream is done (partial result).
    fn paginate<'a, P, T>(
        &'a self,
        first: Url,
        extract: fn(P) -> Vec<T>,
    ) -> impl Stream<Item = Result<T>> + 'a
    where
        P: DeserializeOwned + 'a,
        T: Send + 'static,
    {
        stream::try_unfold(Some(first), move |state| async move {
            let Some(url) = state else {
                return Ok::<_, AppError>(None);
            };
            let response = self.get(url).await?;
            let next = next_link(response.headers());
            let page: P = response.json().await?;
            let items = extract(page);
            if items.is_empty() {
                return Ok(None);
            }
            Ok(Some((
                stream::iter(items.into_iter().map(Ok::<T, AppError>)),
                next,
            )))
        })
        .try_flatten()
    }

    /// Echo-back repository lookup; doubles as the startup auth/existence check.
    pub async fn repository(&self, repo: &RepoId) -> Result<Repository> {
        let url = Url::parse(&format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.repo))?;
        self.get_json(url).await
    }

    pub fn pull_requests<'a>(
        &'a self,
        repo: &RepoId,
        params: &[(&str, &str)],
    ) -> Result<impl Stream<Item = Result<PullRequest>> + 'a> {
        let url = self.collection_url(&format!("repos/{}/{}/pulls", repo.owner, repo.repo), params)?;
        Ok(self.paginate::<Vec<PullRequest>, _>(url, std::convert::identity))
    }

    pub fn pr_commits<'a>(
        &'a self,
        repo: &RepoId,
        number: u64,
    ) -> Result<impl Stream<Item = Result<PrCommit>> + 'a> {
        let url = self.collection_url(
            &format!("repos/{}/{}/pulls/{number}/commits", repo.owner, repo.repo),
            &[],
        )?;
        Ok(self.paginate::<Vec<PrCommit>, _>(url, std::convert::identity))
    }

    pub fn pr_files<'a>(
        &'a self,
        repo: &RepoId,
        number: u64,
    ) -> Result<impl Stream<Item = Result<PrFile>> + 'a> {
        let url = self.collection_url(
            &format!("repos/{}/{}/pulls/{number}/files", repo.owner, repo.repo),
            &[],
        )?;
        Ok(self.paginate::<Vec<PrFile>, _>(url, std::convert::identity))
    }

    pub fn pr_reviews<'a>(
        &'a self,
        repo: &RepoId,
        number: u64,
    ) -> Result<impl Stream<Item = Result<Review>> + 'a> {
        let url = self.collection_url(
            &format!("repos/{}/{}/pulls/{number}/reviews", repo.owner, repo.repo),
            &[],
        )?;
        Ok(self.paginate::<Vec<Review>, _>(url, std::convert::identity))
    }

    pub fn workflows<'a>(
        &'a self,
        repo: &RepoId,
    ) -> Result<impl Stream<Item = Result<Workflow>> + 'a> {
        let url = self.collection_url(
            &format!("repos/{}/{}/actions/workflows", repo.owner, repo.repo),
            &[],
        )?;
        Ok(self.paginate(url, |list: WorkflowList| list.workflows))
    }

    /// Completed runs of one workflow, newest first.
    pub fn workflow_runs<'a>(
        &'a self,
        repo: &RepoId,
        workflow_id: u64,
    ) -> Result<impl Stream<Item = Result<WorkflowRun>> + 'a> {
        let url = self.collection_url(
            &format!(
                "repos/{}/{}/actions/workflows/{workflow_id}/runs",
                repo.owner, repo.repo
            ),
            &[("status", "completed")],
        )?;
        Ok(self.paginate(url, |list: WorkflowRunList| list.workflow_runs))
    }

    pub fn team_members<'a>(
        &'a self,
        org: &str,
        team_slug: &str,
    ) -> Result<impl Stream<Item = Result<Author>> + 'a> {
        let url = self.collection_url(&format!("orgs/{org}/teams/{team_slug}/members"), &[])?;
        Ok(self.paginate::<Vec<Author>, _>(url, std::convert::identity))
    }
}

/// Extracts the rel="next" target from a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| param.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()
    })
}
