//! Single-run orchestration.
//!
//! `MetricsQuerier` drives one end-to-end pass: validate the repository,
//! resolve the team roster, walk the PR and workflow-run listings for the
//! window, fan out the per-item follow-up fetches, and fold everything into
//! one [`Report`].
//!
//! Listing streams are newest-first, so each walk stops at the first item
//! older than the window start instead of paging through history. A listing
//! error mid-walk truncates that listing to what was already seen; per-item
//! failures are absorbed by the dispatcher as zero contributions. Only
//! configuration and authentication problems abort the run.

use crate::config::AppConfig;
use crate::deployment::DeploymentStats;
use crate::dispatcher;
use crate::error::Result;
use crate::github::{GitHubClient, PrCommit, PrFile, PullRequest, Review, WorkflowRun};
use crate::lead_time::{pr_lead_seconds, LeadTimeStats};
use crate::metrics::{extract_pr_metrics, PrAggregate, PrMetrics};
use crate::report::Report;
use crate::team::{TeamContext, TeamSummary};
use crate::window::TimeWindow;
use chrono::Utc;
use futures::stream::TryStreamExt;
use futures::StreamExt;
use std::pin::pin;

pub struct MetricsQuerier {
    client: GitHubClient,
    config: AppConfig,
    window: TimeWindow,
}

impl MetricsQuerier {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = GitHubClient::new(&config)?;
        let window = TimeWindow::trailing(config.time_frame, Utc::now());
        Ok(Self {
            client,
            config,
            window,
        })
    }

    /// Assembles a querier from pre-built parts. Tests use this to pin the
    /// window end and point the client at a mock server.
    pub fn with_parts(config: AppConfig, client: GitHubClient, window: TimeWindow) -> Self {
        Self {
            client,
            config,
            window,
        }
    }

    pub async fn run(&self) -> Result<Report> {
        let repo = self.config.repo_id();
        let repository = self.client.repository(&repo).await?;
        tracing::info!(
            repository = %repository.full_name,
            days = self.config.time_frame.num_days(),
            "starting metrics run"
        );

        let team = self.resolve_team().await?;

        let prs = self.prs_in_window().await?;
        tracing::info!(count = prs.len(), "pull requests in window");
        let (aggregate, pr_failures) = self.collect_pr_metrics(prs, team.as_ref()).await;

        let (runs, run_failures) = self.deployment_runs().await?;
        tracing::info!(count = runs.len(), "deployment runs in window");
        let deployments = DeploymentStats::from_runs(&runs);

        let mut lead_time = LeadTimeStats::default();
        for run in &runs {
            lead_time.add_workflow_run(run);
        }
        let lead_failures = self.collect_pr_lead_times(&mut lead_time).await?;

        let days = self.config.time_frame.num_days();
        let team_report = team.map(|ctx| (ctx.slug, TeamSummary::from_aggregate(&aggregate)));

        Ok(Report::assemble(
            &repository,
            days,
            aggregate.summarize(days),
            team_report,
            &deployments,
            lead_time.evaluate(),
            pr_failures + run_failures + lead_failures,
        ))
    }

    /// Resolves the configured team into a slug plus member roster. A team
    /// that cannot be fetched is a configuration problem, not a partial
    /// result, so errors here abort the run.
    async fn resolve_team(&self) -> Result<Option<TeamContext>> {
        let Some(slug) = self.config.team_slug() else {
            return Ok(None);
        };
        let members: Vec<String> = self
            .client
            .team_members(&self.config.repo_owner, &slug)?
            .map_ok(|member| member.login)
            .try_collect()
            .await?;
        tracing::debug!(team = %slug, members = members.len(), "resolved team roster");
        Ok(Some(TeamContext::new(&slug, members)))
    }

    /// PRs created inside the window, newest-created first from the API.
    async fn prs_in_window(&self) -> Result<Vec<PullRequest>> {
        let repo = self.config.repo_id();
        let stream = self.client.pull_requests(
            &repo,
            &[
                ("state", "all"),
                ("sort", "created"),
                ("direction", "desc"),
            ],
        )?;
        let mut stream = pin!(stream);

        let mut prs = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(pr) => {
                    if pr.created_at < self.window.start {
                        break;
                    }
                    if self.window.contains(pr.created_at) {
                        prs.push(pr);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "pull request listing truncated, using partial window");
                    break;
                }
            }
        }
        Ok(prs)
    }

    async fn collect_pr_metrics(
        &self,
        prs: Vec<PullRequest>,
        team: Option<&TeamContext>,
    ) -> (PrAggregate, usize) {
        let outcome = dispatcher::dispatch(prs, self.config.fetch_concurrency, |pr| {
            self.pr_metrics(pr, team)
        })
        .await;
        (PrAggregate::fold(outcome.results), outcome.failures)
    }

    async fn pr_metrics(&self, pr: PullRequest, team: Option<&TeamContext>) -> Result<PrMetrics> {
        let repo = self.config.repo_id();
        let reviews: Vec<Review> = self.client.pr_reviews(&repo, pr.number)?.try_collect().await?;

        // Commits and files only matter for merged PRs; skip the requests otherwise.
        let (commit_count, files) = if pr.is_merged() {
            let commits: Vec<PrCommit> =
                self.client.pr_commits(&repo, pr.number)?.try_collect().await?;
            let files: Vec<PrFile> =
                self.client.pr_files(&repo, pr.number)?.try_collect().await?;
            (commits.len() as u64, files)
        } else {
            (0, Vec::new())
        };

        Ok(extract_pr_metrics(&pr, commit_count, &files, &reviews, team))
    }

    /// Completed runs on the tracked branch created inside the window, for
    /// either the configured workflows or every workflow in the repository.
    async fn deployment_runs(&self) -> Result<(Vec<WorkflowRun>, usize)> {
        let (workflow_ids, listing_failures) = if self.config.workflows.is_empty() {
            self.list_workflow_ids().await?
        } else {
            (self.config.workflows.clone(), 0)
        };

        let outcome = dispatcher::dispatch(workflow_ids, self.config.fetch_concurrency, |id| {
            self.workflow_runs_in_window(id)
        })
        .await;

        let runs = outcome.results.into_iter().flatten().collect();
        Ok((runs, outcome.failures + listing_failures))
    }

    /// Every workflow id in the repository. A listing error truncates to the
    /// ids already seen and is counted as one fetch failure.
    async fn list_workflow_ids(&self) -> Result<(Vec<u64>, usize)> {
        let repo = self.config.repo_id();
        let stream = self.client.workflows(&repo)?;
        let mut stream = pin!(stream);

        let mut ids = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(workflow) => ids.push(workflow.id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "workflow listing truncated, using partial set");
                    return Ok((ids, 1));
                }
            }
        }
        Ok((ids, 0))
    }

    async fn workflow_runs_in_window(&self, workflow_id: u64) -> Result<Vec<WorkflowRun>> {
        let repo = self.config.repo_id();
        let stream = self.client.workflow_runs(&repo, workflow_id)?;
        let mut stream = pin!(stream);

        let mut runs = Vec::new();
        while let Some(run) = stream.try_next().await? {
            // Runs come newest-first.
            if run.created_at < self.window.start {
                break;
            }
            if self.window.contains(run.created_at)
                && run.head_branch.as_deref() == Some(self.config.branch.as_str())
            {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    /// PRs merged into the tracked branch inside the window. Listing by
    /// `updated` descending is a safe cutoff because a merge always bumps
    /// `updated_at`, so `merged_at <= updated_at`.
    async fn lead_time_prs(&self) -> Result<Vec<PullRequest>> {
        let repo = self.config.repo_id();
        let stream = self.client.pull_requests(
            &repo,
            &[
                ("state", "closed"),
                ("base", self.config.branch.as_str()),
                ("sort", "updated"),
                ("direction", "desc"),
            ],
        )?;
        let mut stream = pin!(stream);

        let mut prs = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(pr) => {
                    if pr.updated_at.is_some_and(|at| at < self.window.start) {
                        break;
                    }
                    if pr.merged_at.is_some_and(|at| self.window.contains(at)) {
                        prs.push(pr);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "merged PR listing truncated, using partial window");
                    break;
                }
            }
        }
        Ok(prs)
    }

    async fn collect_pr_lead_times(&self, stats: &mut LeadTimeStats) -> Result<usize> {
        let prs = self.lead_time_prs().await?;
        let counting = self.config.commit_counting;

        let outcome = dispatcher::dispatch(prs, self.config.fetch_concurrency, |pr| async move {
            let repo = self.config.repo_id();
            let commits: Vec<PrCommit> =
                self.client.pr_commits(&repo, pr.number)?.try_collect().await?;
            Ok(pr_lead_seconds(&pr, &commits, counting))
        })
        .await;

        for lead_secs in outcome.results.into_iter().flatten() {
            stats.add_pr(lead_secs);
        }
        Ok(outcome.failures)
    }
}
