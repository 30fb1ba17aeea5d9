//! Per-PR metric extraction and the aggregation fold.
//!
//! `extract_pr_metrics` is a pure function from one pull request and its
//! fetched sub-resources to a fixed-shape [`PrMetrics`] record. Durations
//! default to zero when not applicable (an unmerged PR has no open-to-close
//! time); count denominators track opened vs merged separately so zeros are
//! never conflated with "not measured". [`PrAggregate`] folds those records
//! in any order: the reduction is commutative and associative.

use crate::github::{PrFile, PullRequest, Review};
use crate::team::TeamContext;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeSet;

const QUALIFYING_REVIEW_STATES: [&str; 3] = ["APPROVED", "CHANGES_REQUESTED", "COMMENTED"];

/// Fixed-shape metric record for one pull request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrMetrics {
    pub open_to_close_secs: i64,
    pub time_to_first_review_secs: i64,
    pub time_to_approval_secs: i64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub total_reviews: u64,
    pub total_commits: u64,
    pub total_loc_changed: u64,
    pub review_dates: Vec<DateTime<Utc>>,
    pub review_requested: bool,
    pub team_responded: bool,
    pub first_team_response_secs: Option<i64>,
}

/// Turns one PR plus its sub-resources into a metric record.
///
/// Commits and files are only meaningful for merged PRs; callers skip fetching
/// them otherwise and pass empty values.
pub fn extract_pr_metrics(
    pr: &PullRequest,
    total_commits: u64,
    files: &[PrFile],
    reviews: &[Review],
    team: Option<&TeamContext>,
) -> PrMetrics {
    let mut metrics = PrMetrics {
        prs_opened: 1,
        ..PrMetrics::default()
    };

    if let Some(merged_at) = pr.merged_at {
        metrics.prs_merged = 1;
        metrics.open_to_close_secs = (merged_at - pr.created_at).num_seconds();
        metrics.total_commits = total_commits;
        metrics.total_loc_changed = files.iter().map(|f| f.additions + f.deletions).sum();
    }

    for review in reviews {
        let Some(submitted_at) = review.submitted_at else {
            continue;
        };
        if !QUALIFYING_REVIEW_STATES.contains(&review.state.as_str()) {
            continue;
        }

        metrics.review_dates.push(submitted_at);
        metrics.total_reviews += 1;

        let latency = (submitted_at - pr.created_at).num_seconds();
        // First qualifying review wins; later ones never overwrite.
        if metrics.time_to_first_review_secs == 0 {
            metrics.time_to_first_review_secs = latency;
        }
        if review.state == "APPROVED" && metrics.time_to_approval_secs == 0 {
            metrics.time_to_approval_secs = latency;
        }
    }

    if let Some(team) = team {
        let team_review_latency = reviews
            .iter()
            .filter(|r| {
                r.user
                    .as_ref()
                    .is_some_and(|u| team.members.contains(&u.login))
            })
            .filter_map(|r| r.submitted_at)
            .map(|at| (at - pr.created_at).num_seconds())
            .min();

        // A fulfilled review request disappears from requested_teams, so a
        // team-member review also counts as evidence the request existed.
        metrics.review_requested = pr.requested_teams.iter().any(|t| t.slug == team.slug)
            || team_review_latency.is_some();
        metrics.team_responded = team_review_latency.is_some();
        metrics.first_team_response_secs = team_review_latency;
    }

    metrics
}

/// Running totals over a stream of [`PrMetrics`].
#[derive(Debug, Default, PartialEq)]
pub struct PrAggregate {
    pub total_open_to_close_secs: i64,
    pub total_time_to_first_review_secs: i64,
    pub total_time_to_approval_secs: i64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub total_reviews: u64,
    pub total_commits: u64,
    pub total_loc_changed: u64,
    /// Distinct ISO week numbers touched by at least one review.
    pub review_weeks: BTreeSet<u32>,
    pub review_requests: u64,
    pub responded_requests: u64,
    pub total_response_secs: i64,
    pub total_responses: u64,
}

impl PrAggregate {
    pub fn add(&mut self, m: &PrMetrics) {
        self.total_open_to_close_secs += m.open_to_close_secs;
        self.total_time_to_first_review_secs += m.time_to_first_review_secs;
        self.total_time_to_approval_secs += m.time_to_approval_secs;
        self.prs_opened += m.prs_opened;
        self.prs_merged += m.prs_merged;
        self.total_reviews += m.total_reviews;
        self.total_commits += m.total_commits;
        self.total_loc_changed += m.total_loc_changed;
        self.review_weeks
            .extend(m.review_dates.iter().map(|d| d.iso_week().week()));

        if m.review_requested {
            self.review_requests += 1;
        }
        if m.team_responded {
            self.responded_requests += 1;
            self.total_response_secs += m.first_team_response_secs.unwrap_or(0);
            self.total_responses += 1;
        }
    }

    pub fn fold<I: IntoIterator<Item = PrMetrics>>(items: I) -> Self {
        let mut aggregate = Self::default();
        for item in items {
            aggregate.add(&item);
        }
        aggregate
    }

    /// Derived averages over the window, rounded to two decimals. Empty
    /// denominators yield zero, never NaN.
    pub fn summarize(&self, window_days: i64) -> PrSummary {
        PrSummary {
            prs_opened: self.prs_opened,
            prs_merged: self.prs_merged,
            total_reviews: self.total_reviews,
            total_commits: self.total_commits,
            total_loc_changed: self.total_loc_changed,
            average_open_to_close_time: average_hours(self.total_open_to_close_secs, self.prs_merged),
            average_time_to_first_review: average_hours(
                self.total_time_to_first_review_secs,
                self.prs_opened,
            ),
            average_time_to_approval: average_hours(self.total_time_to_approval_secs, self.prs_opened),
            average_reviews_per_pr: ratio(self.total_reviews, self.prs_opened),
            average_commits_per_pr: ratio(self.total_commits, self.prs_opened),
            average_loc_changed_per_pr: ratio(self.total_loc_changed, self.prs_opened),
            average_prs_reviewed_per_week: round2(
                self.review_weeks.len() as f64 / window_days.max(1) as f64,
            ),
        }
    }
}

/// Derived PR cycle metrics, all durations in decimal hours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrSummary {
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub total_reviews: u64,
    pub total_commits: u64,
    pub total_loc_changed: u64,
    pub average_open_to_close_time: f64,
    pub average_time_to_first_review: f64,
    pub average_time_to_approval: f64,
    pub average_reviews_per_pr: f64,
    pub average_commits_per_pr: f64,
    pub average_loc_changed_per_pr: f64,
    pub average_prs_reviewed_per_week: f64,
}

pub(crate) fn hours(secs: i64) -> f64 {
    secs as f64 / 3600.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average_hours(total_secs: i64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(hours(total_secs) / count as f64)
    }
}

fn ratio(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total as f64 / count as f64)
    }
}
