//! The final report document.
//!
//! One flat JSON object per run. Field names are the external contract for
//! downstream badge and dashboard consumers, so renames here are breaking.

use crate::deployment::DeploymentStats;
use crate::github::Repository;
use crate::lead_time::LeadTimeSummary;
use crate::metrics::PrSummary;
use crate::rating::{self, Rating};
use crate::team::TeamSummary;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub repository: String,
    pub repository_id: u64,
    pub time_frame_days: i64,

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

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,

    pub total_deployments: u64,
    pub unique_deployment_days: u64,
    pub unique_deployment_weeks: u64,
    pub unique_deployment_months: u64,
    pub deployments_per_day: f64,
    pub deployment_frequency_rating: Rating,
    pub deployment_frequency_color: &'static str,

    pub average_pr_lead_time: f64,
    pub average_workflow_lead_time: f64,
    pub lead_time_hours: f64,
    pub lead_time_rating: Rating,
    pub lead_time_color: &'static str,

    /// Count of per-item fetches that failed and contributed zero metrics.
    pub fetch_failures: usize,
}

impl Report {
    pub fn assemble(
        repository: &Repository,
        time_frame_days: i64,
        prs: PrSummary,
        team: Option<(String, TeamSummary)>,
        deployments: &DeploymentStats,
        lead_time: LeadTimeSummary,
        fetch_failures: usize,
    ) -> Self {
        let deployments_per_day = deployments.per_day(time_frame_days);
        let deployment_rating = rating::deployment_frequency(deployments_per_day);
        let lead_rating = rating::lead_time(lead_time.lead_time_hours);

        let (team, team_summary) = match team {
            Some((slug, summary)) => (Some(slug), Some(summary)),
            None => (None, None),
        };

        Self {
            repository: repository.full_name.clone(),
            repository_id: repository.id,
            time_frame_days,

            prs_opened: prs.prs_opened,
            prs_merged: prs.prs_merged,
            total_reviews: prs.total_reviews,
            total_commits: prs.total_commits,
            total_loc_changed: prs.total_loc_changed,
            average_open_to_close_time: prs.average_open_to_close_time,
            average_time_to_first_review: prs.average_time_to_first_review,
            average_time_to_approval: prs.average_time_to_approval,
            average_reviews_per_pr: prs.average_reviews_per_pr,
            average_commits_per_pr: prs.average_commits_per_pr,
            average_loc_changed_per_pr: prs.average_loc_changed_per_pr,
            average_prs_reviewed_per_week: prs.average_prs_reviewed_per_week,

            team,
            review_requests: team_summary.as_ref().map(|t| t.review_requests),
            responded_requests: team_summary.as_ref().map(|t| t.responded_requests),
            response_rate: team_summary.as_ref().map(|t| t.response_rate),
            average_response_time: team_summary.as_ref().map(|t| t.average_response_time),

            total_deployments: deployments.total_deployments,
            unique_deployment_days: deployments.unique_deployment_days(),
            unique_deployment_weeks: deployments.unique_deployment_weeks(),
            unique_deployment_months: deployments.unique_deployment_months(),
            deployments_per_day,
            deployment_frequency_rating: deployment_rating,
            deployment_frequency_color: deployment_rating.color(),

            average_pr_lead_time: lead_time.pr_average_hours,
            average_workflow_lead_time: lead_time.workflow_average_hours,
            lead_time_hours: lead_time.lead_time_hours,
            lead_time_rating: lead_rating,
            lead_time_color: lead_rating.color(),

            fetch_failures,
        }
    }
}
