//! Lead time for changes.
//!
//! Two independent means are combined: the average PR duration from an anchor
//! commit's committer timestamp to merge time, and the average workflow-run
//! duration on the tracked branch. The two means are summed unweighted to
//! produce the headline lead time in hours.

use crate::config::CommitCounting;
use crate::github::{PrCommit, PullRequest, WorkflowRun};
use crate::metrics::{hours, round2};

/// Seconds from the anchor commit to merge, or `None` when the PR is not
/// merged or has no usable commit timestamp.
pub fn pr_lead_seconds(
    pr: &PullRequest,
    commits: &[PrCommit],
    counting: CommitCounting,
) -> Option<i64> {
    let merged_at = pr.merged_at?;
    pr.merge_commit_sha.as_ref()?;

    let anchor = match counting {
        CommitCounting::First => commits.first(),
        CommitCounting::Last => commits.last(),
    }?;
    let committed_at = anchor.commit.committer.as_ref()?.date?;

    Some((merged_at - committed_at).num_seconds())
}

#[derive(Debug, Default, PartialEq)]
pub struct LeadTimeStats {
    pub pr_count: u64,
    pub total_pr_secs: i64,
    pub workflow_count: u64,
    pub total_workflow_secs: i64,
}

impl LeadTimeStats {
    pub fn add_pr(&mut self, lead_secs: i64) {
        self.pr_count += 1;
        self.total_pr_secs += lead_secs;
    }

    pub fn add_workflow_run(&mut self, run: &WorkflowRun) {
        self.workflow_count += 1;
        self.total_workflow_secs += (run.updated_at - run.created_at).num_seconds();
    }

    /// Combines the two means. Each denominator is clamped to one so an
    /// empty side contributes zero hours.
    pub fn evaluate(&self) -> LeadTimeSummary {
        let pr_average = hours(self.total_pr_secs) / self.pr_count.max(1) as f64;
        let workflow_average = hours(self.total_workflow_secs) / self.workflow_count.max(1) as f64;

        LeadTimeSummary {
            pr_average_hours: round2(pr_average),
            workflow_average_hours: round2(workflow_average),
            lead_time_hours: round2(pr_average + workflow_average),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadTimeSummary {
    pub pr_average_hours: f64,
    pub workflow_average_hours: f64,
    pub lead_time_hours: f64,
}
