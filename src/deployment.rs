//! Deployment frequency over completed workflow runs.
//!
//! A deployment is a completed workflow run on the tracked branch created
//! inside the window. The headline rate is raw runs per day; the unique
//! day/week/month counts deduplicate by calendar bucket, so two runs on the
//! same day advance `unique_deployment_days` by one.

use crate::github::WorkflowRun;
use crate::metrics::round2;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

#[derive(Debug, Default, PartialEq)]
pub struct DeploymentStats {
    pub total_deployments: u64,
    unique_days: BTreeSet<NaiveDate>,
    unique_weeks: BTreeSet<u32>,
    unique_months: BTreeSet<u32>,
}

impl DeploymentStats {
    pub fn record(&mut self, run: &WorkflowRun) {
        self.total_deployments += 1;
        let date = run.created_at.date_naive();
        self.unique_days.insert(date);
        self.unique_weeks.insert(date.iso_week().week());
        self.unique_months.insert(date.month());
    }

    pub fn from_runs<'a, I: IntoIterator<Item = &'a WorkflowRun>>(runs: I) -> Self {
        let mut stats = Self::default();
        for run in runs {
            stats.record(run);
        }
        stats
    }

    pub fn unique_deployment_days(&self) -> u64 {
        self.unique_days.len() as u64
    }

    pub fn unique_deployment_weeks(&self) -> u64 {
        self.unique_weeks.len() as u64
    }

    pub fn unique_deployment_months(&self) -> u64 {
        self.unique_months.len() as u64
    }

    /// Raw deployments per day over the window, rounded to two decimals.
    pub fn per_day(&self, window_days: i64) -> f64 {
        if window_days <= 0 {
            return 0.0;
        }
        round2(self.total_deployments as f64 / window_days as f64)
    }
}
