//! Team responsiveness over review requests.

use crate::metrics::{hours, round2, PrAggregate};
use std::collections::HashSet;

/// Resolved team identity used during extraction: the slug PRs reference in
/// `requested_teams` plus the current member logins.
#[derive(Debug, Clone)]
pub struct TeamContext {
    pub slug: String,
    pub members: HashSet<String>,
}

impl TeamContext {
    pub fn new<M: IntoIterator<Item = String>>(slug: &str, members: M) -> Self {
        Self {
            slug: slug.to_string(),
            members: members.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamSummary {
    pub review_requests: u64,
    pub responded_requests: u64,
    /// Percentage of review requests that got at least one team-member review.
    pub response_rate: f64,
    /// Mean hours from PR creation to the first team-member review, over
    /// responded PRs only.
    pub average_response_time: f64,
}

impl TeamSummary {
    pub fn from_aggregate(aggregate: &PrAggregate) -> Self {
        let response_rate = if aggregate.review_requests == 0 {
            0.0
        } else {
            round2(aggregate.responded_requests as f64 / aggregate.review_requests as f64 * 100.0)
        };
        let average_response_time = if aggregate.total_responses == 0 {
            0.0
        } else {
            round2(hours(aggregate.total_response_secs) / aggregate.total_responses as f64)
        };

        Self {
            review_requests: aggregate.review_requests,
            responded_requests: aggregate.responded_requests,
            response_rate,
            average_response_time,
        }
    }
}
