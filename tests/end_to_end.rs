//! End-to-end runs against a mocked GitHub API.

use chrono::{TimeZone, Utc};
use dora_metrics::config::AppConfig;
use dora_metrics::github::GitHubClient;
use dora_metrics::querier::MetricsQuerier;
use dora_metrics::window::{TimeFrame, TimeWindow};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        repo_owner: "octo".to_string(),
        repo_name: "demo".to_string(),
        github_token: None,
        time_frame: TimeFrame::days(30),
        branch: "main".to_string(),
        workflows: vec![7],
        commit_counting: Default::default(),
        team: Some("Platform".to_string()),
        fetch_concurrency: 4,
        max_in_flight_requests: 4,
        per_page: 100,
        github_api_url: base_url.to_string(),
    }
}

fn querier(server: &MockServer) -> MetricsQuerier {
    let config = test_config(&server.uri());
    let client = GitHubClient::new(&config).unwrap();
    // Window end pinned so the fixture timestamps stay inside it.
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    let window = TimeWindow::trailing(config.time_frame, now);
    MetricsQuerier::with_parts(config, client, window)
}

/// Three PRs, one team, one workflow with two same-day runs:
///
/// * PR 1: created Jan 10, merged 5h later, approved by team member alice
///   after 2h, two commits (last one 1h before merge), 13 LOC changed.
/// * PR 2: open, review requested from the platform team, never answered.
/// * PR 3: created and merged Jan 8 at the same instant, no reviews.
async fn mount_scenario(server: &MockServer, fail_pr1_reviews: bool) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "full_name": "octo/demo"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orgs/octo/teams/platform/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"login": "alice"}])))
        .mount(server)
        .await;

    let pr1 = json!({
        "number": 1,
        "created_at": "2024-01-10T00:00:00Z",
        "updated_at": "2024-01-10T05:00:00Z",
        "merged_at": "2024-01-10T05:00:00Z",
        "merge_commit_sha": "aaa111",
        "requested_teams": [],
        "user": {"login": "bob"}
    });
    let pr2 = json!({
        "number": 2,
        "created_at": "2024-01-12T00:00:00Z",
        "updated_at": "2024-01-12T00:00:00Z",
        "merged_at": null,
        "merge_commit_sha": null,
        "requested_teams": [{"slug": "platform"}],
        "user": {"login": "carol"}
    });
    let pr3 = json!({
        "number": 3,
        "created_at": "2024-01-08T00:00:00Z",
        "updated_at": "2024-01-08T00:00:00Z",
        "merged_at": "2024-01-08T00:00:00Z",
        "merge_commit_sha": "ccc333",
        "requested_teams": [],
        "user": {"login": "bob"}
    });

    // Newest-created first, the way GitHub returns them.
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls"))
        .and(query_param("state", "all"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pr2.clone(), pr1.clone(), pr3.clone()])),
        )
        .mount(server)
        .await;

    // Merged-into-main listing for lead time, newest-updated first.
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls"))
        .and(query_param("state", "closed"))
        .and(query_param("base", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pr1, pr3])))
        .mount(server)
        .await;

    let pr1_reviews = if fail_pr1_reviews {
        ResponseTemplate::new(404)
    } else {
        ResponseTemplate::new(200).set_body_json(json!([{
            "state": "APPROVED",
            "submitted_at": "2024-01-10T02:00:00Z",
            "user": {"login": "alice"}
        }]))
    };
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/1/reviews"))
        .respond_with(pr1_reviews)
        .mount(server)
        .await;
    for number in [2, 3] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/octo/demo/pulls/{number}/reviews")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/1/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"commit": {"committer": {"date": "2024-01-10T03:00:00Z"}}},
            {"commit": {"committer": {"date": "2024-01-10T04:00:00Z"}}}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/3/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"commit": {"committer": {"date": "2024-01-08T00:00:00Z"}}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"additions": 10, "deletions": 3}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    // Two completed runs on the same day, one hour each.
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/actions/workflows/7/runs"))
        .and(query_param("status", "completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "workflow_runs": [
                {
                    "id": 201,
                    "head_branch": "main",
                    "created_at": "2024-01-15T14:00:00Z",
                    "updated_at": "2024-01-15T15:00:00Z"
                },
                {
                    "id": 200,
                    "head_branch": "main",
                    "created_at": "2024-01-15T08:00:00Z",
                    "updated_at": "2024-01-15T09:00:00Z"
                }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_report_from_mocked_github() {
    let server = MockServer::start().await;
    mount_scenario(&server, false).await;

    let report = querier(&server).run().await.unwrap();

    assert_eq!(report.repository, "octo/demo");
    assert_eq!(report.repository_id, 42);
    assert_eq!(report.time_frame_days, 30);
    assert_eq!(report.fetch_failures, 0);

    assert_eq!(report.prs_opened, 3);
    assert_eq!(report.prs_merged, 2);
    assert_eq!(report.total_reviews, 1);
    assert_eq!(report.total_commits, 3);
    assert_eq!(report.total_loc_changed, 13);
    // (5h + 0h) over 2 merged PRs.
    assert_eq!(report.average_open_to_close_time, 2.5);
    // 2h approval over 3 opened PRs.
    assert_eq!(report.average_time_to_approval, 0.67);
    assert_eq!(report.average_time_to_first_review, 0.67);
    assert_eq!(report.average_reviews_per_pr, 0.33);
    assert_eq!(report.average_commits_per_pr, 1.0);
    assert_eq!(report.average_loc_changed_per_pr, 4.33);
    assert_eq!(report.average_prs_reviewed_per_week, 0.03);

    assert_eq!(report.team.as_deref(), Some("platform"));
    assert_eq!(report.review_requests, Some(2));
    assert_eq!(report.responded_requests, Some(1));
    assert_eq!(report.response_rate, Some(50.0));
    assert_eq!(report.average_response_time, Some(2.0));

    assert_eq!(report.total_deployments, 2);
    assert_eq!(report.unique_deployment_days, 1);
    assert_eq!(report.unique_deployment_weeks, 1);
    assert_eq!(report.unique_deployment_months, 1);
    assert_eq!(report.deployments_per_day, 0.07);
    assert_eq!(report.deployment_frequency_rating.to_string(), "Medium");
    assert_eq!(report.deployment_frequency_color, "yellow");

    // PR mean (1h + 0h)/2 plus workflow mean 1h.
    assert_eq!(report.average_pr_lead_time, 0.5);
    assert_eq!(report.average_workflow_lead_time, 1.0);
    assert_eq!(report.lead_time_hours, 1.5);
    assert_eq!(report.lead_time_rating.to_string(), "Elite");
    assert_eq!(report.lead_time_color, "brightgreen");
}

#[tokio::test]
async fn per_pr_failure_contributes_zero_not_abort() {
    let server = MockServer::start().await;
    mount_scenario(&server, true).await;

    let report = querier(&server).run().await.unwrap();

    // PR 1's review fetch failed, so its whole record is zeroed out.
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.prs_opened, 2);
    assert_eq!(report.prs_merged, 1);
    assert_eq!(report.total_reviews, 0);
    assert_eq!(report.review_requests, Some(1));
    assert_eq!(report.responded_requests, Some(0));
    assert_eq!(report.response_rate, Some(0.0));

    // Deployment and lead-time passes do not go through PR 1's reviews.
    assert_eq!(report.total_deployments, 2);
    assert_eq!(report.lead_time_hours, 1.5);
}

#[tokio::test]
async fn workflow_listing_failure_degrades_to_partial_report() {
    let server = MockServer::start().await;
    mount_scenario(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/actions/workflows"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    // No explicit workflow ids, so the run has to list them itself.
    let mut config = test_config(&server.uri());
    config.workflows = vec![];
    let client = GitHubClient::new(&config).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    let window = TimeWindow::trailing(config.time_frame, now);

    let report = MetricsQuerier::with_parts(config, client, window)
        .run()
        .await
        .unwrap();

    // The failed listing degrades the deployment side but not the run.
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.total_deployments, 0);
    assert_eq!(report.deployments_per_day, 0.0);
    assert_eq!(report.deployment_frequency_rating.to_string(), "None");
    assert_eq!(report.average_workflow_lead_time, 0.0);
    assert_eq!(report.lead_time_hours, 0.5);
    assert_eq!(report.prs_opened, 3);
    assert_eq!(report.response_rate, Some(50.0));
}

#[tokio::test]
async fn missing_repository_aborts_the_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let error = querier(&server).run().await.unwrap_err();
    assert!(error.to_string().contains("404"));
}
