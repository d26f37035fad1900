//! Shared test helpers for partner API integration tests

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ilrsync_core::domain::{FundingRecord, GrantType, Pence};
use ilrsync_partner::PartnerClient;

pub const SUMMARY_PATH: &str = "/api/v1/skills/fundingSummary";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_partner_mock() -> (MockServer, PartnerClient) {
    let server = MockServer::start().await;
    let client = PartnerClient::with_base_url(server.uri(), SUMMARY_PATH);
    (server, client)
}

/// Mounts the funding summary endpoint for a period with a canned response
pub async fn mount_summary(server: &MockServer, year: &str, period: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(SUMMARY_PATH))
        .and(query_param("academicYear", year))
        .and(query_param("period", period))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn record(ukprn: i64) -> FundingRecord {
    FundingRecord {
        ukprn,
        academic_year: 2019,
        period: 3,
        actual_year: 2019,
        actual_month: 10,
        grant_type: GrantType::AebGrant,
        funding_line: "AEB - Other Learning (non-procured)".to_string(),
        source: "SFA".to_string(),
        category: "Learning".to_string(),
        month_total: Some(Pence(12_345)),
        total_payment: Some(Pence(99_000)),
    }
}
