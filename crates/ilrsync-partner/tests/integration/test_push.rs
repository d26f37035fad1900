//! Integration tests for PartnerClient::push_funding_summary

use wiremock::ResponseTemplate;

use ilrsync_core::domain::PipelineError;
use ilrsync_core::ports::IPartnerApi;
use ilrsync_partner::PartnerError;

use crate::common;

#[tokio::test]
async fn test_push_posts_camel_case_array_with_period_query() {
    let (server, client) = common::setup_partner_mock().await;
    common::mount_summary(&server, "2019", "3", ResponseTemplate::new(201)).await;

    client
        .push_funding_summary(2019, 3, &[common::record(10_000_001)])
        .await
        .expect("push failed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let first = &body.as_array().unwrap()[0];
    assert_eq!(first["ukprn"], 10_000_001);
    assert_eq!(first["academicYear"], 2019);
    assert_eq!(first["grantType"], "AEB_GRANT");
    assert_eq!(first["monthTotal"], 123.45);
}

#[tokio::test]
async fn test_client_error_surfaces_partner_description() {
    let (server, client) = common::setup_partner_mock().await;
    common::mount_summary(
        &server,
        "2019",
        "3",
        ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": "PERIOD_CLOSED",
            "description": "Period R03 2019 is closed for submissions"
        })),
    )
    .await;

    let err = client
        .push_funding_summary(2019, 3, &[common::record(1)])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Period R03 2019 is closed for submissions");
    assert!(matches!(
        PipelineError::find_in(&err),
        Some(PipelineError::PartnerApi(_))
    ));
}

#[tokio::test]
async fn test_client_error_without_json_body() {
    let (server, client) = common::setup_partner_mock().await;
    common::mount_summary(
        &server,
        "2019",
        "3",
        ResponseTemplate::new(422).set_body_string("unprocessable"),
    )
    .await;

    let err = client
        .push_funding_summary(2019, 3, &[common::record(1)])
        .await
        .unwrap_err();

    assert_eq!(
        PipelineError::find_in(&err),
        Some(&PipelineError::PartnerApi(
            "422 Unprocessable Entity: unprocessable".to_string()
        ))
    );
}

#[tokio::test]
async fn test_server_error_propagates_unchanged() {
    let (server, client) = common::setup_partner_mock().await;
    common::mount_summary(
        &server,
        "2019",
        "3",
        ResponseTemplate::new(503).set_body_string("maintenance"),
    )
    .await;

    let err = client
        .push_funding_summary(2019, 3, &[common::record(1)])
        .await
        .unwrap_err();

    assert!(PipelineError::find_in(&err).is_none());
    match err.downcast_ref::<PartnerError>() {
        Some(PartnerError::ServerError { status, body }) => {
            assert_eq!(*status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_partner_is_network_error() {
    let client = ilrsync_partner::PartnerClient::with_base_url(
        "http://127.0.0.1:9",
        common::SUMMARY_PATH,
    );

    let err = client
        .push_funding_summary(2019, 3, &[common::record(1)])
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PartnerError>(),
        Some(PartnerError::NetworkError(_))
    ));
}
