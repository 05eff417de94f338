//! Drive client tests against a mock server.

use canopy_drive::{list_children, DriveClient, DriveConfig, DriveError, ListQuery, ListingService};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DriveClient {
    DriveClient::new(DriveConfig::new("test-key").with_base_url(server.uri())).unwrap()
}

#[tokio::test]
async fn test_sends_filter_and_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "'root1' in parents and trashed=false"))
        .and(query_param("key", "test-key"))
        .and(query_param("pageSize", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {
                    "id": "f1",
                    "name": "week1.pdf",
                    "mimeType": "application/pdf",
                    "size": "1234",
                    "createdTime": "2024-01-01T00:00:00.000Z",
                    "modifiedTime": "2024-01-02T00:00:00.000Z"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client
        .list_page(&ListQuery::children("root1"), None)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "week1.pdf");
    assert_eq!(page.items[0].size, Some(1234));
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_follows_page_tokens() {
    let server = MockServer::start().await;

    // Specific token first: the first matching mock answers.
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "b", "name": "b", "mimeType": "text/plain"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "tok-2",
            "files": [{"id": "a", "name": "a", "mimeType": "text/plain"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = list_children(&client, &ListQuery::children("p"), Duration::ZERO)
        .await
        .unwrap();

    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .list_page(&ListQuery::children("p"), None)
        .await
        .unwrap_err();

    match &err {
        DriveError::Server { status, message } => {
            assert_eq!(*status, 503);
            assert!(message.contains("unavailable"));
        }
        other => panic!("Expected Server error, got {:?}", other),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"files": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = DriveClient::new(
        DriveConfig::new("k")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(50)),
    )
    .unwrap();

    let err = client
        .list_page(&ListQuery::children("p"), None)
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .list_page(&ListQuery::children("p"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Parse(_)));
}
