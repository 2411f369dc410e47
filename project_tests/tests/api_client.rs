//! Request shaping and response normalisation of `ApiClient::call`.

use board_common::{ApiRequest, HttpMethod};
use project_tests::{MockBackend, client_with, session};
use serde_json::{Value, json};

#[tokio::test]
async fn error_message_prefers_message_then_detail_then_status() {
    let backend = MockBackend::start().await;
    let (client, _) = client_with(backend.client_config(), None);

    let by_message = client.call::<Value>(&ApiRequest::get("/errors/message")).await;
    assert!(!by_message.success);
    assert_eq!(by_message.status, Some(400));
    assert_eq!(by_message.error.as_deref(), Some("Bad input"));

    let by_detail = client.call::<Value>(&ApiRequest::get("/errors/detail")).await;
    assert_eq!(by_detail.status, Some(422));
    assert_eq!(by_detail.error.as_deref(), Some("Field missing"));

    let plain = client.call::<Value>(&ApiRequest::get("/errors/plain")).await;
    assert_eq!(plain.status, Some(500));
    assert_eq!(plain.error.as_deref(), Some("HTTP error! Status: 500"));
    assert!(plain.data.is_none());
}

#[tokio::test]
async fn json_body_is_sent_for_post() {
    let backend = MockBackend::start().await;
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    let request = ApiRequest::new(HttpMethod::Post, "/echo")
        .header("X-Custom", "yes")
        .json(json!({"repo": "board", "points": 5}));
    let data = client.call::<Value>(&request).await.into_data().unwrap();

    assert_eq!(data["method"], "POST");
    assert_eq!(data["contentType"], "application/json");
    assert_eq!(data["custom"], "yes");
    assert_eq!(data["body"], json!({"repo": "board", "points": 5}));
}

#[tokio::test]
async fn body_is_not_sent_for_get_or_delete() {
    let backend = MockBackend::start().await;
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    for method in [HttpMethod::Get, HttpMethod::Delete] {
        let request = ApiRequest::new(method, "/echo").json(json!({"ignored": true}));
        let data = client.call::<Value>(&request).await.into_data().unwrap();
        assert_eq!(data["method"], method.to_string());
        assert_eq!(data["body"], Value::Null);
    }
}

#[tokio::test]
async fn query_params_and_absolute_urls() {
    let backend = MockBackend::start().await;
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    let request = ApiRequest::get(format!("{}/echo", backend.url()))
        .query("user", "octocat")
        .query("page", "2");
    let data = client.call::<Value>(&request).await.into_data().unwrap();

    assert_eq!(data["query"], json!({"user": "octocat", "page": "2"}));
}

#[tokio::test]
async fn undecodable_success_body_is_a_failure_without_status() {
    let backend = MockBackend::start().await;
    backend.set_leaderboard(project_tests::Reply::Garbage);
    let (client, _) = client_with(backend.client_config(), None);

    let response = client.fetch_leaderboards().await;

    assert!(!response.success);
    assert!(response.data.is_none());
    assert!(response.status.is_none());
    assert!(response.error.is_some());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut config = board_common::ClientConfig::for_backend(url).unwrap();
    config.request_timeout_secs = 2;
    let (client, _) = client_with(config, None);

    let response = client.call::<Value>(&ApiRequest::get("/leaderboard")).await;

    assert!(!response.success);
    assert!(response.status.is_none());
    assert!(response.error.is_some());
}
