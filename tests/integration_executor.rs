use mission_client::api::{ApiClient, ApiRequest, MultipartPayload};
use mission_client::error::ErrorKind;
use mission_client::services::RetryPolicy;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod common;

async fn api() -> (common::TestApp, ApiClient) {
    let app = common::TestApp::spawn().await;
    let api = ApiClient::new(&app.config().api).unwrap();
    (app, api)
}

#[tokio::test]
async fn test_bearer_and_default_headers() {
    let (_app, api) = api().await;

    let body = api.execute(ApiRequest::get("/echo/"), Some("abc.def.ghi")).await.unwrap().unwrap();
    assert_eq!(body["authorization"], "Bearer abc.def.ghi");
    assert_eq!(body["content_type"], "application/json");
    assert!(body["request_id"].is_string());

    let body = api.execute(ApiRequest::get("/echo/"), None).await.unwrap().unwrap();
    assert!(body["authorization"].is_null());
}

#[tokio::test]
async fn test_caller_headers_override_defaults() {
    let (_app, api) = api().await;

    let request = ApiRequest::post("/echo/")
        .json(json!({ "title": "Food bank" }))
        .header("Content-Type", "application/vnd.mission+json")
        .header("X-Custom", "yes");
    let body = api.execute(request, Some("token")).await.unwrap().unwrap();

    assert_eq!(body["content_type"], "application/vnd.mission+json");
    assert_eq!(body["custom"], "yes");
    assert_eq!(body["body"]["title"], "Food bank");
}

#[tokio::test]
async fn test_empty_and_non_json_success_bodies() {
    let (_app, api) = api().await;

    assert_eq!(api.execute(ApiRequest::delete("/empty/"), None).await.unwrap(), None);
    assert_eq!(api.execute(ApiRequest::get("/plain/"), None).await.unwrap(), None);

    let err = api.execute_json::<serde_json::Value>(ApiRequest::delete("/empty/"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn test_detail_message_on_bad_request() {
    let (_app, api) = api().await;

    let err = api.execute(ApiRequest::get("/status/400"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Invalid email");
}

#[tokio::test]
async fn test_status_classification() {
    let (_app, api) = api().await;

    let cases = [
        ("/status/401", ErrorKind::Authentication),
        ("/status/403", ErrorKind::Authentication),
        ("/status/404", ErrorKind::Unknown),
        ("/status/409", ErrorKind::Validation),
        ("/status/422", ErrorKind::Validation),
        ("/status/429", ErrorKind::RateLimited),
        ("/status/500", ErrorKind::Server),
        ("/status/503", ErrorKind::Server),
        ("/status/418", ErrorKind::Unknown),
    ];
    for (path, kind) in cases {
        let err = api.execute(ApiRequest::get(path), None).await.unwrap_err();
        assert_eq!(err.kind(), kind, "{path}");
    }
}

#[tokio::test]
async fn test_not_found_on_account_lookup_is_authentication() {
    let (_app, api) = api().await;

    let err = api.execute(ApiRequest::get("/status/404").account_lookup(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_error_messages() {
    let (_app, api) = api().await;

    let err = api.execute(ApiRequest::get("/status/422"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Mission is full");

    let err = api.execute(ApiRequest::get("/status/500"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "500 Internal Server Error");

    let err = api.execute(ApiRequest::get("/status/429"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Request was throttled.");
    assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_query_parameters() {
    let app = common::TestApp::spawn().await;
    app.seed_account("query@example.org", "secret123", "volunteer");
    let session = app
        .client(mission_client::storage::CredentialStore::in_memory())
        .auth
        .login(&mission_client::domain::auth::LoginForm::new("query@example.org", "secret123"))
        .await
        .unwrap();

    let api = ApiClient::new(&app.config().api).unwrap();
    let request = ApiRequest::get("/missions/").query("city", "Lisbon").query("skill", "first aid");
    let body = api.execute(request, Some(&session.access_token)).await.unwrap().unwrap();

    assert_eq!(body["query"]["city"], "Lisbon");
    assert_eq!(body["query"]["skill"], "first aid");
    assert_eq!(body["results"][0]["title"], "Beach cleanup");
}

#[tokio::test]
async fn test_multipart_upload_sets_its_own_content_type() {
    let (_app, api) = api().await;

    let payload = MultipartPayload::new()
        .text("title", "Certificate")
        .file("document", b"%PDF-1.4 fake".to_vec(), Some("cert.pdf".to_string()), Some("application/pdf".to_string()));
    let body = api.execute(ApiRequest::post("/upload/").multipart(payload), Some("token")).await.unwrap().unwrap();

    assert!(body["content_type"].as_str().unwrap().starts_with("multipart/form-data"));
    assert_eq!(body["fields"]["title"], "Certificate");
    assert_eq!(body["fields"]["document"]["file_name"], "cert.pdf");
    assert_eq!(body["fields"]["document"]["size"], 13);
}

#[tokio::test]
async fn test_deadline_is_timeout_not_network() {
    let (_app, api) = api().await;

    let err = api
        .execute(ApiRequest::get("/slow/").timeout(Duration::from_millis(200)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let short = api.clone().with_timeout(Duration::from_millis(200));
    assert_eq!(short.execute(ApiRequest::get("/slow/"), None).await.unwrap_err().kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_cancellation_is_timeout() {
    let (_app, api) = api().await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = api.execute_with_cancel(ApiRequest::get("/slow/"), None, &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_unreachable_server_is_network() {
    common::setup_tracing();
    let config = common::config_for(Some(common::closed_port_url().await));
    let api = ApiClient::new(&config.api).unwrap();

    let err = api.execute(ApiRequest::get("/missions/"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_base_url_fails_before_any_request() {
    let err = ApiClient::new(&common::config_for(None).api).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_retry_policy_recovers_from_transient_failures() {
    let (app, api) = api().await;
    let policy = RetryPolicy::new(&app.config().retry);

    let body = policy.run(|| api.execute(ApiRequest::get("/flaky/"), None)).await.unwrap().unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(app.state.flaky_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_executor_does_not_retry_on_its_own() {
    let (app, api) = api().await;

    let err = api.execute(ApiRequest::get("/flaky/"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(app.state.flaky_calls.load(Ordering::SeqCst), 1);
}
