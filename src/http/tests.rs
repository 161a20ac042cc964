use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path},
};

fn transport(retry_attempts: u32) -> HttpTransport {
    HttpTransport::new("test-service", Duration::from_secs(5), retry_attempts)
        .with_backoff(Duration::from_millis(10))
}

#[tokio::test]
async fn non_success_status_is_a_reply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let reply = run_blocking("test", move || {
        transport(1)
            .get(&url, &[])
            .map_err(|e| RagError::Other(e.into()))
    })
    .await
    .expect("request should complete");

    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "not here");
    assert!(!reply.is_success());
}

#[tokio::test]
async fn post_sends_json_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer secret"))
        .and(body_string(r#"{"hello":"world"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/echo", server.uri());
    let reply = run_blocking("test", move || {
        transport(1)
            .post_json(
                &url,
                &[("Authorization", "Bearer secret")],
                r#"{"hello":"world"}"#,
            )
            .map_err(|e| RagError::Other(e.into()))
    })
    .await
    .expect("request should complete");

    assert!(reply.is_success());
    assert_eq!(reply.body, "ok");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let reply = run_blocking("test", move || {
        transport(2)
            .get(&url, &[])
            .map_err(|e| RagError::Other(e.into()))
    })
    .await
    .expect("request should complete");

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "recovered");
}

#[tokio::test]
async fn last_server_error_is_returned_as_reply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let url = format!("{}/down", server.uri());
    let reply = run_blocking("test", move || {
        transport(2)
            .get(&url, &[])
            .map_err(|e| RagError::Other(e.into()))
    })
    .await
    .expect("request should complete");

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, "boom");
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let url = format!("{}/slow", server.uri());
    let result = tokio::task::spawn_blocking(move || {
        HttpTransport::new("slow-service", Duration::from_millis(200), 3).get(&url, &[])
    })
    .await
    .expect("task should join");

    assert!(matches!(
        result,
        Err(TransportError::Timeout { ref service }) if service == "slow-service"
    ));
}

#[test]
fn retry_attempts_never_zero() {
    let transport = HttpTransport::new("svc", Duration::from_secs(1), 0);
    assert_eq!(transport.retry_attempts(), 1);
    assert_eq!(transport.service(), "svc");
}

#[test]
fn error_message_formats() {
    assert_eq!(
        error_message(r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#),
        "Incorrect API key"
    );
    assert_eq!(
        error_message(r#"{"error":"model 'foo' not found"}"#),
        "model 'foo' not found"
    );
    assert_eq!(error_message("  Bad Gateway\n"), "Bad Gateway");
}
