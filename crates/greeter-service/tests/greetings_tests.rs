//! Greeting and health endpoint integration tests.
//!
//! Exercises the real router over TCP using the `TestGreeterServer` harness.

use greeter_test_utils::TestGreeterServer;

/// `GET /greetings` returns the fixed greeting as plain text.
#[tokio::test]
async fn test_greetings_returns_hello_world() -> Result<(), anyhow::Error> {
    let server = TestGreeterServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/greetings", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    assert!(
        content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/plain")),
        "Expected text/plain content type, got {:?}",
        content_type
    );

    assert_eq!(response.text().await?, "Hello, World!");

    Ok(())
}

/// Repeated calls keep returning the same greeting.
#[tokio::test]
async fn test_greetings_is_stable_across_calls() -> Result<(), anyhow::Error> {
    let server = TestGreeterServer::spawn().await?;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let body = client
            .get(format!("{}/greetings", server.url()))
            .send()
            .await?
            .text()
            .await?;
        assert_eq!(body, "Hello, World!");
    }

    Ok(())
}

/// `/health` liveness endpoint returns plain text "OK".
#[tokio::test]
async fn test_health_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestGreeterServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestGreeterServer::spawn().await?;

    let response = reqwest::get(format!("{}/v1/nonexistent", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}
