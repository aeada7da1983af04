mod common;

use common::spawn_app;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("health body is not JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "cashapp-service");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
#[serial]
#[ignore = "Requires running PostgreSQL"]
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = spawn_app().await;

    // Hit another route first so the request counters have data.
    app.client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("failed to execute request");

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.expect("failed to read metrics body");
    assert!(body.contains("cashapp_http_requests_total"));
}
