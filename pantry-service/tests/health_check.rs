mod common;

use common::test_config;
use pantry_service::startup::Application;
use reqwest::Client;

#[tokio::test]
async fn application_serves_health_over_tcp() {
    let app = Application::build(test_config())
        .await
        .expect("Failed to build test application");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = Client::new();
    let health_url = format!("http://127.0.0.1:{}/health", port);
    let mut response = None;
    for _ in 0..50 {
        if let Ok(r) = client.get(&health_url).send().await {
            response = Some(r);
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    let response = response.expect("Server never became ready");
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "pantry-service");
}
