//! Integration tests for the public liveness endpoint

use std::net::TcpListener;
use notes_auth::configuration::JwtSettings;
use notes_auth::startup::run;
use notes_auth::store::Stores;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = JwtSettings {
        secret: "health-check-secret-at-least-32-bytes".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "notes_auth".to_string(),
        leeway: 0,
    };
    let server = run(listener, Stores::in_memory(), jwt, 4)
        .expect("Failed to create server");

    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn health_check_ignores_garbage_bearer_token() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/subscriptions", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
