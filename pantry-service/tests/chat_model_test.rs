mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use common::spawn_fake;
use pantry_service::config::ModelConfig;
use pantry_service::services::providers::{ChatMessage, ChatModel, ChatRequest, ModelError};
use pantry_service::services::OpenRouterChatModel;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct Seen {
    status: StatusCode,
    reply: Value,
    headers: Arc<Mutex<Option<HeaderMap>>>,
    body: Arc<Mutex<Option<Value>>>,
}

async fn completions(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    *seen.headers.lock().unwrap() = Some(headers);
    *seen.body.lock().unwrap() = Some(body);
    (seen.status, Json(seen.reply.clone()))
}

fn model_config(base_url: String) -> ModelConfig {
    ModelConfig {
        api_key: Secret::new("sk-test".to_string()),
        base_url,
        model: "test/recipe-model".to_string(),
        temperature: 0.7,
        max_tokens: 800,
        recipe_count: 3,
        timeout_secs: 5,
        expose_upstream_errors: true,
    }
}

fn request() -> ChatRequest {
    ChatRequest {
        model: "test/recipe-model".to_string(),
        messages: vec![
            ChatMessage::system("You are a cook."),
            ChatMessage::user("2 pcs tomato"),
        ],
        temperature: 0.7,
        max_tokens: 800,
    }
}

async fn spawn_completions(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen = Seen {
        status,
        reply,
        headers: Arc::default(),
        body: Arc::default(),
    };
    let router = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(seen.clone());

    (spawn_fake(router).await, seen)
}

#[tokio::test]
async fn posts_openai_compatible_body_with_bearer_key() {
    let reply = json!({"choices": [{"message": {"role": "assistant", "content": "### Soup"}}]});
    let (base, seen) = spawn_completions(StatusCode::OK, reply.clone()).await;
    let model = OpenRouterChatModel::new(&model_config(base)).unwrap();

    let response = model.complete(&request()).await.unwrap();
    assert_eq!(response, reply);

    let headers = seen.headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-test");

    let body = seen.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "test/recipe-model");
    assert_eq!(body["max_tokens"], 800);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "2 pcs tomato");
}

#[tokio::test]
async fn non_success_status_keeps_upstream_body() {
    let (base, _) = spawn_completions(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"message": "Rate limit exceeded"}}),
    )
    .await;
    let model = OpenRouterChatModel::new(&model_config(base)).unwrap();

    match model.complete(&request()).await {
        Err(ModelError::Upstream { status, body }) => {
            assert_eq!(status, 429);
            assert!(body.contains("Rate limit exceeded"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_model_is_a_transport_error() {
    let model = OpenRouterChatModel::new(&model_config("http://127.0.0.1:1".to_string())).unwrap();

    assert!(matches!(
        model.complete(&request()).await,
        Err(ModelError::Transport(_))
    ));
}
