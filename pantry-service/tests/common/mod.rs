#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use pantry_service::config::PantryConfig;
use pantry_service::models::{PantryItem, PantryRow, UserId};
use pantry_service::services::providers::{ChatModel, ChatRequest, ModelError};
use pantry_service::services::{MemoryPantryStore, PantryStore, StoreError};
use pantry_service::startup::{build_router, AppState};
use serde::Serialize;
use serde_json::{json, Value};
use service_core::config::Config;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const ALICE: &str = "11111111-1111-1111-1111-111111111111";
pub const BOB: &str = "22222222-2222-2222-2222-222222222222";

/// Base variables for a self-contained app: memory store, local JWT checks.
pub fn test_vars() -> HashMap<String, String> {
    [
        ("ENVIRONMENT", "test"),
        ("STORE_BACKEND", "memory"),
        ("AUTH_STRATEGY", "jwt"),
        ("AUTH_JWT_SECRET", JWT_SECRET),
        ("MODEL_API_KEY", "test-model-key"),
        ("MODEL_NAME", "test/recipe-model"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn config_from(vars: HashMap<String, String>) -> PantryConfig {
    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    PantryConfig::from_lookup(common, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

pub fn test_config() -> PantryConfig {
    config_from(test_vars())
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: i64,
}

pub fn issue_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + ChronoDuration::minutes(15)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// Memory store that counts every call made through it.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryPantryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PantryStore for CountingStore {
    async fn insert(&self, user: &UserId, item: &PantryItem) -> Result<Vec<PantryRow>, StoreError> {
        self.hit();
        self.inner.insert(user, item).await
    }

    async fn list(&self, user: &UserId) -> Result<Vec<PantryRow>, StoreError> {
        self.hit();
        self.inner.list(user).await
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        id: i64,
        quantity: i64,
    ) -> Result<Option<PantryRow>, StoreError> {
        self.hit();
        self.inner.update_quantity(user, id, quantity).await
    }

    async fn delete(&self, user: &UserId, id: i64) -> Result<Option<PantryRow>, StoreError> {
        self.hit();
        self.inner.delete(user, id).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

/// Chat model that replays queued replies and records what it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Value, ModelError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn reply(&self, reply: Result<Value, ModelError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_text(&self, text: &str) {
        self.reply(Ok(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"choices": []})))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub model: Arc<ScriptedModel>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PantryConfig) -> Self {
        let store = Arc::new(CountingStore::default());
        let model = Arc::new(ScriptedModel::default());
        let identity = pantry_service::services::build_identity_resolver(&config)
            .expect("Failed to build identity resolver");

        let state = AppState::new(config, store.clone(), identity, model.clone());

        Self {
            router: build_router(state),
            store,
            model,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(&self.router, method, uri, user, body).await
    }

    pub async fn add(&self, user: &str, item: &str, quantity: i64, unit: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/pantry/add",
                Some(user),
                Some(json!({"item": item, "quantity": quantity, "unit": unit})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "add failed: {body}");
        body[0]["id"].as_i64().expect("inserted row has an id")
    }
}

/// Router over an arbitrary store, with a model that is never expected to answer.
pub fn router_with_store(store: Arc<dyn PantryStore>) -> Router {
    let config = test_config();
    let identity = pantry_service::services::build_identity_resolver(&config)
        .expect("Failed to build identity resolver");
    let model = Arc::new(ScriptedModel::default());
    build_router(AppState::new(config, store, identity, model))
}

/// Drive one request through `router` and decode the body as JSON when possible.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", issue_token(user)),
        );
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    (status, body)
}

/// How a [`FailingStore`] misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum StoreFault {
    /// The store answers with a non-success status.
    Rejected,
    /// The store cannot be reached.
    Unreachable,
    /// The store succeeds but reports no rows.
    Empty,
}

/// Store whose every call fails the same way.
pub struct FailingStore(pub StoreFault);

impl FailingStore {
    fn fail(&self) -> Option<StoreError> {
        match self.0 {
            StoreFault::Rejected => Some(StoreError::Rejected {
                status: 400,
                body: r#"{"message":"permission denied for table pantry"}"#.to_string(),
            }),
            StoreFault::Unreachable => Some(StoreError::Transport(
                "error sending request: connection refused".to_string(),
            )),
            StoreFault::Empty => None,
        }
    }
}

#[async_trait]
impl PantryStore for FailingStore {
    async fn insert(&self, _: &UserId, _: &PantryItem) -> Result<Vec<PantryRow>, StoreError> {
        self.fail().map_or(Ok(Vec::new()), Err)
    }

    async fn list(&self, _: &UserId) -> Result<Vec<PantryRow>, StoreError> {
        self.fail().map_or(Ok(Vec::new()), Err)
    }

    async fn update_quantity(
        &self,
        _: &UserId,
        _: i64,
        _: i64,
    ) -> Result<Option<PantryRow>, StoreError> {
        self.fail().map_or(Ok(None), Err)
    }

    async fn delete(&self, _: &UserId, _: i64) -> Result<Option<PantryRow>, StoreError> {
        self.fail().map_or(Ok(None), Err)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.fail().map_or(Ok(()), Err)
    }
}

/// Serve `router` on a random local port and return its base URL.
pub async fn spawn_fake(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake server");
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", address)
}
