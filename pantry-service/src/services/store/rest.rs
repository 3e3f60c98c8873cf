//! PostgREST client for the hosted pantry table.

use super::{PantryStore, StoreError};
use crate::config::HostedStoreConfig;
use crate::models::{PantryItem, PantryRow, UserId};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use service_core::observability::trace_headers;
use std::fmt::Display;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct NewRow<'a> {
    user_id: &'a UserId,
    item: &'a str,
    quantity: i64,
    unit: &'a str,
}

#[derive(Debug, Serialize)]
struct QuantityPatch {
    quantity: i64,
}

pub struct RestPantryStore {
    client: Client,
    endpoint: String,
    api_key: Secret<String>,
}

fn eq(value: impl Display) -> String {
    format!("eq.{}", value)
}

impl RestPantryStore {
    pub fn new(
        hosted: &HostedStoreConfig,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", hosted.url, table),
            api_key: hosted.key.clone(),
        })
    }

    fn request(&self, method: Method, filters: &[(&str, String)]) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        self.client
            .request(method, &self.endpoint)
            .headers(trace_headers())
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .query(filters)
    }

    async fn rows(response: reqwest::Result<Response>) -> Result<Vec<PantryRow>, StoreError> {
        let response = response.map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = %status, body = %body, "Pantry store rejected request");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| StoreError::Transport(format!("unexpected store response: {}", e)))
    }
}

#[async_trait]
impl PantryStore for RestPantryStore {
    async fn insert(&self, user: &UserId, item: &PantryItem) -> Result<Vec<PantryRow>, StoreError> {
        let row = NewRow {
            user_id: user,
            item: &item.item,
            quantity: item.quantity,
            unit: &item.unit,
        };

        let response = self.request(Method::POST, &[]).json(&row).send().await;
        Self::rows(response).await
    }

    async fn list(&self, user: &UserId) -> Result<Vec<PantryRow>, StoreError> {
        let filters = [
            ("select", "*".to_string()),
            ("user_id", eq(user)),
            ("order", "id.asc".to_string()),
        ];

        let response = self.request(Method::GET, &filters).send().await;
        Self::rows(response).await
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        id: i64,
        quantity: i64,
    ) -> Result<Option<PantryRow>, StoreError> {
        let filters = [("id", eq(id)), ("user_id", eq(user))];

        let response = self
            .request(Method::PATCH, &filters)
            .json(&QuantityPatch { quantity })
            .send()
            .await;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn delete(&self, user: &UserId, id: i64) -> Result<Option<PantryRow>, StoreError> {
        let filters = [("id", eq(id)), ("user_id", eq(user))];

        let response = self.request(Method::DELETE, &filters).send().await;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let filters = [("select", "id".to_string()), ("limit", "1".to_string())];

        let response = self.request(Method::GET, &filters).send().await;
        let response = response.map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
