//! Recipe suggestions: render the pantry into a prompt, ask the chat model,
//! hand back its text untouched.

use crate::config::ModelConfig;
use crate::models::{PantryRow, UserId};
use crate::services::providers::{ChatMessage, ChatModel, ChatRequest, ModelError};
use crate::services::store::{PantryStore, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

pub const NO_ITEMS_MESSAGE: &str = "No pantry items found for this user.";
pub const NO_RECIPES_MESSAGE: &str = "No recipes generated.";

const SUGGEST_SYSTEM_PROMPT: &str =
    "You are a helpful cooking assistant that suggests practical home recipes.";
const CUSTOM_SYSTEM_PROMPT: &str =
    "You are a recipe generator. Respond in JSON format with a title, ingredients, and instructions.";

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// `"{quantity} {unit} {item}"`, skipping blank parts.
pub fn render_fragment(row: &PantryRow) -> String {
    let quantity = row.quantity.to_string();
    [quantity.as_str(), row.unit.trim(), row.item.trim()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_prompt(rows: &[PantryRow], recipe_count: u32) -> String {
    let ingredients = rows
        .iter()
        .map(render_fragment)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "I have the following ingredients in my pantry: {ingredients}.\n\
         Suggest up to {recipe_count} recipes I can cook using mostly these ingredients.\n\
         Format every recipe exactly like this:\n\
         ### <Recipe name>\n\
         Ingredients: <comma-separated list>\n\
         Instructions: <numbered steps>\n\
         Start directly with the first heading. Do not add any introduction or closing remarks."
    )
}

/// `choices[0].message.content`, or [`NO_RECIPES_MESSAGE`] when absent.
pub fn extract_completion_text(response: &Value) -> String {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| NO_RECIPES_MESSAGE.to_string())
}

/// Structured recipes from a free-form completion. Text that is not JSON is
/// wrapped as a single untitled recipe.
pub fn parse_generated_recipes(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| {
        json!([{
            "title": "AI Recipe",
            "ingredients": [],
            "instructions": text,
        }])
    })
}

/// Outcome of a pantry-based suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// The pantry was empty; the model was not called.
    EmptyPantry,
    /// Model text, verbatim.
    Generated(String),
}

#[derive(Debug, Clone)]
pub struct RecipeSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub recipe_count: u32,
}

impl From<&ModelConfig> for RecipeSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            recipe_count: config.recipe_count,
        }
    }
}

#[derive(Clone)]
pub struct RecipeService {
    store: Arc<dyn PantryStore>,
    model: Arc<dyn ChatModel>,
    settings: RecipeSettings,
}

impl RecipeService {
    pub fn new(
        store: Arc<dyn PantryStore>,
        model: Arc<dyn ChatModel>,
        settings: RecipeSettings,
    ) -> Self {
        Self {
            store,
            model,
            settings,
        }
    }

    fn request(&self, system: &str, prompt: String) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Suggest recipes from `user`'s pantry. An empty pantry never reaches
    /// the model.
    pub async fn suggest(&self, user: &UserId) -> Result<Suggestion, RecipeError> {
        let rows = self.store.list(user).await?;
        if rows.is_empty() {
            tracing::info!(user_id = %user, "Pantry is empty; skipping recipe model");
            return Ok(Suggestion::EmptyPantry);
        }

        let prompt = build_prompt(&rows, self.settings.recipe_count);
        let request = self.request(SUGGEST_SYSTEM_PROMPT, prompt);

        tracing::info!(user_id = %user, items = rows.len(), "Requesting recipe suggestions");
        let response = self.model.complete(&request).await?;

        Ok(Suggestion::Generated(extract_completion_text(&response)))
    }

    /// Forward a caller-written prompt to the recipe model and parse the
    /// JSON recipes it was asked for.
    pub async fn complete_prompt(&self, prompt: &str) -> Result<Value, RecipeError> {
        let request = self.request(CUSTOM_SYSTEM_PROMPT, prompt.to_string());
        let response = self.model.complete(&request).await?;
        Ok(parse_generated_recipes(&extract_completion_text(&response)))
    }
}
