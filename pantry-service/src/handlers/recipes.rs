use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use service_core::error::AppError;

use crate::{
    handlers::{extract::ValidatedJson, pantry::store_failure},
    middleware::CurrentUser,
    models::{EmptyPantryResponse, PromptRequest, RecipeResponse},
    services::{
        metrics::record_recipe_outcome,
        providers::ModelError,
        recipes::{RecipeError, Suggestion, NO_ITEMS_MESSAGE},
    },
    startup::AppState,
};

fn recipe_failure(err: RecipeError, expose_upstream: bool) -> AppError {
    record_recipe_outcome("failed");
    match err {
        RecipeError::Store(e) => store_failure(e, "Failed to fetch pantry items"),
        RecipeError::Model(ModelError::Upstream { status, body }) => AppError::Upstream {
            detail: format!("Recipe model returned status {}", status),
            body: expose_upstream.then_some(body),
        },
        RecipeError::Model(ModelError::Transport(msg)) => {
            tracing::error!(error = %msg, "Recipe model request failed");
            AppError::Upstream {
                detail: "Failed to reach recipe model".to_string(),
                body: None,
            }
        }
    }
}

/// Suggest recipes from the caller's pantry.
///
/// An empty pantry answers 200 with `{"error": ...}` rather than `recipes`,
/// so clients can tell it apart from model output without string matching.
pub async fn suggest_recipes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let suggestion = state
        .recipes
        .suggest(&user.id)
        .await
        .map_err(|e| recipe_failure(e, state.config.model.expose_upstream_errors))?;

    match suggestion {
        Suggestion::EmptyPantry => {
            record_recipe_outcome("empty");
            Ok(Json(EmptyPantryResponse {
                error: NO_ITEMS_MESSAGE.to_string(),
            })
            .into_response())
        }
        Suggestion::Generated(text) => {
            record_recipe_outcome("suggested");
            Ok(Json(RecipeResponse {
                recipes: Value::String(text),
            })
            .into_response())
        }
    }
}

/// Generate recipes from a free-form prompt.
pub async fn prompt_recipes(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<PromptRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    tracing::info!(user_id = %user.id, prompt_len = request.prompt.len(), "Custom recipe prompt");

    let recipes = state
        .recipes
        .complete_prompt(&request.prompt)
        .await
        .map_err(|e| recipe_failure(e, state.config.model.expose_upstream_errors))?;

    record_recipe_outcome("suggested");
    Ok(Json(RecipeResponse { recipes }))
}
