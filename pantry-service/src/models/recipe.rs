use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Model text for pantry suggestions, structured recipes for free-form prompts.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub recipes: Value,
}

/// Returned instead of [`RecipeResponse`] when the caller's pantry is empty.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmptyPantryResponse {
    pub error: String,
}

/// Free-form prompt forwarded to the recipe model.
#[derive(Debug, Deserialize, Validate)]
pub struct PromptRequest {
    #[validate(length(min = 1, max = 4000, message = "Prompt must be between 1 and 4000 characters"))]
    pub prompt: String,
}
