pub mod pantry;
pub mod recipe;

pub use pantry::{DetailResponse, PantryItem, PantryRow, QuantityUpdate, UserId};
pub use recipe::{EmptyPantryResponse, PromptRequest, RecipeResponse};
