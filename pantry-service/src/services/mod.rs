pub mod identity;
pub mod metrics;
pub mod providers;
pub mod recipes;
pub mod store;

pub use identity::{build_identity_resolver, AuthError, IdentityResolver};
pub use providers::{ChatModel, OpenRouterChatModel};
pub use recipes::RecipeService;
pub use store::{build_store, MemoryPantryStore, PantryStore, RestPantryStore, StoreError};
