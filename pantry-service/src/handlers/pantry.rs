use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::{
    config::ZeroQuantityPolicy,
    handlers::extract::{ValidatedJson, ValidatedPath},
    middleware::CurrentUser,
    models::{DetailResponse, PantryItem, PantryRow, QuantityUpdate},
    services::StoreError,
    startup::AppState,
};

pub const ITEM_DELETED: &str = "Item deleted successfully";
pub const ITEM_DELETED_AT_ZERO: &str = "Item deleted because quantity reached zero";
const ITEM_NOT_FOUND: &str = "Item not found";

/// Map a store failure to the API error, keeping the store's own message in
/// the logs only.
pub(crate) fn store_failure(err: StoreError, detail: &str) -> AppError {
    match err {
        StoreError::Rejected { status, body } => {
            tracing::error!(status, body = %body, "{}", detail);
            AppError::BadRequest(detail.to_string())
        }
        StoreError::Transport(msg) => {
            tracing::error!(error = %msg, "{}", detail);
            AppError::BadGateway(detail.to_string())
        }
        StoreError::Internal(msg) => {
            AppError::Internal(anyhow::anyhow!("{}: {}", detail, msg))
        }
    }
}

pub async fn list_items(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<PantryRow>>, AppError> {
    let rows = state
        .store
        .list(&user.id)
        .await
        .map_err(|e| store_failure(e, "Failed to fetch pantry items"))?;

    Ok(Json(rows))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(item): ValidatedJson<PantryItem>,
) -> Result<(StatusCode, Json<Vec<PantryRow>>), AppError> {
    let rows = state
        .store
        .insert(&user.id, &item)
        .await
        .map_err(|e| store_failure(e, "Failed to insert pantry item"))?;

    if rows.is_empty() {
        tracing::error!(user_id = %user.id, "Pantry store returned no inserted rows");
        return Err(AppError::BadRequest(
            "Failed to insert pantry item".to_string(),
        ));
    }

    tracing::info!(user_id = %user.id, item = %item.item, "Pantry item added");
    Ok((StatusCode::CREATED, Json(rows)))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedPath(item_id): ValidatedPath<i64>,
    ValidatedJson(update): ValidatedJson<QuantityUpdate>,
) -> Result<Response, AppError> {
    if update.quantity == 0
        && state.config.pantry.zero_quantity_policy == ZeroQuantityPolicy::Delete
    {
        state
            .store
            .delete(&user.id, item_id)
            .await
            .map_err(|e| store_failure(e, "Failed to delete pantry item"))?
            .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;

        tracing::info!(user_id = %user.id, item_id, "Pantry item deleted at zero quantity");
        return Ok(Json(DetailResponse::new(ITEM_DELETED_AT_ZERO)).into_response());
    }

    let row = state
        .store
        .update_quantity(&user.id, item_id, update.quantity)
        .await
        .map_err(|e| store_failure(e, "Failed to update pantry item"))?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;

    Ok(Json(row).into_response())
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedPath(item_id): ValidatedPath<i64>,
) -> Result<Json<DetailResponse>, AppError> {
    state
        .store
        .delete(&user.id, item_id)
        .await
        .map_err(|e| store_failure(e, "Failed to delete pantry item"))?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;

    tracing::info!(user_id = %user.id, item_id, "Pantry item removed");
    Ok(Json(DetailResponse::new(ITEM_DELETED)))
}
