use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::UserId, startup::AppState};

/// The authenticated caller, placed in request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
}

/// Resolve the caller before any protected handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // The body is not Sync, so the request must not be borrowed across the await.
    let headers = req.headers().clone();
    let user_id = match state.identity.resolve(&headers).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, path = %req.uri().path(), "Authentication failed");
            return Err(e.into());
        }
    };

    tracing::debug!(user_id = %user_id, "Caller authenticated");
    req.extensions_mut().insert(CurrentUser { id: user_id });

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "CurrentUser missing from request extensions"
                ))
            })
    }
}
