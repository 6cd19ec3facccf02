//! API route definitions.

use axum::Router;
use ledgerdesk_shared::AppError;

use crate::{AppState, error::ApiError};

pub mod admin;
pub mod health;

/// Creates the API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/admin", admin::routes())
        .method_not_allowed_fallback(method_not_allowed)
}

/// Fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError(AppError::NotFound("No such route.".to_string()))
}

/// Fallback for a known path called with the wrong verb.
pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError(AppError::MethodNotAllowed("Method Not Allowed".to_string()))
}
