//! Error responses.
//!
//! Every failure is rendered as `{"error": code, "message": text}` with the
//! status code of its [`AppError`] kind. Internal details are logged here and
//! never reach the body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledgerdesk_core::ledger::LedgerError;
use ledgerdesk_shared::AppError;
use serde_json::json;
use tracing::{debug, error};

/// An [`AppError`] ready to be returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(AppError::InvalidArgument(message.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        if err.is_internal() {
            error!(error = %err, "Ledger operation failed");
        } else {
            debug!(error = %err, "Ledger operation refused");
        }
        Self(err.kind())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.message(),
            })),
        )
            .into_response()
    }
}
