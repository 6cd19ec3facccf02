//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;

/// Message returned for a body that is not valid JSON for the route.
pub const INVALID_REQUEST: &str = "Invalid request data.";

/// JSON body whose rejection is an `invalid-argument` error response.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(reason = %rejection_reason(&rejection), "Rejected request body");
                Err(ApiError::invalid(INVALID_REQUEST))
            }
        }
    }
}

fn rejection_reason(rejection: &JsonRejection) -> String {
    rejection.body_text()
}
