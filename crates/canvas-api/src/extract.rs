//! Request extractors: caller identity and validated JSON bodies.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use canvas_core::UserId;
use canvas_ops::Validate;
use serde::de::DeserializeOwned;

use crate::types::ApiError;

/// Header carrying the authenticated user, set by the session layer in front
/// of this service.
pub const USER_HEADER: &str = "x-user-id";

/// The calling user. Rejects with 401 when the header is missing or blank.
#[derive(Debug, Clone)]
pub struct UserIdentity(pub UserId);

impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserIdentity(UserId::from(value)))
            .ok_or_else(|| ApiError::unauthorized(format!("Missing '{}' header", USER_HEADER)))
    }
}

/// JSON body that must deserialize and pass [`Validate`].
///
/// Both failures answer 400 with `{ error, details }`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::bad_request("Invalid request body")
                    .with_details(vec![rejection.body_text()])
            })?;

        let details = value.validate();
        if !details.is_empty() {
            return Err(ApiError::bad_request("Validation failed").with_details(details));
        }
        Ok(ValidJson(value))
    }
}
