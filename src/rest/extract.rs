//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use super::error::ApiError;
use super::AppState;
use crate::domain::Actor;

/// Pulls the acting identity out of the `Authorization: Bearer` header.
///
/// Handlers that take an [`Actor`] parameter are authenticated; leaving
/// the parameter off makes the route public.
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("authorization header is not a bearer token"))?;
        state
            .auth
            .authenticate(token)
            .map_err(|err| ApiError::unauthorized(err.to_string()))
    }
}
