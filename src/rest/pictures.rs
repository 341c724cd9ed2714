//! Gallery endpoints: uploads, listings, raw bytes, covers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::domain::{Actor, Picture};

#[derive(Debug, Deserialize)]
pub struct DetachQuery {
    /// Also delete the picture bytes, not just the attachment.
    pub hard: Option<bool>,
}

/// Raw upload: the request body is the picture, Content-Type names its
/// MIME type.
pub async fn upload(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Picture>)> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Content-Type header is required"))?
        .to_string();
    let picture = state
        .gallery
        .upload(&actor, product_id, &mime_type, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(picture)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<Json<Vec<Picture>>> {
    Ok(Json(state.gallery.list(product_id).await?))
}

/// Serve stored picture bytes under their original MIME type.
pub async fn fetch(
    State(state): State<AppState>,
    Path(picture_id): Path<i64>,
) -> ApiResult<Response> {
    let (mime_type, data) = state.gallery.picture_data(picture_id).await?;
    Ok(([(header::CONTENT_TYPE, mime_type)], data).into_response())
}

pub async fn detach(
    State(state): State<AppState>,
    actor: Actor,
    Path((product_id, picture_id)): Path<(i64, i64)>,
    Query(query): Query<DetachQuery>,
) -> ApiResult<StatusCode> {
    state
        .gallery
        .detach(&actor, product_id, picture_id, query.hard.unwrap_or(false))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_cover(
    State(state): State<AppState>,
    actor: Actor,
    Path((product_id, picture_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.gallery.set_cover(&actor, product_id, picture_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
