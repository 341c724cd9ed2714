//! Product catalogue endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::error::ApiResult;
use super::AppState;
use crate::domain::{Actor, Product};
use crate::services::NewProductInput;
use crate::storage::{ProductFilter, ProductPatch};

const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub seller_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.catalog.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let defaults = ProductFilter::default();
    let filter = ProductFilter {
        seller_id: query.seller_id,
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
    };
    Ok(Json(state.catalog.list(filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.update(&actor, id, patch).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
