//! Content API endpoints
//!
//! JSON counterparts of the public HTML views:
//! - GET /api/v1/pages
//! - GET /api/v1/pages/{slug}
//! - GET /api/v1/categories
//! - GET /api/v1/categories/{slug}/pages
//! - GET /api/v1/tags
//! - GET /api/v1/tags/{slug}/pages
//! - GET /api/v1/search?q=

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::{PageQueryParams, SearchQueryParams};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{
    CategoryListResponse, CategoryPagesResponse, PageListResponse, SearchResponse, TagListResponse,
    TagPagesResponse,
};
use crate::services::PageDetail;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pages", get(list_pages))
        .route("/pages/{slug}", get(get_page))
        .route("/categories", get(list_categories))
        .route("/categories/{slug}/pages", get(category_pages))
        .route("/tags", get(list_tags))
        .route("/tags/{slug}/pages", get(tag_pages))
        .route("/search", get(search))
}

async fn list_pages(
    State(state): State<AppState>,
    Query(query): Query<PageQueryParams>,
) -> Result<Json<PageListResponse>, ApiError> {
    let pages = state.content.list_published(&query.list_params()?).await?;
    Ok(Json(pages.into()))
}

/// Published page with its category, tags and related pages
async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PageDetail>, ApiError> {
    Ok(Json(state.content.get_published(&slug).await?))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.content.list_categories().await?;
    Ok(Json(CategoryListResponse { categories }))
}

async fn category_pages(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQueryParams>,
) -> Result<Json<CategoryPagesResponse>, ApiError> {
    let (category, pages) = state
        .content
        .list_by_category_slug(&slug, &query.list_params()?)
        .await?;
    Ok(Json(CategoryPagesResponse {
        category,
        listing: pages.into(),
    }))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.content.list_tags().await?;
    Ok(Json(TagListResponse { tags }))
}

async fn tag_pages(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQueryParams>,
) -> Result<Json<TagPagesResponse>, ApiError> {
    let (tag, pages) = state.content.list_by_tag_slug(&slug, &query.list_params()?).await?;
    Ok(Json(TagPagesResponse {
        tag,
        listing: pages.into(),
    }))
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQueryParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let pages = state.content.search(&query.q, &query.list_params()?).await?;
    Ok(Json(SearchResponse {
        query: query.q,
        listing: pages.into(),
    }))
}
