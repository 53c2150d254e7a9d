//! Admin API endpoints
//!
//! Mounted under `/api/v1/admin` behind [`require_admin`]:
//! - contact moderation: list, view, mark read/unread, delete
//! - page, category and tag saves
//!
//! [`require_admin`]: crate::api::middleware::require_admin

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ContactListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UpdatedResponse;
use crate::models::{Category, CategoryInput, Contact, Page, PageInput, PagedResult, Tag, TagInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/mark-read", post(mark_read))
        .route("/contacts/mark-unread", post(mark_unread))
        .route("/contacts/{id}", get(get_contact).delete(delete_contact))
        .route("/pages", post(create_page))
        .route("/pages/{id}", put(update_page).delete(delete_page))
        .route("/categories", post(create_category))
        .route("/tags", post(create_tag))
}

/// Body of the bulk contact actions
#[derive(Debug, Deserialize)]
pub struct ContactIdsRequest {
    pub ids: Vec<i64>,
}

/// Unwrap a JSON body, reporting rejections in the API error envelope
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation_error(rejection.body_text()))
}

/// GET /api/v1/admin/contacts - newest first, filterable by read state and text
async fn list_contacts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ContactListQuery>,
) -> Result<Json<PagedResult<Contact>>, ApiError> {
    let contacts = state
        .moderation
        .list_contacts(&query.filter(), &query.list_params())
        .await?;
    Ok(Json(contacts))
}

async fn get_contact(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    Ok(Json(state.moderation.get_contact(id).await?))
}

/// POST /api/v1/admin/contacts - always refused
async fn create_contact(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Contact>, ApiError> {
    Ok(Json(state.moderation.create_contact().await?))
}

async fn mark_read(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    payload: Result<Json<ContactIdsRequest>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let body = json_body(payload)?;
    let updated = state.moderation.mark_read(&body.ids).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_unread(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    payload: Result<Json<ContactIdsRequest>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let body = json_body(payload)?;
    let updated = state.moderation.mark_unread(&body.ids).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn delete_contact(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.moderation.delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/pages
async fn create_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<PageInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Page>), ApiError> {
    let input = json_body(payload)?;
    let page = state.moderation.save_page(input, &user, None).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// PUT /api/v1/admin/pages/{id}
async fn update_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    payload: Result<Json<PageInput>, JsonRejection>,
) -> Result<Json<Page>, ApiError> {
    let input = json_body(payload)?;
    Ok(Json(state.moderation.save_page(input, &user, Some(id)).await?))
}

async fn delete_page(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.moderation.delete_page(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let input = json_body(payload)?;
    let category = state.moderation.save_category(input, &user, None).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn create_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<TagInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let input = json_body(payload)?;
    let tag = state.moderation.save_tag(input, &user, None).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}
