//! Public HTML views
//!
//! - GET / - landing page
//! - GET /blog/ - published pages
//! - GET /search/ - search results
//! - GET /page/{slug}/ - page detail
//! - GET /category/{slug}/ - pages in a category
//! - GET /tag/{slug}/ - pages with a tag
//!
//! Every listing view carries the sidebar.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tera::Context;

use crate::api::common::{PageQueryParams, SearchQueryParams};
use crate::api::middleware::AppState;
use crate::models::{Page, PagedResult};
use crate::services::ContentError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/blog/", get(home))
        .route("/search/", get(search))
        .route("/page/{slug}/", get(page_detail))
        .route("/category/{slug}/", get(category_pages))
        .route("/tag/{slug}/", get(tag_pages))
}

/// Render `template`, falling back to the error page if rendering fails
pub(crate) fn render(state: &AppState, status: StatusCode, template: &str, context: &Context) -> Response {
    (status, Html(state.theme.render_with_fallback(template, context))).into_response()
}

pub(crate) fn error_page(state: &AppState, status: StatusCode, title: &str, message: &str) -> Response {
    let mut context = Context::new();
    context.insert("status", &status.as_u16());
    context.insert("title", title);
    context.insert("message", message);
    render(state, status, crate::theme::ERROR_TEMPLATE, &context)
}

pub(crate) fn server_error_page(state: &AppState, cause: &anyhow::Error) -> Response {
    tracing::error!("Failed to build page: {:#}", cause);
    error_page(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Server Error",
        "Something went wrong. Please try again later.",
    )
}

fn not_found_page(state: &AppState) -> Response {
    error_page(
        state,
        StatusCode::NOT_FOUND,
        "Page Not Found",
        "The page you are looking for does not exist.",
    )
}

/// Fallback for unknown routes
pub async fn not_found(State(state): State<AppState>) -> Response {
    not_found_page(&state)
}

fn respond(state: &AppState, result: Result<Response, ContentError>) -> Response {
    result.unwrap_or_else(|e| match e {
        ContentError::NotFound(what) => {
            tracing::debug!("{} not found", what);
            not_found_page(state)
        }
        ContentError::Internal(cause) => server_error_page(state, &cause),
    })
}

/// Context holding the sidebar shared by listing views
pub(crate) async fn base_context(state: &AppState) -> Result<Context, ContentError> {
    let mut context = Context::new();
    context.insert("sidebar", &state.content.sidebar().await?);
    Ok(context)
}

fn insert_listing(context: &mut Context, pages: &PagedResult<Page>) {
    context.insert("pages", &pages.items);
    context.insert("pagination", &pages.pagination());
}

async fn landing(State(state): State<AppState>) -> Response {
    let result = render_landing(&state).await;
    respond(&state, result)
}

async fn render_landing(state: &AppState) -> Result<Response, ContentError> {
    let landing = state.content.landing().await?;

    let mut context = Context::new();
    context.insert("categories", &landing.categories);
    context.insert("pages", &landing.recent_pages);
    Ok(render(state, StatusCode::OK, "landing.html", &context))
}

async fn home(State(state): State<AppState>, Query(query): Query<PageQueryParams>) -> Response {
    let result = render_home(&state, &query).await;
    respond(&state, result)
}

async fn render_home(state: &AppState, query: &PageQueryParams) -> Result<Response, ContentError> {
    let pages = state.content.list_published(&query.list_params()?).await?;

    let mut context = base_context(state).await?;
    insert_listing(&mut context, &pages);
    Ok(render(state, StatusCode::OK, "home.html", &context))
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQueryParams>) -> Response {
    let result = render_search(&state, &query).await;
    respond(&state, result)
}

async fn render_search(state: &AppState, query: &SearchQueryParams) -> Result<Response, ContentError> {
    let pages = state.content.search(&query.q, &query.list_params()?).await?;

    let mut context = base_context(state).await?;
    context.insert("query", &query.q);
    insert_listing(&mut context, &pages);
    Ok(render(state, StatusCode::OK, "search.html", &context))
}

async fn page_detail(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let result = render_page_detail(&state, &slug).await;
    respond(&state, result)
}

async fn render_page_detail(state: &AppState, slug: &str) -> Result<Response, ContentError> {
    let detail = state.content.get_published(slug).await?;

    let mut context = base_context(state).await?;
    context.insert("page", &detail.page);
    context.insert("category", &detail.category);
    context.insert("tags", &detail.tags);
    context.insert("related", &detail.related);
    Ok(render(state, StatusCode::OK, "detail.html", &context))
}

async fn category_pages(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQueryParams>,
) -> Response {
    let result = render_category(&state, &slug, &query).await;
    respond(&state, result)
}

async fn render_category(
    state: &AppState,
    slug: &str,
    query: &PageQueryParams,
) -> Result<Response, ContentError> {
    let (category, pages) = state
        .content
        .list_by_category_slug(slug, &query.list_params()?)
        .await?;

    let mut context = base_context(state).await?;
    context.insert("category", &category);
    insert_listing(&mut context, &pages);
    Ok(render(state, StatusCode::OK, "category.html", &context))
}

async fn tag_pages(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQueryParams>,
) -> Response {
    let result = render_tag(&state, &slug, &query).await;
    respond(&state, result)
}

async fn render_tag(state: &AppState, slug: &str, query: &PageQueryParams) -> Result<Response, ContentError> {
    let (tag, pages) = state.content.list_by_tag_slug(slug, &query.list_params()?).await?;
    let tags = state.content.list_tags().await?;

    let mut context = base_context(state).await?;
    context.insert("tag", &tag);
    context.insert("tags", &tags);
    insert_listing(&mut context, &pages);
    Ok(render(state, StatusCode::OK, "tag.html", &context))
}
