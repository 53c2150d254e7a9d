//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error envelope
//! - Bearer-token authorization for the moderation API
//! - Client address extraction for the contact rate limit

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxContactRepository, SqlxPageRepository, SqlxTagRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    notifier_from_config, ContactRateLimiter, ContactService, ContentError, ContentService,
    ModerationError, ModerationService, UserService,
};
use crate::theme::ThemeEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub contact: Arc<ContactService>,
    pub moderation: Arc<ModerationService>,
    pub theme: Arc<ThemeEngine>,
    /// Site owner; author of pages saved through the admin API
    pub admin_user: Arc<User>,
    /// Bearer token for `/api/v1/admin`. `None` disables the admin API.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Wire repositories and services over `pool`, and provision the admin
    /// user.
    pub async fn from_config(
        config: &Config,
        pool: DynDatabasePool,
        theme: ThemeEngine,
    ) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache)?;

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let page_repo = SqlxPageRepository::boxed(pool.clone());
        let contact_repo = SqlxContactRepository::boxed(pool);

        let content = Arc::new(ContentService::new(
            page_repo.clone(),
            category_repo.clone(),
            tag_repo.clone(),
            cache,
        ));
        let contact = Arc::new(ContactService::new(
            contact_repo.clone(),
            ContactRateLimiter::from_config(contact_repo.clone(), &config.contact),
            notifier_from_config(&config.contact, &config.smtp),
        ));
        let moderation = Arc::new(ModerationService::new(
            contact_repo,
            page_repo,
            category_repo,
            tag_repo,
            content.clone(),
        ));

        let admin_user = UserService::new(user_repo)
            .ensure_user(&config.admin.username, &config.admin.email)
            .await?;
        let admin_token: Option<Arc<str>> = config
            .admin
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Arc::from);
        if admin_token.is_none() {
            tracing::warn!("admin.token is not set; the admin API is disabled");
        }

        Ok(Self {
            content,
            contact,
            moderation,
            theme: Arc::new(theme),
            admin_user: Arc::new(admin_user),
            admin_token,
        })
    }
}

/// Admin user attached to an authorized request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Generic 500. The cause is logged, never returned.
    pub fn internal_error(cause: &anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", cause);
        Self::new("INTERNAL_ERROR", "An internal error occurred")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            ContentError::Internal(cause) => Self::internal_error(&cause),
        }
    }
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            ModerationError::AddNotPermitted => {
                Self::forbidden("Contact submissions cannot be added by moderators")
            }
            ModerationError::Validation(errors) => Self::with_details(
                "VALIDATION_ERROR",
                "Validation failed",
                serde_json::to_value(errors).unwrap_or_default(),
            ),
            ModerationError::Internal(cause) => Self::internal_error(&cause),
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Admin authorization middleware
///
/// Compares the bearer token with `admin.token`. Without a configured token
/// every request is rejected.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Admin API is disabled"))?;

    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    if token != expected {
        tracing::warn!("Rejected admin request with an invalid token");
        return Err(ApiError::unauthorized("Invalid authentication token"));
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser(state.admin_user.as_ref().clone()));
    Ok(next.run(request).await)
}

/// Client address for rate limiting: the first `X-Forwarded-For` entry,
/// else the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_ip(&parts.headers, peer)))
    }
}

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_entry() {
        let headers = headers_with("x-forwarded-for", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&headers, peer()), Some("203.0.113.9".to_string()));
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), Some("10.0.0.7".to_string()));

        let blank = headers_with("x-forwarded-for", " ");
        assert_eq!(client_ip(&blank, peer()), Some("10.0.0.7".to_string()));
    }

    #[test]
    fn test_client_ip_unknown() {
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_extract_bearer_token() {
        let headers = headers_with("authorization", "Bearer secret-token");
        assert_eq!(extract_bearer_token(&headers), Some("secret-token"));

        let basic = headers_with("authorization", "Basic abc");
        assert!(extract_bearer_token(&basic).is_none());
        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::new("SOMETHING_ELSE", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_moderation_errors_map_to_api_errors() {
        let forbidden: ApiError = ModerationError::AddNotPermitted.into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let mut errors = crate::models::FieldErrors::new();
        errors.insert("title".to_string(), vec!["This field is required.".to_string()]);
        let invalid: ApiError = ModerationError::Validation(errors).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            invalid.error.details,
            Some(serde_json::json!({"title": ["This field is required."]}))
        );

        let internal: ApiError = ModerationError::Internal(anyhow::anyhow!("db down")).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!internal.error.message.contains("db down"));
    }
}
