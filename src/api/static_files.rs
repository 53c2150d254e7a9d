//! Static file serving
//!
//! The contact form script and the stylesheet are embedded from
//! `assets/static/` and served under `/static/`.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/static/"]
struct StaticAssets;

/// GET /static/{*path}
pub async fn serve_static(Path(path): Path<String>) -> Response {
    match StaticAssets::get(path.trim_start_matches('/')) {
        Some(content) => (
            [
                (header::CONTENT_TYPE, get_content_type(&path)),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            content.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(get_content_type("contact.js"), "application/javascript; charset=utf-8");
        assert_eq!(get_content_type("style.css"), "text/css; charset=utf-8");
        assert_eq!(get_content_type("archive"), "application/octet-stream");
    }

    #[test]
    fn test_assets_are_embedded() {
        assert!(StaticAssets::get("contact.js").is_some());
        assert!(StaticAssets::get("style.css").is_some());
        assert!(StaticAssets::get("missing.txt").is_none());
    }
}
