//! Contact form endpoints
//!
//! - GET /contact/ - the form
//! - POST /contact/ - urlencoded submit, redirects to the success page
//! - POST /contact/submit/ - JSON submit used by `contact.js`
//! - GET /contact/success/ - confirmation
//!
//! Both submit endpoints check the rate limit before looking at the body.

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::api::middleware::{AppState, ClientIp};
use crate::api::site::{base_context, error_page, render, server_error_page};
use crate::models::{ContactForm, FieldErrors};
use crate::services::ContactError;

pub const SUCCESS_MESSAGE: &str = "Your message has been sent successfully!";
pub const RATE_LIMITED_MESSAGE: &str = "Too many submissions. Please try again later.";
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid data format.";
pub const SERVER_ERROR_MESSAGE: &str = "An error occurred. Please try again.";

/// Key for errors not tied to a field
const NON_FIELD_ERRORS: &str = "__all__";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact/", get(contact_page).post(submit_form))
        .route("/contact/submit/", axum::routing::post(submit_json))
        .route("/contact/success/", get(success_page))
}

/// Body of `POST /contact/submit/`
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<SubmitErrors>,
}

/// `errors` of a failed JSON submission: messages per field, or a single
/// `__all__` string when the failure is not tied to a field
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SubmitErrors {
    Fields(FieldErrors),
    NonField {
        #[serde(rename = "__all__")]
        message: String,
    },
}

impl ContactResponse {
    fn sent() -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            errors: None,
        }
    }

    fn failed(errors: SubmitErrors) -> Self {
        Self {
            success: false,
            message: None,
            errors: Some(errors),
        }
    }

    fn failed_with(message: &str) -> Self {
        Self::failed(SubmitErrors::NonField {
            message: message.to_string(),
        })
    }
}

/// Form-page errors; the template lists `__all__` messages like field ones
fn non_field_error(message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(NON_FIELD_ERRORS.to_string(), vec![message.to_string()]);
    errors
}

fn json_error(error: ContactError) -> (StatusCode, Json<ContactResponse>) {
    match error {
        ContactError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ContactResponse::failed_with(RATE_LIMITED_MESSAGE)),
        ),
        ContactError::Invalid(errors) => (
            StatusCode::BAD_REQUEST,
            Json(ContactResponse::failed(SubmitErrors::Fields(errors))),
        ),
        ContactError::Internal(cause) => {
            tracing::error!("Contact submission failed: {:#}", cause);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ContactResponse::failed_with(SERVER_ERROR_MESSAGE)),
            )
        }
    }
}

/// POST /contact/submit/
async fn submit_json(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> (StatusCode, Json<ContactResponse>) {
    if let Err(e) = state.contact.ensure_within_limit(ip.as_deref()).await {
        return json_error(e);
    }

    let form: ContactForm = match serde_json::from_slice(&body) {
        Ok(form) => form,
        Err(e) => {
            tracing::debug!("Malformed contact submission: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ContactResponse::failed_with(INVALID_FORMAT_MESSAGE)),
            );
        }
    };

    match state.contact.submit(&form, ip).await {
        Ok(_) => (StatusCode::OK, Json(ContactResponse::sent())),
        Err(e) => json_error(e),
    }
}

/// GET /contact/
async fn contact_page(State(state): State<AppState>) -> Response {
    render_form(&state, StatusCode::OK, &ContactForm::default(), &FieldErrors::new()).await
}

async fn render_form(state: &AppState, status: StatusCode, form: &ContactForm, errors: &FieldErrors) -> Response {
    let mut context = match base_context(state).await {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!("Rendering contact form without sidebar: {}", e);
            Context::new()
        }
    };
    context.insert("form", form);
    context.insert("errors", errors);
    render(state, status, "contact.html", &context)
}

/// POST /contact/
async fn submit_form(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    form: Result<Form<ContactForm>, FormRejection>,
) -> Response {
    if let Err(e) = state.contact.ensure_within_limit(ip.as_deref()).await {
        return form_error(&state, &ContactForm::default(), e).await;
    }

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!("Malformed contact form: {}", rejection);
            return render_form(
                &state,
                StatusCode::BAD_REQUEST,
                &ContactForm::default(),
                &non_field_error(INVALID_FORMAT_MESSAGE),
            )
            .await;
        }
    };

    match state.contact.submit(&form, ip).await {
        Ok(_) => Redirect::to("/contact/success/").into_response(),
        Err(e) => form_error(&state, &form, e).await,
    }
}

async fn form_error(state: &AppState, form: &ContactForm, error: ContactError) -> Response {
    match error {
        ContactError::RateLimited => error_page(
            state,
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests",
            RATE_LIMITED_MESSAGE,
        ),
        ContactError::Invalid(errors) => render_form(state, StatusCode::BAD_REQUEST, form, &errors).await,
        ContactError::Internal(cause) => server_error_page(state, &cause),
    }
}

/// GET /contact/success/
async fn success_page(State(state): State<AppState>) -> Response {
    render(&state, StatusCode::OK, "success.html", &Context::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_field_errors_serialize_as_string() {
        let value = serde_json::to_value(ContactResponse::failed_with(RATE_LIMITED_MESSAGE)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"success": false, "errors": {"__all__": RATE_LIMITED_MESSAGE}})
        );
    }

    #[test]
    fn test_field_errors_serialize_as_lists() {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), vec!["Enter a valid email address.".to_string()]);
        let value = serde_json::to_value(ContactResponse::failed(SubmitErrors::Fields(errors))).unwrap();
        assert_eq!(value["errors"]["email"][0], "Enter a valid email address.");
    }
}
