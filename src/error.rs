//! Handler-level errors and response helpers.

use askama::Template;
use axum::{
  extract::rejection::PathRejection,
  http::{header, StatusCode},
  response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::services::ServiceError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error("template rendering failed: {0}")]
  Template(#[from] askama::Error),
  #[error(transparent)]
  Service(#[from] ServiceError),
  /// A page was reached without an answer it depends on
  #[error("missing earlier answer: {0}")]
  MissingAnswer(&'static str),
  #[error("page not found")]
  NotFound,
}

impl From<PathRejection> for AppError {
  fn from(rejection: PathRejection) -> Self {
    tracing::debug!("Unmatched path parameter: {}", rejection.body_text());
    AppError::NotFound
  }
}

pub type AppResult<T = Response> = Result<T, AppError>;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
  title: &'static str,
  message: &'static str,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::MissingAnswer(key) => {
        tracing::debug!("Missing answer '{}', sending user back to start", key);
        redirect("/")
      }
      AppError::NotFound => not_found_page(),
      other => {
        tracing::error!("Request failed: {}", other);
        error_page(
          StatusCode::INTERNAL_SERVER_ERROR,
          "Sorry, there is a problem with the service",
          "Try again later.",
        )
      }
    }
  }
}

/// Render the plain error page; falls back to text if the template itself fails
fn error_page(status: StatusCode, title: &'static str, message: &'static str) -> Response {
  match (ErrorTemplate { title, message }).render() {
    Ok(html) => (status, Html(html)).into_response(),
    Err(e) => {
      tracing::error!("Error page failed to render: {}", e);
      (status, title).into_response()
    }
  }
}

fn not_found_page() -> Response {
  error_page(
    StatusCode::NOT_FOUND,
    "Page not found",
    "If you typed the web address, check it is correct.",
  )
}

/// Fallback for unknown routes
pub async fn not_found() -> Response {
  not_found_page()
}

/// 302 redirect
pub fn redirect(path: &str) -> Response {
  (StatusCode::FOUND, [(header::LOCATION, path.to_string())]).into_response()
}

pub fn render<T: Template>(template: &T) -> AppResult {
  render_with_status(StatusCode::OK, template)
}

/// Render with an explicit status, e.g. 400 for a failed submission
pub fn render_with_status<T: Template>(status: StatusCode, template: &T) -> AppResult {
  Ok((status, Html(template.render()?)).into_response())
}

/// Extension trait for logging errors that must not reach the user
pub trait LogOnError<T> {
  /// Log the error at warn level and return None
  fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogOnError<T> for Result<T, E> {
  fn log_warn(self, context: &str) -> Option<T> {
    match self {
      Ok(v) => Some(v),
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        None
      }
    }
  }
}
