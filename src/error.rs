//! Error taxonomy shared by the prompt builder, the model gateway, the parser,
//! and the feature orchestrators.
//!
//! Orchestrators never recover from these locally: every variant travels
//! unchanged up to the HTTP/WebSocket layer, which turns it into a status code
//! plus a `{ "error": <kind>, "message": ... }` body.

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// A specialized `Result` type for tutor operations.
pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TutorError {
  /// Caller violated a precondition (empty topic list, blank text, bad image).
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  /// Network failure or unexpected status from the model service.
  #[error("Model service unreachable: {0}")]
  TransportError(String),

  /// Missing or rejected API key.
  #[error("Model service rejected credentials: {0}")]
  AuthError(String),

  /// The service declined to answer (safety block, empty candidate, ...).
  #[error("Model declined to answer: {0}")]
  ModelRefusal(String),

  /// Reply did not parse or violated a schema invariant.
  #[error("Malformed model response: {0}")]
  MalformedResponse(String),
}

impl TutorError {
  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput(message.into())
  }

  pub fn malformed(message: impl Into<String>) -> Self {
    Self::MalformedResponse(message.into())
  }

  /// Stable snake_case tag used on the wire.
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::InvalidInput(_) => "invalid_input",
      Self::TransportError(_) => "transport_error",
      Self::AuthError(_) => "auth_error",
      Self::ModelRefusal(_) => "model_refusal",
      Self::MalformedResponse(_) => "malformed_response",
    }
  }

  pub const fn status(&self) -> StatusCode {
    match self {
      Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
      Self::TransportError(_) | Self::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
      Self::AuthError(_) => StatusCode::SERVICE_UNAVAILABLE,
      Self::ModelRefusal(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
  }
}

/// Body returned to clients for any failed call.
#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: &'static str,
  pub message: String,
}

impl From<&TutorError> for ErrorOut {
  fn from(e: &TutorError) -> Self {
    ErrorOut { error: e.kind(), message: e.to_string() }
  }
}

impl IntoResponse for TutorError {
  fn into_response(self) -> axum::response::Response {
    (self.status(), Json(ErrorOut::from(&self))).into_response()
  }
}

/// Bodies axum refuses to extract (too large, wrong content type, bad JSON)
/// are the caller's fault.
impl From<JsonRejection> for TutorError {
  fn from(rejection: JsonRejection) -> Self {
    TutorError::InvalidInput(rejection.body_text())
  }
}
