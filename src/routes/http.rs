//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic result info; failures become
//! `TutorError` responses (status + `{error, message}`).

use std::sync::Arc;
use axum::{extract::{rejection::JsonRejection, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::QuizAttempt;
use crate::error::{Result, TutorError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(TopicsOut { topics: state.topics.clone() })
}

/// Request bodies can carry a full-size photo as a data URL, well past axum's
/// default 2 MB limit. Gemini caps inline request data at 20 MB.
pub const GRAMMAR_BODY_LIMIT: usize = 20 * 1024 * 1024;

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_grammar(
  State(state): State<Arc<AppState>>,
  body: std::result::Result<Json<GrammarIn>, JsonRejection>,
) -> Result<Json<GrammarOut>> {
  let Json(body) = body?;
  let image = decode_image(body.image.as_deref())?;
  let errors = check_grammar(&state, &body.text, image).await?;
  info!(target: "grammar", found = errors.len(), "HTTP grammar check served");
  Ok(Json(GrammarOut { count: errors.len(), errors }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  body: std::result::Result<Json<QuizIn>, JsonRejection>,
) -> Result<Json<QuizOut>> {
  let Json(body) = body?;
  let questions = generate_quiz(&state, &body.topics).await?;
  info!(target: "quiz", count = questions.len(), "HTTP quiz served");
  Ok(Json(QuizOut { questions }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_quiz_score(
  State(state): State<Arc<AppState>>,
  body: std::result::Result<Json<ScoreIn>, JsonRejection>,
) -> Result<impl IntoResponse> {
  let Json(body) = body?;
  if let Some(idx) = body.questions.iter().position(|q| !q.answer_in_bounds()) {
    let q = &body.questions[idx];
    return Err(TutorError::invalid_input(format!(
      "question {idx}: answer {} out of bounds for {} options",
      q.answer,
      q.options.len()
    )));
  }
  if body.answers.len() > body.questions.len() {
    return Err(TutorError::invalid_input(format!(
      "{} answers for {} questions",
      body.answers.len(),
      body.questions.len()
    )));
  }
  let mut attempt = QuizAttempt::new(body.questions.len());
  for (idx, sel) in body.answers.iter().enumerate() {
    if let Some(option) = sel {
      attempt.select(&body.questions, idx, *option)?;
    }
  }
  let progress = score_quiz(&state, &body.topics, &body.questions, &attempt);
  Ok(Json(progress))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_greeting(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(GreetingOut { message: crate::domain::ChatMessage::assistant(state.prompts.tutor_greeting.clone()) })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_tutor_message(
  State(state): State<Arc<AppState>>,
  body: std::result::Result<Json<TutorIn>, JsonRejection>,
) -> Result<Json<TutorOut>> {
  let Json(body) = body?;
  let history = send_chat_message(&state, body.history, &body.text).await?;
  let reply = history
    .last()
    .cloned()
    .ok_or_else(|| TutorError::malformed("tutor produced no reply"))?;
  Ok(Json(TutorOut { history, reply }))
}
