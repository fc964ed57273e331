//! Feature orchestrators shared by both HTTP and WebSocket handlers.
//!
//! Each one composes prompt → gateway → parser for one feature:
//!   - grammar check (text and/or image)
//!   - quiz generation (selected topics)
//!   - chat turn with the tutor persona
//!   - quiz scoring into a progress record (no model call)
//!
//! None of them retry or recover: a failure propagates unchanged and the call
//! yields no partial results.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ChatMessage, GrammarError, ImageInput, QuizAttempt, QuizQuestion, StudyProgress};
use crate::error::{Result, TutorError};
use crate::gemini::GenerateRequest;
use crate::parser::{parse_grammar_response, parse_quiz_response};
use crate::prompts::{build_grammar_prompt, build_quiz_prompt};
use crate::schema::{grammar_schema, quiz_schema};
use crate::state::AppState;

#[instrument(level = "info", skip(state, text, image), fields(text_len = text.len(), has_image = image.is_some()))]
pub async fn check_grammar(state: &AppState, text: &str, image: Option<ImageInput>) -> Result<Vec<GrammarError>> {
  if text.trim().is_empty() && image.is_none() {
    return Err(TutorError::invalid_input("provide text or an image to check"));
  }

  let prompt = build_grammar_prompt(&state.prompts, text, image.is_some());
  let raw = state
    .gateway
    .generate(GenerateRequest {
      system_instruction: None,
      prompt,
      image,
      schema: Some(grammar_schema()),
      temperature: Some(0.0),
    })
    .await?;

  let errors = parse_grammar_response(&raw)?;
  info!(target: "grammar", found = errors.len(), "Grammar check complete");
  Ok(errors)
}

#[instrument(level = "info", skip(state, topics), fields(topics = topics.len()))]
pub async fn generate_quiz(state: &AppState, topics: &[String]) -> Result<Vec<QuizQuestion>> {
  let prompt = build_quiz_prompt(&state.prompts, topics)?;
  let raw = state
    .gateway
    .generate(GenerateRequest {
      system_instruction: None,
      prompt,
      image: None,
      schema: Some(quiz_schema()),
      temperature: None,
    })
    .await?;

  let questions = parse_quiz_response(&raw)?;
  if questions.len() != crate::prompts::QUIZ_QUESTION_COUNT {
    debug!(target: "quiz", got = questions.len(), "Model returned an unexpected number of questions");
  }
  info!(target: "quiz", count = questions.len(), "Quiz generated");
  Ok(questions)
}

/// One tutor turn. Only the new text plus the system instruction reach the
/// model; earlier turns are not resent. Returns `history` with the user
/// message and the reply appended; on failure nothing is appended.
#[instrument(level = "info", skip(state, history, text), fields(history_len = history.len(), text_len = text.len()))]
pub async fn send_chat_message(state: &AppState, mut history: Vec<ChatMessage>, text: &str) -> Result<Vec<ChatMessage>> {
  let text = text.trim();
  if text.is_empty() {
    return Err(TutorError::invalid_input("message must not be empty"));
  }

  let reply = state
    .gateway
    .generate(GenerateRequest {
      system_instruction: Some(state.prompts.tutor_system.clone()),
      prompt: text.to_string(),
      image: None,
      schema: None,
      temperature: None,
    })
    .await?;

  history.push(ChatMessage::user(text));
  history.push(ChatMessage::assistant(reply.trim()));
  debug!(target: "tutor", history_len = history.len(), "Tutor replied");
  Ok(history)
}

/// Fresh chat history: just the tutor greeting.
pub fn initial_chat(state: &AppState) -> Vec<ChatMessage> {
  vec![ChatMessage::assistant(state.prompts.tutor_greeting.clone())]
}

/// Score an attempt and wrap it as a progress record.
#[instrument(level = "info", skip_all, fields(questions = questions.len(), answered = attempt.answered()))]
pub fn score_quiz(state: &AppState, topics: &[String], questions: &[QuizQuestion], attempt: &QuizAttempt) -> StudyProgress {
  if attempt.selections.len() > questions.len() {
    warn!(target: "quiz", selections = attempt.selections.len(), questions = questions.len(), "Extra selections ignored");
  }
  let score = attempt.score(questions);

  // Only tag a unit when every topic is known and they all agree.
  let units: Option<Vec<i64>> = topics.iter().map(|t| state.unit_for_topic(t)).collect();
  let unit = match units.as_deref() {
    Some([first, rest @ ..]) if rest.iter().all(|u| u == first) => Some(*first),
    _ => None,
  };

  info!(target: "quiz", score, total = questions.len(), "Quiz scored");
  StudyProgress {
    unit,
    title: topics.join(", "),
    score,
    total_questions: questions.len(),
    last_attempt: Utc::now(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::Arc;

  use crate::config::AgentConfig;
  use crate::testing::StubGateway;

  fn state_with(stub: &Arc<StubGateway>) -> AppState {
    AppState::with_gateway(stub.clone(), AgentConfig::default())
  }

  #[tokio::test]
  async fn grammar_check_returns_parsed_errors() {
    let stub = StubGateway::replying(vec![Ok(
      r#"{"errors":[{"error":"I go to school yesterday","correction":"I went to school yesterday","explanation":"Dùng thì quá khứ đơn","unit":4}]}"#.into(),
    )]);
    let state = state_with(&stub);

    let errors = check_grammar(&state, "I go to school yesterday", None).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].unit, 4);

    let reqs = stub.requests();
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].prompt.contains("I go to school yesterday"));
    assert!(reqs[0].schema.is_some());
    assert!(reqs[0].image.is_none());
  }

  #[tokio::test]
  async fn grammar_check_without_input_never_calls_the_model() {
    let stub = StubGateway::replying(vec![]);
    let state = state_with(&stub);
    let err = check_grammar(&state, "  ", None).await.unwrap_err();
    assert!(matches!(err, TutorError::InvalidInput(_)));
    assert!(stub.requests().is_empty());
  }

  #[tokio::test]
  async fn grammar_check_image_only_forwards_image() {
    let stub = StubGateway::replying(vec![Ok(r#"{"errors":[]}"#.into())]);
    let state = state_with(&stub);
    let img = ImageInput { mime_type: "image/jpeg".into(), bytes: vec![0xff, 0xd8] };
    let errors = check_grammar(&state, "", Some(img.clone())).await.unwrap();
    assert!(errors.is_empty());
    assert_eq!(stub.requests()[0].image.as_ref(), Some(&img));
    assert!(stub.requests()[0].prompt.contains(&state.prompts.grammar_image_note));
  }

  #[tokio::test]
  async fn gateway_failures_propagate_unchanged() {
    let stub = StubGateway::replying(vec![Err(TutorError::AuthError("bad key".into()))]);
    let state = state_with(&stub);
    let err = check_grammar(&state, "He go", None).await.unwrap_err();
    assert_eq!(err, TutorError::AuthError("bad key".into()));
  }

  #[tokio::test]
  async fn quiz_generation_accepts_any_valid_count() {
    let stub = StubGateway::replying(vec![Ok(
      r#"{"questions":[{"question":"q","options":["A","B","C","D"],"answer":3,"explanation":"e"}]}"#.into(),
    )]);
    let state = state_with(&stub);
    let topics = vec!["Shopping (Relative Clauses)".to_string()];
    let qs = generate_quiz(&state, &topics).await.unwrap();
    assert_eq!(qs.len(), 1);
    assert!(stub.requests()[0].prompt.contains("Shopping (Relative Clauses)"));
  }

  #[tokio::test]
  async fn quiz_generation_rejects_empty_topics_before_calling() {
    let stub = StubGateway::replying(vec![]);
    let state = state_with(&stub);
    assert!(matches!(generate_quiz(&state, &[]).await, Err(TutorError::InvalidInput(_))));
    assert!(stub.requests().is_empty());
  }

  #[tokio::test]
  async fn quiz_generation_surfaces_malformed_reply() {
    let stub = StubGateway::replying(vec![Ok(
      r#"{"questions":[{"question":"q","options":["A","B","C","D"],"answer":4,"explanation":"e"}]}"#.into(),
    )]);
    let state = state_with(&stub);
    let err = generate_quiz(&state, &["City Life (Phrasal verbs)".to_string()]).await.unwrap_err();
    assert!(matches!(err, TutorError::MalformedResponse(_)));
  }

  #[tokio::test]
  async fn chat_turn_appends_user_and_reply() {
    let stub = StubGateway::replying(vec![Ok("Mệnh đề quan hệ dùng who/which/that...\n".into())]);
    let state = state_with(&stub);
    let history = initial_chat(&state);

    let history = send_chat_message(&state, history, "Cách dùng Relative Clauses?").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1], ChatMessage::user("Cách dùng Relative Clauses?"));
    assert_eq!(history[2], ChatMessage::assistant("Mệnh đề quan hệ dùng who/which/that..."));

    let req = &stub.requests()[0];
    assert_eq!(req.system_instruction.as_deref(), Some(state.prompts.tutor_system.as_str()));
    assert_eq!(req.prompt, "Cách dùng Relative Clauses?");
  }

  #[tokio::test]
  async fn chat_turn_rejects_blank_and_keeps_history_on_failure() {
    let stub = StubGateway::replying(vec![Err(TutorError::TransportError("down".into()))]);
    let state = state_with(&stub);
    assert!(matches!(send_chat_message(&state, vec![], " ").await, Err(TutorError::InvalidInput(_))));
    assert!(stub.requests().is_empty());

    let err = send_chat_message(&state, initial_chat(&state), "hello").await.unwrap_err();
    assert!(matches!(err, TutorError::TransportError(_)));
  }

  #[test]
  fn score_two_question_scenario() {
    let stub = StubGateway::replying(vec![]);
    let state = state_with(&stub);
    let q = |answer| QuizQuestion {
      question: "q".into(),
      options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
      answer,
      explanation: String::new(),
    };
    let questions = vec![q(0), q(0)];
    let attempt = QuizAttempt { selections: vec![Some(0), Some(1)] };
    let topics = vec!["Life in the past (Used to/Wish)".to_string()];

    let p = score_quiz(&state, &topics, &questions, &attempt);
    assert_eq!((p.score, p.total_questions), (1, 2));
    assert_eq!(p.unit, Some(4));
    assert_eq!(p.title, "Life in the past (Used to/Wish)");
  }

  #[test]
  fn mixed_topics_have_no_single_unit() {
    let stub = StubGateway::replying(vec![]);
    let state = state_with(&stub);
    let topics = vec!["City Life (Phrasal verbs)".to_string(), "Shopping (Relative Clauses)".to_string()];
    let p = score_quiz(&state, &topics, &[], &QuizAttempt::default());
    assert_eq!(p.unit, None);
    assert_eq!(p.score, 0);
    assert_eq!(p.title, "City Life (Phrasal verbs), Shopping (Relative Clauses)");
  }
}
