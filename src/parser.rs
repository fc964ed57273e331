//! Strict parsing of raw model replies into domain types.
//!
//! Model output is untrusted: required fields and types are checked by serde
//! against private wire structs before any domain value is built. Unknown
//! fields are ignored; anything missing or mistyped fails the whole call.

use serde::Deserialize;
use tracing::warn;

use crate::domain::{GrammarError, QuizQuestion, UNIT_MAX, UNIT_MIN};
use crate::error::{Result, TutorError};
use crate::util::trunc_for_log;

#[derive(Deserialize)]
struct GrammarReply {
  errors: Vec<GrammarItem>,
}

#[derive(Deserialize)]
struct GrammarItem {
  error: String,
  correction: String,
  explanation: String,
  unit: i64,
}

#[derive(Deserialize)]
struct QuizReply {
  questions: Vec<QuizItem>,
}

#[derive(Deserialize)]
struct QuizItem {
  question: String,
  options: Vec<String>,
  answer: i64,
  explanation: String,
}

fn decode<'a, T: Deserialize<'a>>(raw: &'a str, what: &str) -> Result<T> {
  serde_json::from_str::<T>(raw).map_err(|e| {
    warn!(target: "etutor_backend", what, error = %e, raw = %trunc_for_log(raw, 200), "Model reply failed schema check");
    TutorError::malformed(format!("{what} reply: {e}"))
  })
}

/// `{ "errors": [...] }` → grammar errors. An empty list means "no errors".
pub fn parse_grammar_response(raw: &str) -> Result<Vec<GrammarError>> {
  let reply: GrammarReply = decode(raw, "grammar")?;
  let errors: Vec<GrammarError> = reply
    .errors
    .into_iter()
    .map(|it| GrammarError {
      error: it.error,
      correction: it.correction,
      explanation: it.explanation,
      unit: it.unit,
    })
    .collect();

  for (idx, e) in errors.iter().enumerate().filter(|(_, e)| !e.in_curriculum()) {
    warn!(target: "grammar", idx, unit = e.unit, min = UNIT_MIN, max = UNIT_MAX, "Grammar error tagged with unit outside curriculum");
  }
  Ok(errors)
}

/// `{ "questions": [...] }` → quiz questions. Each `answer` must index into
/// its `options`; violations are rejected, never clamped.
pub fn parse_quiz_response(raw: &str) -> Result<Vec<QuizQuestion>> {
  let reply: QuizReply = decode(raw, "quiz")?;
  reply
    .questions
    .into_iter()
    .enumerate()
    .map(|(idx, it)| {
      let n = it.options.len();
      let answer = usize::try_from(it.answer)
        .ok()
        .filter(|a| *a < n)
        .ok_or_else(|| TutorError::malformed(format!("question {idx}: answer {} out of bounds for {n} options", it.answer)))?;
      if n != 4 {
        warn!(target: "quiz", idx, options = n, "Quiz question does not have 4 options");
      }
      Ok(QuizQuestion { question: it.question, options: it.options, answer, explanation: it.explanation })
    })
    .collect()
}
