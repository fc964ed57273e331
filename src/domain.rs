//! Domain models: chat messages, grammar errors, quiz questions/attempts,
//! progress records, inline images, and the quiz topic catalog.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Valid curriculum units (grade-9 textbook chapters).
pub const UNIT_MIN: i64 = 1;
pub const UNIT_MAX: i64 = 12;

/// Who said it?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: Role,
  pub text: String,
}

impl ChatMessage {
  pub fn user(text: impl Into<String>) -> Self {
    Self { role: Role::User, text: text.into() }
  }
  pub fn assistant(text: impl Into<String>) -> Self {
    Self { role: Role::Assistant, text: text.into() }
  }
}

/// One grammar mistake found by the model, tagged with a curriculum unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrammarError {
  pub error: String,
  pub correction: String,
  pub explanation: String,
  pub unit: i64,
}

impl GrammarError {
  /// False when the model tagged a unit outside 1..=12 (data-quality warning only).
  pub fn in_curriculum(&self) -> bool {
    (UNIT_MIN..=UNIT_MAX).contains(&self.unit)
  }
}

/// Multiple-choice question. `answer` always indexes into `options`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  pub answer: usize,
  pub explanation: String,
}

impl QuizQuestion {
  pub fn is_correct(&self, selected: usize) -> bool {
    selected == self.answer
  }

  pub fn answer_in_bounds(&self) -> bool {
    self.answer < self.options.len()
  }
}

/// The learner's selections for one quiz, aligned by question position.
/// `None` slots are unanswered.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizAttempt {
  pub selections: Vec<Option<usize>>,
}

impl QuizAttempt {
  pub fn new(question_count: usize) -> Self {
    Self { selections: vec![None; question_count] }
  }

  /// Record `option` for question `index`. Re-selecting overwrites the slot.
  pub fn select(&mut self, questions: &[QuizQuestion], index: usize, option: usize) -> Result<()> {
    let q = questions
      .get(index)
      .ok_or_else(|| TutorError::invalid_input(format!("question {index} does not exist ({} questions)", questions.len())))?;
    if option >= q.options.len() {
      return Err(TutorError::invalid_input(format!(
        "option {option} out of range for question {index} ({} options)",
        q.options.len()
      )));
    }
    if self.selections.len() < questions.len() {
      self.selections.resize(questions.len(), None);
    }
    self.selections[index] = Some(option);
    Ok(())
  }

  pub fn answered(&self) -> usize {
    self.selections.iter().filter(|s| s.is_some()).count()
  }

  /// Number of slots whose selection equals the question's answer.
  pub fn score(&self, questions: &[QuizQuestion]) -> usize {
    questions
      .iter()
      .zip(self.selections.iter())
      .filter(|(q, sel)| matches!(sel, Some(s) if q.is_correct(*s)))
      .count()
  }
}

/// Session-only progress record produced when a quiz is scored.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyProgress {
  pub unit: Option<i64>,
  pub title: String,
  pub score: usize,
  pub total_questions: usize,
  pub last_attempt: DateTime<Utc>,
}

/// Practice topic offered by the quiz generator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
  pub unit: i64,
  pub title: String,
}

/// Inline image attached to a grammar check.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageInput {
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageInput {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageInput")
      .field("mime_type", &self.mime_type)
      .field("bytes", &self.bytes.len())
      .finish()
  }
}

impl ImageInput {
  /// Build from raw base64 + MIME type.
  pub fn from_base64(mime_type: &str, data: &str) -> Result<Self> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if !mime_type.starts_with("image/") {
      return Err(TutorError::invalid_input(format!("unsupported image type '{mime_type}'")));
    }
    let bytes = B64
      .decode(data.trim())
      .map_err(|e| TutorError::invalid_input(format!("image is not valid base64: {e}")))?;
    if bytes.is_empty() {
      return Err(TutorError::invalid_input("image payload is empty"));
    }
    Ok(Self { mime_type, bytes })
  }

  /// Build from a browser data URL: `data:image/png;base64,iVBOR...`.
  pub fn from_data_url(url: &str) -> Result<Self> {
    let rest = url
      .trim()
      .strip_prefix("data:")
      .ok_or_else(|| TutorError::invalid_input("image must be a data URL"))?;
    let (meta, payload) = rest
      .split_once(',')
      .ok_or_else(|| TutorError::invalid_input("data URL has no payload"))?;
    let params = meta
      .strip_suffix(";base64")
      .ok_or_else(|| TutorError::invalid_input("data URL must be base64-encoded"))?;
    // Drop parameters such as `;name=photo.png`; only the bare type is sent upstream.
    let mime = params.split(';').next().unwrap_or_default().trim();
    Self::from_base64(mime, payload)
  }

  pub fn to_base64(&self) -> String {
    B64.encode(&self.bytes)
  }
}
