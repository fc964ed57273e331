//! Prompt construction for the grammar checker and quiz generator.
//! Pure functions of their input: no clock, no randomness.

use crate::config::Prompts;
use crate::error::{Result, TutorError};
use crate::util::fill_template;

/// Number of questions requested per generated quiz.
pub const QUIZ_QUESTION_COUNT: usize = 5;

/// Grading instruction followed by the learner's text (if any) and a note
/// about the attached image (if any).
pub fn build_grammar_prompt(prompts: &Prompts, text: &str, has_image: bool) -> String {
  let mut out = prompts.grammar_instruction.trim_end().to_string();
  if !text.trim().is_empty() {
    out.push_str("\n\n");
    out.push_str(&prompts.grammar_text_label);
    out.push('\n');
    out.push_str(text);
  }
  if has_image {
    out.push_str("\n\n");
    out.push_str(&prompts.grammar_image_note);
  }
  out
}

/// Quiz instruction for the given topics. Every topic appears verbatim even
/// when a custom template forgot the `{topics}` placeholder.
pub fn build_quiz_prompt(prompts: &Prompts, topics: &[String]) -> Result<String> {
  if topics.is_empty() {
    return Err(TutorError::invalid_input("at least one topic is required"));
  }
  if let Some(pos) = topics.iter().position(|t| t.trim().is_empty()) {
    return Err(TutorError::invalid_input(format!("topic #{} is blank", pos + 1)));
  }

  let joined = topics.join(", ");
  let count = QUIZ_QUESTION_COUNT.to_string();
  let tpl = &prompts.quiz_template;
  let mut out = fill_template(tpl, &[("count", &count)]);
  if tpl.contains("{topics}") {
    out = fill_template(&out, &[("topics", &joined)]);
  } else {
    out.push_str("\n\nTopics: ");
    out.push_str(&joined);
  }
  Ok(out)
}
