//! Configuration: prompts + topic catalog from TOML, gateway settings from env.
//!
//! See `AgentConfig`, `Prompts` and `GatewayConfig` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Topic;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Replaces the built-in catalog when non-empty.
  #[serde(default)]
  pub topics: Vec<Topic>,
}

/// Prompts used by the orchestrators. Defaults target grade-9 learners in
/// Vietnam (Global Success textbook) with explanations in Vietnamese.
/// Any field can be overridden under `[prompts]` in TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Grammar check
  pub grammar_instruction: String,
  pub grammar_text_label: String,
  pub grammar_image_note: String,
  // Quiz generation; `{topics}` and `{count}` are substituted
  pub quiz_template: String,
  // Chat tutor
  pub tutor_system: String,
  pub tutor_greeting: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grammar_instruction: "Bạn là một chuyên gia gia sư tiếng Anh cho học sinh lớp 9 tại Việt Nam, am hiểu chương trình Global Success.\n\
Hãy phân tích văn bản hoặc hình ảnh bài tập tiếng Anh được cung cấp.\n\
1. Tìm các lỗi ngữ pháp (thì, câu bị động, câu điều kiện, mệnh đề quan hệ, v.v.).\n\
2. Giải thích lỗi sai bằng tiếng Việt dựa trên chương trình lớp 9.\n\
3. Đề xuất cách sửa.\n\
4. Gắn mỗi lỗi với số Unit tương ứng trong SGK lớp 9 (số nguyên từ 1 đến 12).\n\
Trả về JSON dạng {\"errors\": [{\"error\": \"câu gốc sai\", \"correction\": \"câu đúng\", \"explanation\": \"giải thích bằng tiếng Việt\", \"unit\": 1}]}.\n\
Nếu không có lỗi nào, trả về {\"errors\": []}.".into(),
      grammar_text_label: "Văn bản cần kiểm tra:".into(),
      grammar_image_note: "Hình ảnh bài tập được đính kèm; hãy đọc và kiểm tra nội dung trong ảnh.".into(),
      quiz_template: "Dựa trên các chủ điểm kiến thức: {topics}, hãy tạo đúng {count} câu hỏi trắc nghiệm tiếng Anh lớp 9 (trình độ ôn thi vào 10).\n\
Mỗi câu có đúng 4 phương án trong \"options\" (\"A. ...\", \"B. ...\", \"C. ...\", \"D. ...\").\n\
\"answer\" là chỉ số của đáp án đúng, bắt đầu từ 0 (0-3).\n\
\"explanation\" giải thích chi tiết bằng tiếng Việt tại sao chọn đáp án đó.\n\
Trả về JSON dạng {\"questions\": [{\"question\": \"...\", \"options\": [\"A. ...\", \"B. ...\", \"C. ...\", \"D. ...\"], \"answer\": 0, \"explanation\": \"...\"}]}.".into(),
      tutor_system: "Bạn là gia sư tiếng Anh chuyên nghiệp, nhiệt tình, dành cho học sinh lớp 9 tại Việt Nam.\n\
Sử dụng chương trình Global Success. Giải thích dễ hiểu bằng tiếng Việt, dùng ngôn ngữ của học sinh.\n\
Khuyến khích học sinh tự tìm câu trả lời bằng cách đưa gợi ý trước khi giải bài.".into(),
      tutor_greeting: "Chào em! Anh là gia sư AI E-Tutor. Hôm nay em cần hỗ trợ gì về ngữ pháp hay từ vựng lớp 9 nào?".into(),
    }
  }
}

/// Built-in practice topics (unit number + focus).
pub fn default_topics() -> Vec<Topic> {
  [
    (1, "Local Community (Adjective comparison)"),
    (2, "City Life (Phrasal verbs)"),
    (3, "Teenagers (Reported speech)"),
    (4, "Life in the past (Used to/Wish)"),
    (5, "Our heritage (Passive voice)"),
    (6, "Lifestyles (Gerund vs Infinitive)"),
    (7, "Environment (Conditional Type 1 & 2)"),
    (8, "Shopping (Relative Clauses)"),
  ]
  .into_iter()
  .map(|(unit, title)| Topic { unit, title: title.to_string() })
  .collect()
}

/// Everything the Gemini client needs. Built once at startup and handed to
/// the client explicitly.
#[derive(Clone)]
pub struct GatewayConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GatewayConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GatewayConfig")
      .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl GatewayConfig {
  /// Read from env. A missing key is not an error here; the first model call
  /// fails with `AuthError` instead.
  pub fn from_env() -> Self {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .unwrap_or_default();
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let timeout = std::env::var("GEMINI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs);

    Self { api_key: api_key.trim().to_string(), base_url, model, timeout }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "etutor_backend", %path, topics = cfg.topics.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "etutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "etutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_prompt_override_keeps_defaults() {
    let cfg = parse_agent_config(
      r#"
        [prompts]
        tutor_greeting = "Hello!"

        [[topics]]
        unit = 9
        title = "Natural wonders (Relative clauses)"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.tutor_greeting, "Hello!");
    assert_eq!(cfg.prompts.quiz_template, Prompts::default().quiz_template);
    assert_eq!(cfg.topics, vec![Topic { unit: 9, title: "Natural wonders (Relative clauses)".into() }]);
  }

  #[test]
  fn empty_config_is_default() {
    let cfg = parse_agent_config("").unwrap();
    assert!(cfg.topics.is_empty());
    assert!(cfg.prompts.quiz_template.contains("{topics}"));
  }

  #[test]
  fn default_topics_are_in_curriculum() {
    let topics = default_topics();
    assert_eq!(topics.len(), 8);
    assert!(topics.iter().all(|t| (1..=12).contains(&t.unit)));
  }

  #[test]
  fn debug_never_prints_key() {
    let cfg = GatewayConfig {
      api_key: "secret-key".into(),
      base_url: DEFAULT_BASE_URL.into(),
      model: DEFAULT_MODEL.into(),
      timeout: None,
    };
    let s = format!("{:?}", cfg);
    assert!(!s.contains("secret-key"));
    assert!(s.contains("<redacted>"));
  }
}
