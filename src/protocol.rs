//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, GrammarError, ImageInput, QuizQuestion, StudyProgress, Topic};
use crate::error::{Result, TutorError};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListTopics,
    GrammarCheck {
        #[serde(default)]
        text: String,
        /// Browser data URL (`data:image/...;base64,...`).
        #[serde(default)]
        image: Option<String>,
    },
    GenerateQuiz {
        topics: Vec<String>,
    },
    SelectAnswer {
        question: usize,
        option: usize,
    },
    SubmitQuiz,
    ChatMessage {
        text: String,
    },
    ChatReset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Topics {
        topics: Vec<Topic>,
    },
    GrammarResult {
        errors: Vec<GrammarError>,
    },
    Quiz {
        questions: Vec<QuizQuestion>,
    },
    AnswerRecorded {
        question: usize,
        option: usize,
        answered: usize,
    },
    QuizResult {
        progress: StudyProgress,
    },
    ChatReply {
        message: ChatMessage,
    },
    ChatHistory {
        messages: Vec<ChatMessage>,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl From<TutorError> for ServerWsMessage {
    fn from(e: TutorError) -> Self {
        ServerWsMessage::Error { kind: e.kind().to_string(), message: e.to_string() }
    }
}

/// Decode an optional data-URL image; blank strings count as "no image".
pub fn decode_image(image: Option<&str>) -> Result<Option<ImageInput>> {
    match image.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => ImageInput::from_data_url(url).map(Some),
        None => Ok(None),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Deserialize)]
pub struct GrammarIn {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}
#[derive(Serialize)]
pub struct GrammarOut {
    pub errors: Vec<GrammarError>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct QuizIn {
    pub topics: Vec<String>,
}
#[derive(Serialize)]
pub struct QuizOut {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
pub struct ScoreIn {
    #[serde(default)]
    pub topics: Vec<String>,
    pub questions: Vec<QuizQuestion>,
    /// One slot per question; `null` = unanswered.
    pub answers: Vec<Option<usize>>,
}

#[derive(Deserialize)]
pub struct TutorIn {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub text: String,
}
#[derive(Serialize)]
pub struct TutorOut {
    pub history: Vec<ChatMessage>,
    pub reply: ChatMessage,
}

#[derive(Serialize)]
pub struct GreetingOut {
    pub message: ChatMessage,
}

#[derive(Serialize)]
pub struct TopicsOut {
    pub topics: Vec<Topic>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_answer","question":1,"option":2}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectAnswer { question: 1, option: 2 }));

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"grammar_check","text":"He go"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::GrammarCheck { image: None, .. }));
    }

    #[test]
    fn errors_serialize_with_kind() {
        let msg = ServerWsMessage::from(TutorError::ModelRefusal("blocked".into()));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["kind"], "model_refusal");
    }

    #[test]
    fn blank_image_is_none() {
        assert!(decode_image(None).unwrap().is_none());
        assert!(decode_image(Some("  ")).unwrap().is_none());
        assert!(decode_image(Some("nope")).is_err());
    }
}
