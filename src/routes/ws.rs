//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The connection owns the session: chat history and the current quiz live
//! here and are dropped on disconnect. Messages are handled one at a time, so
//! replies arrive in request order.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::domain::{ChatMessage, QuizAttempt, QuizQuestion};
use crate::error::TutorError;
use crate::logic::*;
use crate::protocol::{decode_image, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::util::trunc_for_log;

/// Per-connection state.
pub struct Session {
  pub id: Uuid,
  pub history: Vec<ChatMessage>,
  pub quiz: Option<QuizSession>,
}

/// A generated quiz plus the learner's selections so far.
pub struct QuizSession {
  pub topics: Vec<String>,
  pub questions: Vec<QuizQuestion>,
  pub attempt: QuizAttempt,
}

impl Session {
  pub fn new(state: &AppState) -> Self {
    Self { id: Uuid::new_v4(), history: initial_chat(state), quiz: None }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "etutor_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut session = Session::new(&state);
  info!(target: "etutor_backend", session = %session.id, "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "etutor_backend", session = %session.id, msg = %trunc_for_log(&format!("{:?}", incoming), 200), "WS received");
            handle_client_ws(incoming, &state, &mut session).await
          }
          Err(e) => TutorError::invalid_input(format!("Invalid JSON: {}", e)).into(),
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "kind": "internal", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "etutor_backend", session = %session.id, error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "etutor_backend", session = %session.id, turns = session.history.len(), "WebSocket disconnected");
}

#[instrument(level = "info", skip(msg, state, session), fields(session = %session.id))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &mut Session) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::ListTopics => ServerWsMessage::Topics { topics: state.topics.clone() },

    ClientWsMessage::GrammarCheck { text, image } => {
      let result = match decode_image(image.as_deref()) {
        Ok(img) => check_grammar(state, &text, img).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(errors) => {
          info!(target: "grammar", found = errors.len(), "WS grammar check served");
          ServerWsMessage::GrammarResult { errors }
        }
        Err(e) => e.into(),
      }
    }

    ClientWsMessage::GenerateQuiz { topics } => match generate_quiz(state, &topics).await {
      Ok(questions) => {
        info!(target: "quiz", count = questions.len(), "WS quiz served");
        session.quiz = Some(QuizSession {
          topics,
          attempt: QuizAttempt::new(questions.len()),
          questions: questions.clone(),
        });
        ServerWsMessage::Quiz { questions }
      }
      Err(e) => e.into(),
    },

    ClientWsMessage::SelectAnswer { question, option } => {
      let Some(quiz) = session.quiz.as_mut() else {
        return TutorError::invalid_input("no quiz in progress").into();
      };
      match quiz.attempt.select(&quiz.questions, question, option) {
        Ok(()) => ServerWsMessage::AnswerRecorded { question, option, answered: quiz.attempt.answered() },
        Err(e) => e.into(),
      }
    }

    ClientWsMessage::SubmitQuiz => match session.quiz.take() {
      Some(quiz) => {
        let progress = score_quiz(state, &quiz.topics, &quiz.questions, &quiz.attempt);
        ServerWsMessage::QuizResult { progress }
      }
      None => TutorError::invalid_input("no quiz in progress").into(),
    },

    ClientWsMessage::ChatMessage { text } => {
      match send_chat_message(state, session.history.clone(), &text).await {
        Ok(history) => {
          session.history = history;
          match session.history.last() {
            Some(message) => ServerWsMessage::ChatReply { message: message.clone() },
            None => TutorError::malformed("tutor produced no reply").into(),
          }
        }
        Err(e) => e.into(),
      }
    }

    ClientWsMessage::ChatReset => {
      session.history = initial_chat(state);
      ServerWsMessage::ChatHistory { messages: session.history.clone() }
    }
  }
}
