//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, TutorError};
use crate::gemini::{GenerateRequest, ModelGateway};

/// Gateway that replays canned replies in order and records every request.
#[derive(Default)]
pub struct StubGateway {
  replies: Mutex<VecDeque<Result<String>>>,
  seen: Mutex<Vec<GenerateRequest>>,
}

impl StubGateway {
  pub fn replying(replies: Vec<Result<String>>) -> Arc<Self> {
    Arc::new(Self { replies: Mutex::new(replies.into()), seen: Mutex::default() })
  }

  pub fn requests(&self) -> Vec<GenerateRequest> {
    self.seen.lock().unwrap().clone()
  }
}

#[async_trait]
impl ModelGateway for StubGateway {
  async fn generate(&self, request: GenerateRequest) -> Result<String> {
    self.seen.lock().unwrap().push(request);
    self
      .replies
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(TutorError::TransportError("stub has no reply queued".into())))
  }
}
