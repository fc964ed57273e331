//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/topics", get(http::http_get_topics))
        .route(
            "/api/v1/grammar",
            post(http::http_post_grammar).layer(DefaultBodyLimit::max(http::GRAMMAR_BODY_LIMIT)),
        )
        .route("/api/v1/quiz", post(http::http_post_quiz))
        .route("/api/v1/quiz/score", post(http::http_post_quiz_score))
        .route("/api/v1/tutor/greeting", get(http::http_get_greeting))
        .route("/api/v1/tutor/message", post(http::http_post_tutor_message))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AgentConfig;
    use crate::error::TutorError;
    use crate::testing::StubGateway;

    fn app(replies: Vec<Result<String, TutorError>>) -> (Router, Arc<StubGateway>) {
        let stub = StubGateway::replying(replies);
        let state = Arc::new(AppState::with_gateway(stub.clone(), AgentConfig::default()));
        (build_router(state), stub)
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, v)
    }

    #[tokio::test]
    async fn health_and_topics() {
        let (router, _) = app(vec![]);
        let (status, v) = call(router.clone(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ok"], true);

        let (status, v) = call(router, "GET", "/api/v1/topics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["topics"].as_array().map(|a| a.len()), Some(8));
    }

    #[tokio::test]
    async fn grammar_endpoint_returns_errors() {
        let reply = r#"{"errors":[{"error":"She don't like","correction":"She doesn't like","explanation":"Ngôi thứ ba số ít","unit":1}]}"#;
        let (router, stub) = app(vec![Ok(reply.into())]);
        let (status, v) = call(
            router,
            "POST",
            "/api/v1/grammar",
            Some(json!({ "text": "She don't like it", "image": "data:image/png;base64,iVBORw0KGgo=" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["count"], 1);
        assert_eq!(v["errors"][0]["unit"], 1);
        assert_eq!(stub.requests()[0].image.as_ref().map(|i| i.mime_type.as_str()), Some("image/png"));
    }

    #[tokio::test]
    async fn grammar_endpoint_rejects_empty_input() {
        let (router, stub) = app(vec![]);
        let (status, v) = call(router, "POST", "/api/v1/grammar", Some(json!({ "text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "invalid_input");
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn grammar_endpoint_accepts_full_size_photos() {
        let (router, stub) = app(vec![Ok(r#"{"errors":[]}"#.into())]);
        // 3 MiB of zero bytes, base64-encoded: well above axum's 2 MB default.
        let photo = format!("data:image/jpeg;base64,{}", "A".repeat(4 * 1024 * 1024));
        let (status, v) = call(router, "POST", "/api/v1/grammar", Some(json!({ "text": "", "image": photo }))).await;
        assert_eq!(status, StatusCode::OK, "{v}");
        assert_eq!(v["count"], 0);
        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].image.as_ref().map(|i| i.bytes.len()), Some(3 * 1024 * 1024));
    }

    #[tokio::test]
    async fn oversized_or_broken_bodies_are_invalid_input() {
        let (router, stub) = app(vec![]);
        let huge = format!("data:image/jpeg;base64,{}", "A".repeat(http::GRAMMAR_BODY_LIMIT + 1024));
        let (status, v) = call(router.clone(), "POST", "/api/v1/grammar", Some(json!({ "image": huge }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "invalid_input");

        let (status, v) = call(router, "POST", "/api/v1/quiz", Some(json!({ "topics": "not a list" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "invalid_input");
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn quiz_endpoint_maps_malformed_reply_to_bad_gateway() {
        let reply = r#"{"questions":[{"question":"q","options":["A","B","C","D"],"answer":4,"explanation":"e"}]}"#;
        let (router, _) = app(vec![Ok(reply.into())]);
        let (status, v) = call(router, "POST", "/api/v1/quiz", Some(json!({ "topics": ["City Life (Phrasal verbs)"] }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(v["error"], "malformed_response");
    }

    #[tokio::test]
    async fn quiz_score_endpoint() {
        let (router, _) = app(vec![]);
        let q = json!({ "question": "q", "options": ["A", "B", "C", "D"], "answer": 0, "explanation": "e" });
        let (status, v) = call(
            router,
            "POST",
            "/api/v1/quiz/score",
            Some(json!({ "topics": ["Our heritage (Passive voice)"], "questions": [q, q], "answers": [0, 1] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["score"], 1);
        assert_eq!(v["totalQuestions"], 2);
        assert_eq!(v["unit"], 5);
    }

    #[tokio::test]
    async fn quiz_score_rejects_answer_key_outside_options() {
        let (router, _) = app(vec![]);
        let bad = json!({ "question": "q", "options": ["A", "B", "C", "D"], "answer": 9, "explanation": "e" });
        let (status, v) = call(
            router,
            "POST",
            "/api/v1/quiz/score",
            Some(json!({ "questions": [bad], "answers": [0] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "invalid_input");
        assert!(v["message"].as_str().unwrap_or_default().contains("answer 9"));
    }

    #[tokio::test]
    async fn tutor_endpoint_and_auth_failure() {
        let (router, _) = app(vec![Ok("Chào em, hỏi đi nhé!".into()), Err(TutorError::AuthError("no key".into()))]);
        let (status, v) = call(router.clone(), "POST", "/api/v1/tutor/message", Some(json!({ "history": [], "text": "Hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["reply"]["role"], "assistant");
        assert_eq!(v["history"].as_array().map(|a| a.len()), Some(2));

        let (status, v) = call(router, "POST", "/api/v1/tutor/message", Some(json!({ "text": "Hi again" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["error"], "auth_error");
    }
}
