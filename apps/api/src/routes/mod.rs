pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers as sessions;
use crate::quiz::handlers as quiz;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Learning-plan sessions
        .route("/api/v1/sessions", post(sessions::handle_start_session))
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        .route(
            "/api/v1/sessions/:id/advance",
            post(sessions::handle_advance_session),
        )
        .route("/api/v1/chat/:id", post(sessions::handle_chat_turn))
        // Quizzes and progress
        .route("/api/v1/quiz", post(quiz::handle_get_quiz))
        .route("/api/v1/quiz/submit", post(quiz::handle_submit_quiz))
        .route("/api/v1/xp/:user_id", get(quiz::handle_get_progress))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::engine::Orchestrator;
    use crate::pipeline::graph::GraphShape;
    use crate::pipeline::nodes::{NodeSettings, Nodes};
    use crate::pipeline::ports::Step;
    use crate::pipeline::testing::{
        InMemoryProgressStore, InMemorySessionStore, ScriptedPort, StaticSource,
    };
    use crate::quiz::bank::QuizBank;
    use crate::quiz::QuizService;

    const BANK: &str = r#"[{
        "skill": "cloud",
        "module_title": "IAM",
        "quiz": [{"question": "IAM manages?", "options": ["Identities", "Invoices"], "correct_answer": "Identities"}]
    }]"#;

    fn app() -> Router {
        let port = Arc::new(
            ScriptedPort::new()
                .respond(
                    Step::ResumeExtraction,
                    json!({
                        "skills": ["python"],
                        "encouragement_message": "Nice resume!",
                        "ask_goal_message": "What next?"
                    }),
                )
                .respond(
                    Step::IntentClassification,
                    json!({"intent": "fallback_node", "raw_intent": "greet"}),
                )
                .respond(
                    Step::Explanation,
                    json!({"simplified_text": "IAM controls who can do what.", "focus_topics": ["identities"]}),
                ),
        );
        let sessions = Arc::new(InMemorySessionStore::new());
        let nodes = Nodes::new(
            port.clone(),
            Arc::new(StaticSource::empty()),
            NodeSettings::default(),
        );
        let quiz = QuizService::new(
            QuizBank::from_json(BANK).unwrap(),
            port,
            Arc::new(InMemoryProgressStore::new()),
            Duration::from_secs(5),
        );

        build_router(AppState {
            linear: Arc::new(Orchestrator::new(GraphShape::Linear, nodes.clone(), sessions.clone())),
            chat: Arc::new(Orchestrator::new(GraphShape::IntentRouted, nodes, sessions)),
            quiz: Arc::new(quiz),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_start_session_suspends_for_goal() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({"resume_text": "Jane, Python developer"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suspended"], true);
        assert_eq!(body["at"], "wait_goal");
        assert_eq!(body["response"], "Nice resume!\n\nWhat next?");
        assert_eq!(body["state"]["expected_input_field"], "goal_skills");

        let id = body["session_id"].as_str().unwrap().to_string();
        let (status, record) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["cursor"], "wait_goal");
        assert_eq!(record["shape"], "linear");
    }

    #[tokio::test]
    async fn test_empty_resume_is_rejected() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/sessions",
            Some(json!({"resume_text": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (status, body) = send(
            &app(),
            "POST",
            "/api/v1/sessions/nope/advance",
            Some(json!({"user_input": "cloud"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "INVALID_SESSION");
    }

    #[tokio::test]
    async fn test_chat_opens_on_first_message() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/chat/c1", Some(json!({"user_input": "Hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["raw_intent"], "greet");
        assert!(body["response"].as_str().unwrap().starts_with("Hi!"));

        let (_, body) = send(&app, "POST", "/api/v1/chat/c1", Some(json!({"user_input": "Hello again"}))).await;
        assert_eq!(body["state"]["chat_transcript"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_quiz_submit_and_progress() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/quiz",
            Some(json!({"user_id": "u1", "current_skill": "Cloud", "module_title": "iam"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let quiz = body["quiz"].clone();
        assert_eq!(quiz.as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/quiz/submit",
            Some(json!({"user_id": "u1", "quiz": quiz, "answers": ["identities"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 1.0);
        assert_eq!(body["xp"], 10);
        assert_eq!(body["badges"], json!(["Quiz Master"]));
        assert!(body.get("explanation").is_none());

        let (status, body) = send(&app, "GET", "/api/v1/xp/u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"xp": 10, "badges": ["Quiz Master"]}));
    }

    #[tokio::test]
    async fn test_quiz_submit_with_mistakes_returns_explanation() {
        let app = app();
        let quiz = json!([{"question": "IAM manages?", "options": ["Identities", "Invoices"], "correct_answer": "Identities"}]);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/quiz/submit",
            Some(json!({
                "user_id": "u2",
                "quiz": quiz,
                "answers": ["Invoices"],
                "module_title": "IAM",
                "scale": 2
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 0.0);
        assert_eq!(body["xp"], 0);
        assert_eq!(body["explanation"]["simplified_text"], "IAM controls who can do what.");
    }
}
