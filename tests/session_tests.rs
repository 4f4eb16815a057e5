// tests/session_tests.rs

use std::sync::Arc;

use chrono::Utc;
use exam_portal::{
    config::Config,
    models::{exam::Exam, question::Question},
    routes,
    state::AppState,
    store::MemoryStore,
};
use serde_json::{Value, json};
use sqlx::types::Json;
use uuid::Uuid;

struct TestApp {
    address: String,
    client: reqwest::Client,
    exam_id: Uuid,
    question_ids: Vec<Uuid>,
}

/// Spawns the app over a store holding one exam: 60 minutes, passing score
/// 50%, questions worth 1 and 3 points with correct answers 0 and 2.
async fn spawn_app() -> TestApp {
    let store = MemoryStore::new();
    let exam = Exam {
        id: Uuid::new_v4(),
        title: "Sample".to_string(),
        description: "Two questions".to_string(),
        duration_minutes: 60,
        passing_score: 50,
        is_active: true,
        created_at: Utc::now(),
    };
    let questions: Vec<Question> = [(0, 1), (2, 3)]
        .iter()
        .enumerate()
        .map(|(i, &(correct_answer, points))| Question {
            id: Uuid::new_v4(),
            exam_id: exam.id,
            question_text: format!("Question {}", i + 1),
            options: Json(vec!["A".into(), "B".into(), "C".into()]),
            correct_answer,
            points,
            order_index: i as i32,
        })
        .collect();
    let question_ids = questions.iter().map(|q| q.id).collect();
    store.add_exam(exam.clone(), questions).await;

    let config = Config {
        database_url: String::new(),
        jwt_secret: "session_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    };

    let app = routes::create_router(AppState::new(Arc::new(store), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        exam_id: exam.id,
        question_ids,
    }
}

impl TestApp {
    async fn guest_token(&self) -> String {
        let resp: Value = self
            .client
            .post(&format!("{}/api/auth/guest", self.address))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["token"].as_str().unwrap().to_string()
    }

    /// Starts a session and returns its attempt id and the start payload.
    async fn start(&self, token: &str, monitoring: bool) -> (String, Value) {
        let resp = self
            .client
            .post(&format!("{}/api/exams/{}/sessions", self.address, self.exam_id))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({ "monitoring": monitoring }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);

        let body: Value = resp.json().await.unwrap();
        let id = body["session"]["attempt_id"].as_str().unwrap().to_string();
        (id, body)
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(&format!("{}{}", self.address, path))
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}{}", self.address, path))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap()
    }

    async fn select(&self, token: &str, session: &str, question: Uuid, option: i32) -> reqwest::Response {
        self.put(
            token,
            &format!("/api/sessions/{}/answers", session),
            json!({ "question_id": question, "option": option }),
        )
        .await
    }
}

#[tokio::test]
async fn test_exam_flow_with_partial_answers() {
    // Arrange
    let app = spawn_app().await;
    let token = app.guest_token().await;

    // 1. Start
    let (session, started) = app.start(&token, false).await;
    assert_eq!(started["questions"].as_array().unwrap().len(), 2);
    assert!(started["questions"][0].get("correct_answer").is_none());
    assert_eq!(started["session"]["remaining_seconds"], 3600);
    assert_eq!(started["session"]["status"], "open");

    // 2. Answer: first correct, second wrong
    let resp = app.select(&token, &session, app.question_ids[0], 0).await;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.select(&token, &session, app.question_ids[1], 1).await;
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["answered_count"], 2);

    // 3. Submit
    let resp = app.post(&token, &format!("/api/sessions/{}/submit", session)).await;
    assert_eq!(resp.status().as_u16(), 200);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["saved"], true);
    assert_eq!(outcome["result"]["score"], 1);
    assert_eq!(outcome["result"]["total_points"], 4);
    assert_eq!(outcome["result"]["percentage"], 25.0);
    assert_eq!(outcome["result"]["passed"], false);

    // 4. Second submit is refused
    let resp = app.post(&token, &format!("/api/sessions/{}/submit", session)).await;
    assert_eq!(resp.status().as_u16(), 409);

    // 5. Result view
    let result: Value = app
        .get(&token, &format!("/api/attempts/{}/result", session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["correct_count"], 1);
    assert_eq!(result["total_questions"], 2);
    assert_eq!(result["accuracy"], 50.0);
    assert_eq!(result["percentage"], 25.0);
    assert_eq!(result["questions"][0]["selected_answer"], 0);
    assert_eq!(result["questions"][1]["correct_answer"], 2);
    assert_eq!(result["questions"][1]["is_correct"], false);

    // 6. Dashboard
    let dashboard: Value = app.get(&token, "/api/attempts").await.json().await.unwrap();
    assert_eq!(dashboard["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(dashboard["stats"]["total_attempts"], 1);
    assert_eq!(dashboard["stats"]["average_percentage"], 25.0);
    assert_eq!(dashboard["stats"]["passed_count"], 0);
}

#[tokio::test]
async fn test_all_correct_passes_and_unanswered_is_recorded() {
    let app = spawn_app().await;
    let token = app.guest_token().await;

    let (session, _) = app.start(&token, false).await;
    app.select(&token, &session, app.question_ids[1], 2).await;

    let outcome: Value = app
        .post(&token, &format!("/api/sessions/{}/submit", session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["result"]["score"], 3);
    assert_eq!(outcome["result"]["percentage"], 75.0);
    assert_eq!(outcome["result"]["passed"], true);

    let result: Value = app
        .get(&token, &format!("/api/attempts/{}/result", session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["questions"][0]["selected_answer"], Value::Null);
    assert_eq!(result["questions"][0]["is_correct"], false);
}

#[tokio::test]
async fn test_invalid_selection_is_rejected() {
    let app = spawn_app().await;
    let token = app.guest_token().await;
    let (session, _) = app.start(&token, false).await;

    app.select(&token, &session, app.question_ids[0], 1).await;

    let resp = app.select(&token, &session, app.question_ids[0], 3).await;
    assert_eq!(resp.status().as_u16(), 400);
    let resp = app.select(&token, &session, Uuid::new_v4(), 0).await;
    assert_eq!(resp.status().as_u16(), 400);

    let view: Value = app
        .get(&token, &format!("/api/sessions/{}", session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["answered_count"], 1);
    assert_eq!(view["selections"][app.question_ids[0].to_string()], 1);
}

#[tokio::test]
async fn test_navigation_is_clamped() {
    let app = spawn_app().await;
    let token = app.guest_token().await;
    let (session, _) = app.start(&token, false).await;

    let view: Value = app
        .put(&token, &format!("/api/sessions/{}/position", session), json!({ "index": 99 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["current_index"], 1);
    assert_eq!(view["progress"], 100.0);

    let view: Value = app
        .put(&token, &format!("/api/sessions/{}/position", session), json!({ "index": -4 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["current_index"], 0);
}

#[tokio::test]
async fn test_monitoring_failure_does_not_block() {
    let app = spawn_app().await;
    let token = app.guest_token().await;
    let (session, started) = app.start(&token, true).await;
    assert_eq!(started["session"]["monitoring"], "requested");

    let view: Value = app
        .put(
            &token,
            &format!("/api/sessions/{}/monitoring", session),
            json!({ "report": "unavailable" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["monitoring"], "unavailable");
    assert_eq!(view["status"], "open");

    let resp = app.select(&token, &session, app.question_ids[0], 0).await;
    assert_eq!(resp.status().as_u16(), 200);

    let result_before_submit = app.get(&token, &format!("/api/attempts/{}/result", session)).await;
    assert_eq!(result_before_submit.status().as_u16(), 409);
}

#[tokio::test]
async fn test_monitoring_is_requested_by_default() {
    let app = spawn_app().await;
    let token = app.guest_token().await;

    let started: Value = app
        .client
        .post(&format!("{}/api/exams/{}/sessions", app.address, app.exam_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["session"]["monitoring"], "requested");
}

#[tokio::test]
async fn test_submitted_session_is_released() {
    let app = spawn_app().await;
    let token = app.guest_token().await;
    let (session, _) = app.start(&token, false).await;

    let resp = app.post(&token, &format!("/api/sessions/{}/submit", session)).await;
    assert_eq!(resp.status().as_u16(), 200);

    // The live session is gone; the owner is told the attempt is closed.
    let resp = app.get(&token, &format!("/api/sessions/{}", session)).await;
    assert_eq!(resp.status().as_u16(), 409);
    let resp = app.select(&token, &session, app.question_ids[0], 0).await;
    assert_eq!(resp.status().as_u16(), 409);

    let stranger = app.guest_token().await;
    let resp = app.get(&stranger, &format!("/api/sessions/{}", session)).await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app.get(&token, &format!("/api/attempts/{}/result", session)).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_sessions_are_private_and_can_be_discarded() {
    let app = spawn_app().await;
    let owner = app.guest_token().await;
    let stranger = app.guest_token().await;
    let (session, _) = app.start(&owner, false).await;

    let resp = app.get(&stranger, &format!("/api/sessions/{}", session)).await;
    assert_eq!(resp.status().as_u16(), 404);
    let resp = app.select(&stranger, &session, app.question_ids[0], 0).await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .client
        .delete(&format!("{}/api/sessions/{}", app.address, session))
        .header("Authorization", format!("Bearer {}", owner))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app.get(&owner, &format!("/api/sessions/{}", session)).await;
    assert_eq!(resp.status().as_u16(), 404);
}
