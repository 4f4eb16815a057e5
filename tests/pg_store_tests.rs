// tests/pg_store_tests.rs
//
// Runs against the database in DATABASE_URL and is skipped when it is unset.

use std::sync::Arc;

use chrono::Utc;
use exam_portal::{
    models::{attempt::AttemptOutcome, user::NewUser},
    session::{SessionEvent, SessionRegistry},
    store::{ExamStore, PgStore, StoreError},
};
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

async fn connect() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store tests");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(pool)
}

/// Inserts an exam with questions worth 1 and 3 points (correct answers 0
/// and 2), returning the exam id and the question ids in display order.
async fn seed_exam(pool: &PgPool) -> (Uuid, Vec<Uuid>) {
    let exam_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO exams (id, title, description, duration_minutes, passing_score, is_active) \
         VALUES ($1, $2, '', 60, 50, TRUE)",
    )
    .bind(exam_id)
    .bind(format!("pg_exam_{}", &exam_id.simple().to_string()[..8]))
    .execute(pool)
    .await
    .unwrap();

    let mut ids = Vec::new();
    for (order_index, (correct_answer, points)) in [(0, 1), (2, 3)].into_iter().enumerate() {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO questions (id, exam_id, question_text, options, correct_answer, points, order_index) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(exam_id)
        .bind(format!("Question {}", order_index + 1))
        .bind(Json(vec!["A".to_string(), "B".to_string(), "C".to_string()]))
        .bind(correct_answer)
        .bind(points)
        .bind(order_index as i32)
        .execute(pool)
        .await
        .unwrap();
        ids.push(id);
    }

    (exam_id, ids)
}

async fn create_user(store: &PgStore) -> Uuid {
    let username = format!("pg_{}", &Uuid::new_v4().simple().to_string()[..12]);
    store
        .create_user(NewUser {
            username,
            password: None,
            full_name: "Postgres Tester".to_string(),
            is_guest: true,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_session_flow_on_postgres() {
    let Some(pool) = connect().await else {
        return;
    };
    let store = PgStore::new(pool.clone());
    let (exam_id, question_ids) = seed_exam(&pool).await;
    let user_id = create_user(&store).await;

    let registry = SessionRegistry::new(Arc::new(store.clone()));
    let started = registry.start(user_id, exam_id, true).await.unwrap();
    let attempt_id = started.session.snapshot.attempt_id;
    assert_eq!(started.questions.len(), 2);

    registry
        .apply(
            user_id,
            attempt_id,
            SessionEvent::Select {
                question_id: question_ids[1],
                option: 2,
            },
        )
        .await
        .unwrap();

    let outcome = registry.submit(user_id, attempt_id).await.unwrap();
    assert!(outcome.saved);
    assert_eq!(outcome.result.score, 3);
    assert_eq!(registry.live_count().await, 0);

    let attempt = store.fetch_attempt(attempt_id).await.unwrap().unwrap();
    assert_eq!(attempt.total_points, 4);
    assert_eq!(attempt.score, Some(3));
    assert_eq!(attempt.percentage, Some(75.0));
    assert_eq!(attempt.passed, Some(true));
    assert!(attempt.video_monitoring_enabled);

    let answers = store.fetch_graded_answers(attempt_id).await.unwrap();
    assert_eq!(answers.len(), 2);
    let unanswered = answers
        .iter()
        .find(|a| a.question_id == question_ids[0])
        .unwrap();
    assert_eq!(unanswered.selected_answer, None);
    assert!(!unanswered.is_correct);

    let recent = store.fetch_recent_attempts(user_id, 5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, attempt_id);
}

#[tokio::test]
async fn test_attempt_closes_once_on_postgres() {
    let Some(pool) = connect().await else {
        return;
    };
    let store = PgStore::new(pool.clone());
    let (exam_id, question_ids) = seed_exam(&pool).await;
    let user_id = create_user(&store).await;

    let attempt = store
        .create_attempt(exam_portal::models::attempt::NewAttempt {
            user_id,
            exam_id,
            total_points: 4,
            video_monitoring_enabled: false,
        })
        .await
        .unwrap();

    let answers = vec![
        exam_portal::session::GradedAnswer {
            question_id: question_ids[0],
            selected_answer: Some(0),
            is_correct: true,
        },
        exam_portal::session::GradedAnswer {
            question_id: question_ids[1],
            selected_answer: Some(1),
            is_correct: false,
        },
    ];
    store.insert_graded_answers(attempt.id, &answers).await.unwrap();
    store.insert_graded_answers(attempt.id, &answers).await.unwrap();
    assert_eq!(store.fetch_graded_answers(attempt.id).await.unwrap().len(), 2);

    let first = AttemptOutcome {
        score: 1,
        percentage: 25.0,
        passed: false,
        completed_at: Utc::now(),
    };
    store.close_attempt(attempt.id, &first).await.unwrap();

    let second = AttemptOutcome {
        score: 4,
        percentage: 100.0,
        passed: true,
        completed_at: Utc::now(),
    };
    store.close_attempt(attempt.id, &second).await.unwrap();

    let stored = store.fetch_attempt(attempt.id).await.unwrap().unwrap();
    assert_eq!(stored.score, Some(1));
    assert_eq!(stored.passed, Some(false));

    let err = store.close_attempt(Uuid::new_v4(), &first).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_lookups_on_postgres() {
    let Some(pool) = connect().await else {
        return;
    };
    let store = PgStore::new(pool.clone());
    let (_, question_ids) = seed_exam(&pool).await;

    let reversed: Vec<Uuid> = question_ids.iter().rev().copied().collect();
    let questions = store.fetch_questions_by_ids(&reversed).await.unwrap();
    let order: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    assert_eq!(order, question_ids);
    assert!(store.fetch_questions_by_ids(&[]).await.unwrap().is_empty());

    let username = format!("pg_dup_{}", &Uuid::new_v4().simple().to_string()[..8]);
    let new_user = || NewUser {
        username: username.clone(),
        password: Some("hash".to_string()),
        full_name: "Duplicate".to_string(),
        is_guest: false,
    };
    store.create_user(new_user()).await.unwrap();
    let err = store.create_user(new_user()).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername(name) if name == username));

    let found = store.find_user_by_username(&username).await.unwrap();
    assert!(found.is_some_and(|u| u.password.is_some()));
}
