// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerRecord, Attempt, AttemptOutcome, NewAttempt},
        exam::Exam,
        question::Question,
        user::{NewUser, User},
    },
    session::scoring::GradedAnswer,
    store::{ExamStore, StoreError},
};

const EXAM_COLUMNS: &str =
    "id, title, description, duration_minutes, passing_score, is_active, created_at";

const QUESTION_COLUMNS: &str =
    "id, exam_id, question_text, options, correct_answer, points, order_index";

const ATTEMPT_COLUMNS: &str = "id, user_id, exam_id, started_at, completed_at, total_points, \
     score, percentage, passed, video_monitoring_enabled";

const USER_COLUMNS: &str = "id, username, password, full_name, is_guest, created_at";

/// Store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn fetch_active_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE is_active = TRUE ORDER BY created_at DESC"
        );
        let exams = sqlx::query_as::<_, Exam>(&sql).fetch_all(&self.pool).await?;
        Ok(exams)
    }

    async fn fetch_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, StoreError> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1");
        let exam = sqlx::query_as::<_, Exam>(&sql)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exam)
    }

    async fn fetch_questions(&self, exam_id: Uuid) -> Result<Vec<Question>, StoreError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY order_index"
        );
        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(questions)
    }

    async fn fetch_questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Dynamic IN clause
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN ("
        ));
        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY order_index");

        let questions = query_builder
            .build_query_as::<Question>()
            .fetch_all(&self.pool)
            .await?;
        Ok(questions)
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError> {
        let sql = format!(
            "INSERT INTO exam_attempts (user_id, exam_id, total_points, video_monitoring_enabled) \
             VALUES ($1, $2, $3, $4) RETURNING {ATTEMPT_COLUMNS}"
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(new.user_id)
            .bind(new.exam_id)
            .bind(new.total_points)
            .bind(new.video_monitoring_enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create attempt: {:?}", e);
                StoreError::from(e)
            })?;
        Ok(attempt)
    }

    async fn insert_graded_answers(
        &self,
        attempt_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), StoreError> {
        if answers.is_empty() {
            return Ok(());
        }

        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO exam_answers (attempt_id, question_id, selected_answer, is_correct) ",
        );
        query_builder.push_values(answers, |mut row, answer| {
            row.push_bind(attempt_id)
                .push_bind(answer.question_id)
                .push_bind(answer.selected_answer)
                .push_bind(answer.is_correct);
        });
        query_builder.push(" ON CONFLICT (attempt_id, question_id) DO NOTHING");

        query_builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert graded answers: {:?}", e);
                StoreError::from(e)
            })?;
        Ok(())
    }

    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: &AttemptOutcome,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE exam_attempts \
             SET completed_at = $1, score = $2, percentage = $3, passed = $4 \
             WHERE id = $5 AND completed_at IS NULL",
        )
        .bind(outcome.completed_at)
        .bind(outcome.score)
        .bind(outcome.percentage)
        .bind(outcome.passed)
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to close attempt: {:?}", e);
            StoreError::from(e)
        })?;

        // Nothing updated: either the attempt is missing or it was closed before.
        if result.rows_affected() == 0 && self.fetch_attempt(attempt_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "attempt",
                id: attempt_id,
            });
        }
        Ok(())
    }

    async fn fetch_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>, StoreError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE id = $1");
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn fetch_graded_answers(
        &self,
        attempt_id: Uuid,
    ) -> Result<Vec<AnswerRecord>, StoreError> {
        let answers = sqlx::query_as::<_, AnswerRecord>(
            "SELECT id, attempt_id, question_id, selected_answer, is_correct, answered_at \
             FROM exam_answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn fetch_recent_attempts(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE user_id = $1 \
             ORDER BY started_at DESC LIMIT $2"
        );
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(attempts)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, password, full_name, is_guest) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.password)
            .bind(&new.full_name)
            .bind(new.is_guest)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let unique_violation = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if unique_violation {
                    StoreError::DuplicateUsername(new.username.clone())
                } else {
                    tracing::error!("Failed to create user: {:?}", e);
                    StoreError::from(e)
                }
            })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
