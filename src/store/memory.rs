// src/store/memory.rs

//! In-process store, used to run the service without a database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
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

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    exams: Vec<Exam>,
    questions: Vec<Question>,
    attempts: Vec<Attempt>,
    answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exam together with its questions.
    pub async fn add_exam(&self, exam: Exam, questions: Vec<Question>) {
        let mut tables = self.tables.write().await;
        tables.exams.push(exam);
        tables.questions.extend(questions);
    }
}

fn sorted_by_order(mut questions: Vec<Question>) -> Vec<Question> {
    questions.sort_by_key(|q| q.order_index);
    questions
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn fetch_active_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let tables = self.tables.read().await;
        let mut exams: Vec<Exam> = tables.exams.iter().filter(|e| e.is_active).cloned().collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(exams)
    }

    async fn fetch_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.exams.iter().find(|e| e.id == exam_id).cloned())
    }

    async fn fetch_questions(&self, exam_id: Uuid) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.read().await;
        let questions = tables
            .questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect();
        Ok(sorted_by_order(questions))
    }

    async fn fetch_questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.read().await;
        let questions = tables
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect();
        Ok(sorted_by_order(questions))
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError> {
        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            exam_id: new.exam_id,
            started_at: Utc::now(),
            completed_at: None,
            total_points: new.total_points,
            score: None,
            percentage: None,
            passed: None,
            video_monitoring_enabled: new.video_monitoring_enabled,
        };
        self.tables.write().await.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn insert_graded_answers(
        &self,
        attempt_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.attempts.iter().any(|a| a.id == attempt_id) {
            return Err(StoreError::NotFound {
                entity: "attempt",
                id: attempt_id,
            });
        }

        let now = Utc::now();
        for answer in answers {
            let exists = tables
                .answers
                .iter()
                .any(|r| r.attempt_id == attempt_id && r.question_id == answer.question_id);
            if exists {
                continue;
            }
            tables.answers.push(AnswerRecord {
                id: Uuid::new_v4(),
                attempt_id,
                question_id: answer.question_id,
                selected_answer: answer.selected_answer,
                is_correct: answer.is_correct,
                answered_at: now,
            });
        }
        Ok(())
    }

    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: &AttemptOutcome,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let attempt = tables
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or(StoreError::NotFound {
                entity: "attempt",
                id: attempt_id,
            })?;
        if !attempt.is_open() {
            return Ok(());
        }

        attempt.completed_at = Some(outcome.completed_at);
        attempt.score = Some(outcome.score);
        attempt.percentage = Some(outcome.percentage);
        attempt.passed = Some(outcome.passed);
        Ok(())
    }

    async fn fetch_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.attempts.iter().find(|a| a.id == attempt_id).cloned())
    }

    async fn fetch_graded_answers(
        &self,
        attempt_id: Uuid,
    ) -> Result<Vec<AnswerRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .answers
            .iter()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn fetch_recent_attempts(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Attempt>, StoreError> {
        let tables = self.tables.read().await;
        let mut attempts: Vec<Attempt> = tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        attempts.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(attempts)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::DuplicateUsername(new.username));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password: new.password,
            full_name: new.full_name,
            is_guest: new.is_guest,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }
}
