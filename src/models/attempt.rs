// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::{config::ATTEMPT_TIME_LIMIT_SECS, error::AppError};

use super::{package::QuizPackage, question::PublicQuestion};

/// Represents the 'quiz_attempts' table in the database.
///
/// `completed_at` absent means the attempt is still in progress; at most one
/// such attempt exists per (user, package).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_package_id: i64,

    /// Question id -> submitted answer. Unanswered questions are absent.
    pub answers: Json<HashMap<i64, String>>,

    pub score: i32,

    /// Question count snapshot taken when the attempt started.
    pub total_questions: i32,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i32>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Where an attempt stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress { remaining_seconds: i64 },
    /// Past the time limit but not yet persisted as completed.
    Expired,
    Completed,
}

impl QuizAttempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whole seconds since the attempt started.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }

    /// Pure status computation; persisting an expiry is a separate command.
    pub fn status_at(&self, now: DateTime<Utc>) -> AttemptStatus {
        if self.is_completed() {
            return AttemptStatus::Completed;
        }

        let elapsed = self.elapsed_seconds(now);
        if elapsed > ATTEMPT_TIME_LIMIT_SECS {
            AttemptStatus::Expired
        } else {
            AttemptStatus::InProgress {
                remaining_seconds: ATTEMPT_TIME_LIMIT_SECS - elapsed,
            }
        }
    }

    pub fn percentage(&self) -> f64 {
        crate::scoring::percentage(self.score, self.total_questions)
    }
}

/// DTO for submitting answers.
///
/// Key: question id (as a JSON object key), Value: the chosen option text.
/// Values are not checked against the question's options.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: HashMap<String, String>,
}

impl From<HashMap<i64, String>> for SubmitAnswersRequest {
    fn from(answers: HashMap<i64, String>) -> Self {
        Self {
            answers: answers
                .into_iter()
                .map(|(id, answer)| (id.to_string(), answer))
                .collect(),
        }
    }
}

impl SubmitAnswersRequest {
    pub fn into_answers(self) -> Result<HashMap<i64, String>, AppError> {
        let mut parsed = HashMap::with_capacity(self.answers.len());

        for (key, value) in self.answers {
            let id = key
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| {
                    AppError::ValidationFailed(format!("Invalid question id '{}'", key))
                })?;

            if value.is_empty() {
                return Err(AppError::ValidationFailed(format!(
                    "Answer for question {} must not be empty",
                    id
                )));
            }

            parsed.insert(id, value);
        }

        Ok(parsed)
    }
}

/// Payload of the "take quiz" view.
#[derive(Debug, Serialize)]
pub struct TakeView {
    pub package: QuizPackage,
    pub attempt: QuizAttempt,
    pub questions: Vec<PublicQuestion>,
    pub current_answers: HashMap<i64, String>,
    pub time_limit: i64,
    pub time_remaining: i64,
}

/// Per-question line of the result view.
#[derive(Debug, Serialize)]
pub struct ResultQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Json<Vec<String>>,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Payload of the result view.
#[derive(Debug, Serialize)]
pub struct ResultView {
    pub package: QuizPackage,
    pub attempt: QuizAttempt,
    pub questions: Vec<ResultQuestion>,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_taken: String,
}

/// Row for "recent attempts" listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptOverview {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub quiz_package_id: i64,
    pub package_name: String,
    pub score: i32,
    pub total_questions: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt(started_at: DateTime<Utc>) -> QuizAttempt {
        QuizAttempt {
            id: 1,
            user_id: 1,
            quiz_package_id: 1,
            answers: Json(HashMap::new()),
            score: 0,
            total_questions: 110,
            started_at,
            completed_at: None,
            time_taken_seconds: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_status_in_progress_reports_remaining_time() {
        let start = Utc::now();
        let a = attempt(start);
        assert_eq!(
            a.status_at(start + Duration::seconds(600)),
            AttemptStatus::InProgress {
                remaining_seconds: 6600
            }
        );
    }

    #[test]
    fn test_status_at_exact_limit_is_still_in_progress() {
        let start = Utc::now();
        let a = attempt(start);
        assert_eq!(
            a.status_at(start + Duration::seconds(7200)),
            AttemptStatus::InProgress {
                remaining_seconds: 0
            }
        );
        assert_eq!(
            a.status_at(start + Duration::seconds(7201)),
            AttemptStatus::Expired
        );
    }

    #[test]
    fn test_status_completed_wins_over_expiry() {
        let start = Utc::now();
        let mut a = attempt(start);
        a.completed_at = Some(start + Duration::seconds(30));
        assert_eq!(
            a.status_at(start + Duration::days(3)),
            AttemptStatus::Completed
        );
    }

    #[test]
    fn test_submit_request_parses_numeric_keys() {
        let mut answers = HashMap::new();
        answers.insert("12".to_string(), "A".to_string());
        answers.insert("13".to_string(), "free text".to_string());

        let parsed = SubmitAnswersRequest { answers }.into_answers().unwrap();
        assert_eq!(parsed.get(&12).map(String::as_str), Some("A"));
        assert_eq!(parsed.get(&13).map(String::as_str), Some("free text"));
    }

    #[test]
    fn test_submit_request_rejects_bad_keys_and_empty_values() {
        let mut bad_key = HashMap::new();
        bad_key.insert("question-1".to_string(), "A".to_string());
        assert!(matches!(
            SubmitAnswersRequest { answers: bad_key }.into_answers(),
            Err(AppError::ValidationFailed(_))
        ));

        let mut empty_value = HashMap::new();
        empty_value.insert("5".to_string(), String::new());
        assert!(matches!(
            SubmitAnswersRequest {
                answers: empty_value
            }
            .into_answers(),
            Err(AppError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_submit_request_accepts_empty_mapping() {
        let parsed = SubmitAnswersRequest {
            answers: HashMap::new(),
        }
        .into_answers()
        .unwrap();
        assert!(parsed.is_empty());
    }
}
