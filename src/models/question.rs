// src/models/question.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

use crate::config::{MAX_OPTION_LEN, MAX_OPTIONS, MIN_OPTIONS};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Owning package. Deleting the package deletes its questions.
    pub quiz_package_id: i64,

    pub question_text: String,

    /// Between 2 and 6 answer options, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Always one of `options`.
    pub correct_answer: String,

    pub explanation: Option<String>,

    /// Display position within the package (1-based, unique per package).
    pub order_index: i32,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// DTO for sending a question to someone taking the quiz
/// (excludes correct answer and explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Json<Vec<String>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            options: q.options,
        }
    }
}

/// Fields needed to insert a question once validated.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    /// `None` takes the next free position.
    pub order_index: Option<i32>,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_correct_answer))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 255))]
    pub correct_answer: String,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    /// Defaults to the next free position when omitted.
    #[validate(range(min = 1))]
    pub order_index: Option<i32>,
}

/// DTO for updating a question. Fields are optional; the merged result is
/// re-validated with the creation rules.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question_text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub order_index: Option<i32>,
}

impl UpdateQuestionRequest {
    /// Overlays the changes on an existing question. An empty explanation
    /// clears the stored one.
    pub fn merge_into(self, current: &Question) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: self
                .question_text
                .unwrap_or_else(|| current.question_text.clone()),
            options: self.options.unwrap_or_else(|| current.options.0.clone()),
            correct_answer: self
                .correct_answer
                .unwrap_or_else(|| current.correct_answer.clone()),
            explanation: match self.explanation {
                Some(text) if text.trim().is_empty() => None,
                Some(text) => Some(text),
                None => current.explanation.clone(),
            },
            order_index: Some(self.order_index.unwrap_or(current.order_index)),
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() < MIN_OPTIONS {
        return Err(ValidationError::new("too_few_options"));
    }
    if options.len() > MAX_OPTIONS {
        return Err(ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.is_empty() {
            return Err(ValidationError::new("option_cannot_be_empty"));
        }
        if opt.chars().count() as u64 > MAX_OPTION_LEN {
            return Err(ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_correct_answer(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    if !req.options.iter().any(|o| o == &req.correct_answer) {
        return Err(ValidationError::new("correct_answer_not_in_options"));
    }
    Ok(())
}
