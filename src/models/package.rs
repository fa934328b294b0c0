// src/models/package.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::QUESTIONS_PER_PACKAGE;

use super::{attempt::QuizAttempt, question::Question};

/// Represents the 'quiz_packages' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizPackage {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Inactive packages are hidden from (and cannot be attempted by) regular users.
    pub is_active: bool,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A package can be attempted only when it is active and holds exactly
/// the required number of questions.
pub fn is_attemptable(package: &QuizPackage, question_count: i64) -> bool {
    package.is_active && question_count == QUESTIONS_PER_PACKAGE
}

/// Listing row: package plus aggregate counts.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PackageSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub questions_count: i64,
    pub attempts_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Package page as seen by a regular user.
#[derive(Debug, Serialize)]
pub struct PackageDetail {
    pub package: QuizPackage,
    pub questions_count: i64,
    pub can_take_quiz: bool,
    pub user_attempt: Option<QuizAttempt>,
}

/// Package page as seen by an administrator (answers included).
#[derive(Debug, Serialize)]
pub struct AdminPackageDetail {
    pub package: QuizPackage,
    pub questions_count: i64,
    pub can_take_quiz: bool,
    pub questions: Vec<Question>,
}

/// DTO for creating a package.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePackageRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// DTO for updating a package. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePackageRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdatePackageRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_active.is_none()
    }
}
