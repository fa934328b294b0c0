// src/repositories/mod.rs

//! Persistence seams. Handlers and services only talk to these traits; the
//! binary wires the PostgreSQL store and the test suite the in-memory one.

pub mod memory;
pub mod postgres;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{
        attempt::{AttemptOverview, QuizAttempt},
        package::{PackageSummary, QuizPackage, UpdatePackageRequest},
        question::{NewQuestion, Question},
        stats::PackageAttemptAggregate,
        user::{User, UserSummary},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create(&self, username: &str, password_hash: &str, role: &str) -> AppResult<User>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn count(&self) -> AppResult<i64>;
    async fn list_summaries(&self, offset: i64, limit: i64) -> AppResult<(Vec<UserSummary>, i64)>;
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> AppResult<QuizPackage>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizPackage>>;
    /// Newest first.
    async fn list(
        &self,
        active_only: bool,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<PackageSummary>, i64)>;
    async fn update(&self, id: i64, changes: &UpdatePackageRequest) -> AppResult<Option<QuizPackage>>;
    /// Cascades to the package's questions and attempts.
    async fn delete(&self, id: i64) -> AppResult<bool>;
    async fn count(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn count_for_package(&self, package_id: i64) -> AppResult<i64>;
    /// Ordered by `order_index`.
    async fn list_for_package(&self, package_id: i64) -> AppResult<Vec<Question>>;
    async fn page_for_package(
        &self,
        package_id: i64,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Question>, i64)>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Question>>;
    /// Inserts a question unless the package already holds `capacity`
    /// questions (`PreconditionFailed`). The count check and the insert are
    /// atomic with respect to other inserts into the same package. A missing
    /// `order_index` takes the next free position.
    async fn insert_capped(
        &self,
        package_id: i64,
        question: &NewQuestion,
        capacity: i64,
    ) -> AppResult<Question>;
    async fn update(&self, id: i64, question: &NewQuestion) -> AppResult<Option<Question>>;
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Creates a fresh attempt, or returns the open one for the pair.
    /// The flag is `true` when a new row was created.
    async fn create_or_resume(
        &self,
        user_id: i64,
        package_id: i64,
        total_questions: i32,
        started_at: DateTime<Utc>,
    ) -> AppResult<(QuizAttempt, bool)>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>>;
    async fn latest_for_user_package(
        &self,
        user_id: i64,
        package_id: i64,
    ) -> AppResult<Option<QuizAttempt>>;
    /// Newest first.
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<QuizAttempt>>;
    /// Replaces the stored answers while the attempt is still open.
    /// Returns `false` if the attempt was already completed.
    async fn save_answers(&self, id: i64, answers: &HashMap<i64, String>) -> AppResult<bool>;
    /// Compare-and-swap completion: only an attempt without `completed_at`
    /// is updated. Returns `false` when another completion got there first.
    async fn complete(
        &self,
        id: i64,
        score: i32,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i32,
    ) -> AppResult<bool>;
    async fn count(&self) -> AppResult<i64>;
    async fn count_completed(&self) -> AppResult<i64>;
    async fn recent(&self, limit: i64) -> AppResult<Vec<AttemptOverview>>;
    async fn package_aggregates(&self) -> AppResult<Vec<PackageAttemptAggregate>>;
}

/// Bundle of repositories shared through the application state.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub packages: Arc<dyn PackageRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            packages: store.clone(),
            questions: store.clone(),
            attempts: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            users: store.clone(),
            packages: store.clone(),
            questions: store.clone(),
            attempts: store,
        }
    }
}
