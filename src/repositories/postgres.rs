// src/repositories/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::{AppError, AppResult},
    models::{
        attempt::{AttemptOverview, QuizAttempt},
        package::{PackageSummary, QuizPackage, UpdatePackageRequest},
        question::{NewQuestion, Question},
        stats::PackageAttemptAggregate,
        user::{User, UserSummary},
    },
};

use super::{AttemptRepository, PackageRepository, QuestionRepository, UserRepository};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn order_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Order index is already used in this package".to_string())
    } else {
        tracing::error!("Failed to write question: {:?}", err);
        AppError::from(err)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, username: &str, password_hash: &str, role: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_summaries(&self, offset: i64, limit: i64) -> AppResult<(Vec<UserSummary>, i64)> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT
                u.id, u.username, u.role, u.created_at,
                COUNT(a.id) AS attempts_count,
                COUNT(a.completed_at) AS completed_attempts_count
            FROM users u
            LEFT JOIN quiz_attempts a ON a.user_id = u.id
            GROUP BY u.id
            ORDER BY u.created_at DESC, u.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = UserRepository::count(self).await?;
        Ok((users, total))
    }
}

#[async_trait]
impl PackageRepository for PgStore {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> AppResult<QuizPackage> {
        let package = sqlx::query_as::<_, QuizPackage>(
            r#"
            INSERT INTO quiz_packages (name, description, is_active)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(package)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizPackage>> {
        let package = sqlx::query_as::<_, QuizPackage>("SELECT * FROM quiz_packages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(package)
    }

    async fn list(
        &self,
        active_only: bool,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<PackageSummary>, i64)> {
        let packages = sqlx::query_as::<_, PackageSummary>(
            r#"
            SELECT
                p.id, p.name, p.description, p.is_active,
                (SELECT COUNT(*) FROM questions q WHERE q.quiz_package_id = p.id) AS questions_count,
                (SELECT COUNT(*) FROM quiz_attempts a WHERE a.quiz_package_id = p.id) AS attempts_count,
                p.created_at
            FROM quiz_packages p
            WHERE (NOT $1 OR p.is_active)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(active_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quiz_packages WHERE (NOT $1 OR is_active)",
        )
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;

        Ok((packages, total))
    }

    async fn update(&self, id: i64, changes: &UpdatePackageRequest) -> AppResult<Option<QuizPackage>> {
        if changes.is_empty() {
            return PackageRepository::find_by_id(self, id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quiz_packages SET ");
        let mut separated = builder.separated(", ");

        if let Some(name) = &changes.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }

        if let Some(description) = &changes.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description.clone());
        }

        if let Some(is_active) = changes.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }

        separated.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let package = builder
            .build_query_as::<QuizPackage>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update package: {:?}", e);
                AppError::from(e)
            })?;

        Ok(package)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM quiz_packages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_packages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl QuestionRepository for PgStore {
    async fn count_for_package(&self, package_id: i64) -> AppResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_package_id = $1")
                .bind(package_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn list_for_package(&self, package_id: i64) -> AppResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE quiz_package_id = $1 ORDER BY order_index, id",
        )
        .bind(package_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn page_for_package(
        &self,
        package_id: i64,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Question>, i64)> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE quiz_package_id = $1
            ORDER BY order_index, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(package_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count_for_package(package_id).await?;
        Ok((questions, total))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(question)
    }

    async fn insert_capped(
        &self,
        package_id: i64,
        question: &NewQuestion,
        capacity: i64,
    ) -> AppResult<Question> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent inserts into the same package.
        sqlx::query_scalar::<_, i64>("SELECT id FROM quiz_packages WHERE id = $1 FOR UPDATE")
            .bind(package_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Quiz package not found".to_string()))?;

        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_package_id = $1")
                .bind(package_id)
                .fetch_one(&mut *tx)
                .await?;

        if count >= capacity {
            return Err(AppError::PreconditionFailed(format!(
                "Quiz package already has the maximum number of questions ({}).",
                capacity
            )));
        }

        let order_index = match question.order_index {
            Some(order_index) => order_index,
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(order_index), 0) + 1 FROM questions WHERE quiz_package_id = $1",
                )
                .bind(package_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let created = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions
            (quiz_package_id, question_text, options, correct_answer, explanation, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(package_id)
        .bind(&question.question_text)
        .bind(Json(&question.options))
        .bind(&question.correct_answer)
        .bind(&question.explanation)
        .bind(order_index)
        .fetch_one(&mut *tx)
        .await
        .map_err(order_conflict)?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, id: i64, question: &NewQuestion) -> AppResult<Option<Question>> {
        let updated = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions SET
                question_text = $2,
                options = $3,
                correct_answer = $4,
                explanation = $5,
                order_index = COALESCE($6, order_index),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&question.question_text)
        .bind(Json(&question.options))
        .bind(&question.correct_answer)
        .bind(&question.explanation)
        .bind(question.order_index)
        .fetch_optional(&self.pool)
        .await
        .map_err(order_conflict)?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AttemptRepository for PgStore {
    async fn create_or_resume(
        &self,
        user_id: i64,
        package_id: i64,
        total_questions: i32,
        started_at: DateTime<Utc>,
    ) -> AppResult<(QuizAttempt, bool)> {
        // The partial unique index guarantees a single open attempt per pair.
        // If the open attempt completes between the two statements, go again.
        for _ in 0..3 {
            let inserted = sqlx::query_as::<_, QuizAttempt>(
                r#"
                INSERT INTO quiz_attempts
                (user_id, quiz_package_id, answers, score, total_questions, started_at)
                VALUES ($1, $2, '{}'::jsonb, 0, $3, $4)
                ON CONFLICT (user_id, quiz_package_id) WHERE completed_at IS NULL
                DO NOTHING
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(package_id)
            .bind(total_questions)
            .bind(started_at)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(attempt) = inserted {
                return Ok((attempt, true));
            }

            let open = sqlx::query_as::<_, QuizAttempt>(
                r#"
                SELECT * FROM quiz_attempts
                WHERE user_id = $1 AND quiz_package_id = $2 AND completed_at IS NULL
                "#,
            )
            .bind(user_id)
            .bind(package_id)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(attempt) = open {
                return Ok((attempt, false));
            }
        }

        Err(AppError::InternalServerError(format!(
            "Could not create or resume attempt for user {} on package {}",
            user_id, package_id
        )))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>> {
        let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn latest_for_user_package(
        &self,
        user_id: i64,
        package_id: i64,
    ) -> AppResult<Option<QuizAttempt>> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            SELECT * FROM quiz_attempts
            WHERE user_id = $1 AND quiz_package_id = $2
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            "SELECT * FROM quiz_attempts WHERE user_id = $1 ORDER BY started_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn save_answers(&self, id: i64, answers: &HashMap<i64, String>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET answers = $2, updated_at = NOW()
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Json(answers))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(
        &self,
        id: i64,
        score: i32,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET score = $2, completed_at = $3, time_taken_seconds = $4, updated_at = NOW()
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(completed_at)
        .bind(time_taken_seconds)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_attempts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_completed(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quiz_attempts WHERE completed_at IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<AttemptOverview>> {
        let attempts = sqlx::query_as::<_, AttemptOverview>(
            r#"
            SELECT
                a.id, a.user_id, u.username,
                a.quiz_package_id, p.name AS package_name,
                a.score, a.total_questions, a.started_at, a.completed_at
            FROM quiz_attempts a
            JOIN users u ON u.id = a.user_id
            JOIN quiz_packages p ON p.id = a.quiz_package_id
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn package_aggregates(&self) -> AppResult<Vec<PackageAttemptAggregate>> {
        let rows = sqlx::query_as::<_, PackageAttemptAggregate>(
            r#"
            SELECT
                p.id, p.name,
                (SELECT COUNT(*) FROM questions q WHERE q.quiz_package_id = p.id) AS questions_count,
                COUNT(a.id) AS total_attempts,
                COUNT(a.completed_at) AS completed_attempts,
                (AVG(a.score) FILTER (WHERE a.completed_at IS NOT NULL))::FLOAT8 AS average_score
            FROM quiz_packages p
            LEFT JOIN quiz_attempts a ON a.quiz_package_id = p.id
            GROUP BY p.id
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
