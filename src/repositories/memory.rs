// src/repositories/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

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

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    packages: BTreeMap<i64, QuizPackage>,
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, QuizAttempt>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn questions_of(&self, package_id: i64) -> impl Iterator<Item = &Question> {
        self.questions
            .values()
            .filter(move |q| q.quiz_package_id == package_id)
    }

    fn sorted_questions(&self, package_id: i64) -> Vec<Question> {
        let mut questions: Vec<Question> = self.questions_of(package_id).cloned().collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        questions
    }

    fn order_taken(&self, package_id: i64, order_index: i32, except: Option<i64>) -> bool {
        self.questions_of(package_id)
            .any(|q| q.order_index == order_index && Some(q.id) != except)
    }
}

/// Process-local store with the same semantics as the PostgreSQL one.
/// A single lock guards all tables, which makes every operation atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn page<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    items
        .iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, username: &str, password_hash: &str, role: &str) -> AppResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            created_at: Some(Utc::now()),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn list_summaries(&self, offset: i64, limit: i64) -> AppResult<(Vec<UserSummary>, i64)> {
        let t = self.tables.read().await;
        let summaries: Vec<UserSummary> = t
            .users
            .values()
            .rev()
            .map(|u| {
                let attempts = t.attempts.values().filter(|a| a.user_id == u.id);
                let (total, completed) = attempts.fold((0, 0), |(total, completed), a| {
                    (total + 1, completed + a.is_completed() as i64)
                });
                UserSummary {
                    id: u.id,
                    username: u.username.clone(),
                    role: u.role.clone(),
                    created_at: u.created_at,
                    attempts_count: total,
                    completed_attempts_count: completed,
                }
            })
            .collect();

        Ok((page(&summaries, offset, limit), summaries.len() as i64))
    }
}

#[async_trait]
impl PackageRepository for MemoryStore {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        is_active: bool,
    ) -> AppResult<QuizPackage> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let package = QuizPackage {
            id: t.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_active,
            created_at: Some(now),
            updated_at: Some(now),
        };
        t.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizPackage>> {
        Ok(self.tables.read().await.packages.get(&id).cloned())
    }

    async fn list(
        &self,
        active_only: bool,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<PackageSummary>, i64)> {
        let t = self.tables.read().await;
        let summaries: Vec<PackageSummary> = t
            .packages
            .values()
            .rev()
            .filter(|p| !active_only || p.is_active)
            .map(|p| PackageSummary {
                id: p.id,
                name: p.name.clone(),
                description: p.description.clone(),
                is_active: p.is_active,
                questions_count: t.questions_of(p.id).count() as i64,
                attempts_count: t
                    .attempts
                    .values()
                    .filter(|a| a.quiz_package_id == p.id)
                    .count() as i64,
                created_at: p.created_at,
            })
            .collect();

        Ok((page(&summaries, offset, limit), summaries.len() as i64))
    }

    async fn update(&self, id: i64, changes: &UpdatePackageRequest) -> AppResult<Option<QuizPackage>> {
        let mut t = self.tables.write().await;
        let Some(package) = t.packages.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = &changes.name {
            package.name = name.clone();
        }
        if let Some(description) = &changes.description {
            package.description = Some(description.clone());
        }
        if let Some(is_active) = changes.is_active {
            package.is_active = is_active;
        }
        if !changes.is_empty() {
            package.updated_at = Some(Utc::now());
        }

        Ok(Some(package.clone()))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if t.packages.remove(&id).is_none() {
            return Ok(false);
        }
        t.questions.retain(|_, q| q.quiz_package_id != id);
        t.attempts.retain(|_, a| a.quiz_package_id != id);
        Ok(true)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.packages.len() as i64)
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn count_for_package(&self, package_id: i64) -> AppResult<i64> {
        Ok(self.tables.read().await.questions_of(package_id).count() as i64)
    }

    async fn list_for_package(&self, package_id: i64) -> AppResult<Vec<Question>> {
        Ok(self.tables.read().await.sorted_questions(package_id))
    }

    async fn page_for_package(
        &self,
        package_id: i64,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Question>, i64)> {
        let questions = self.tables.read().await.sorted_questions(package_id);
        Ok((page(&questions, offset, limit), questions.len() as i64))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Question>> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn insert_capped(
        &self,
        package_id: i64,
        question: &NewQuestion,
        capacity: i64,
    ) -> AppResult<Question> {
        let mut t = self.tables.write().await;

        if !t.packages.contains_key(&package_id) {
            return Err(AppError::NotFound("Quiz package not found".to_string()));
        }

        if t.questions_of(package_id).count() as i64 >= capacity {
            return Err(AppError::PreconditionFailed(format!(
                "Quiz package already has the maximum number of questions ({}).",
                capacity
            )));
        }

        let order_index = match question.order_index {
            Some(order_index) => order_index,
            None => t.questions_of(package_id).map(|q| q.order_index).max().unwrap_or(0) + 1,
        };

        if t.order_taken(package_id, order_index, None) {
            return Err(AppError::Conflict(
                "Order index is already used in this package".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Question {
            id: t.next_id(),
            quiz_package_id: package_id,
            question_text: question.question_text.clone(),
            options: Json(question.options.clone()),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            order_index,
            created_at: Some(now),
            updated_at: Some(now),
        };
        t.questions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, question: &NewQuestion) -> AppResult<Option<Question>> {
        let mut t = self.tables.write().await;
        let Some(current) = t.questions.get(&id).cloned() else {
            return Ok(None);
        };

        let order_index = question.order_index.unwrap_or(current.order_index);
        if t.order_taken(current.quiz_package_id, order_index, Some(id)) {
            return Err(AppError::Conflict(
                "Order index is already used in this package".to_string(),
            ));
        }

        let updated = Question {
            question_text: question.question_text.clone(),
            options: Json(question.options.clone()),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            order_index,
            updated_at: Some(Utc::now()),
            ..current
        };
        t.questions.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.tables.write().await.questions.remove(&id).is_some())
    }
}

#[async_trait]
impl AttemptRepository for MemoryStore {
    async fn create_or_resume(
        &self,
        user_id: i64,
        package_id: i64,
        total_questions: i32,
        started_at: DateTime<Utc>,
    ) -> AppResult<(QuizAttempt, bool)> {
        let mut t = self.tables.write().await;

        let open = t.attempts.values().find(|a| {
            a.user_id == user_id && a.quiz_package_id == package_id && !a.is_completed()
        });
        if let Some(attempt) = open {
            return Ok((attempt.clone(), false));
        }

        let attempt = QuizAttempt {
            id: t.next_id(),
            user_id,
            quiz_package_id: package_id,
            answers: Json(HashMap::new()),
            score: 0,
            total_questions,
            started_at,
            completed_at: None,
            time_taken_seconds: None,
            created_at: Some(started_at),
            updated_at: Some(started_at),
        };
        t.attempts.insert(attempt.id, attempt.clone());
        Ok((attempt, true))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>> {
        Ok(self.tables.read().await.attempts.get(&id).cloned())
    }

    async fn latest_for_user_package(
        &self,
        user_id: i64,
        package_id: i64,
    ) -> AppResult<Option<QuizAttempt>> {
        let t = self.tables.read().await;
        Ok(t.attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_package_id == package_id)
            .max_by_key(|a| (a.started_at, a.id))
            .cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let t = self.tables.read().await;
        let mut attempts: Vec<QuizAttempt> = t
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| std::cmp::Reverse((a.started_at, a.id)));
        Ok(attempts)
    }

    async fn save_answers(&self, id: i64, answers: &HashMap<i64, String>) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t.attempts.get_mut(&id) {
            Some(attempt) if !attempt.is_completed() => {
                attempt.answers = Json(answers.clone());
                attempt.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: i64,
        score: i32,
        completed_at: DateTime<Utc>,
        time_taken_seconds: i32,
    ) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        match t.attempts.get_mut(&id) {
            Some(attempt) if !attempt.is_completed() => {
                attempt.score = score;
                attempt.completed_at = Some(completed_at);
                attempt.time_taken_seconds = Some(time_taken_seconds);
                attempt.updated_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.attempts.len() as i64)
    }

    async fn count_completed(&self) -> AppResult<i64> {
        let t = self.tables.read().await;
        Ok(t.attempts.values().filter(|a| a.is_completed()).count() as i64)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<AttemptOverview>> {
        let t = self.tables.read().await;
        let recent = t
            .attempts
            .values()
            .rev()
            .filter_map(|a| {
                let user = t.users.get(&a.user_id)?;
                let package = t.packages.get(&a.quiz_package_id)?;
                Some(AttemptOverview {
                    id: a.id,
                    user_id: a.user_id,
                    username: user.username.clone(),
                    quiz_package_id: a.quiz_package_id,
                    package_name: package.name.clone(),
                    score: a.score,
                    total_questions: a.total_questions,
                    started_at: a.started_at,
                    completed_at: a.completed_at,
                })
            })
            .take(limit.max(0) as usize)
            .collect();
        Ok(recent)
    }

    async fn package_aggregates(&self) -> AppResult<Vec<PackageAttemptAggregate>> {
        let t = self.tables.read().await;
        let rows = t
            .packages
            .values()
            .map(|p| {
                let attempts: Vec<&QuizAttempt> = t
                    .attempts
                    .values()
                    .filter(|a| a.quiz_package_id == p.id)
                    .collect();
                let completed: Vec<i32> = attempts
                    .iter()
                    .filter(|a| a.is_completed())
                    .map(|a| a.score)
                    .collect();
                let average_score = if completed.is_empty() {
                    None
                } else {
                    Some(completed.iter().map(|s| *s as f64).sum::<f64>() / completed.len() as f64)
                };

                PackageAttemptAggregate {
                    id: p.id,
                    name: p.name.clone(),
                    questions_count: t.questions_of(p.id).count() as i64,
                    total_attempts: attempts.len() as i64,
                    completed_attempts: completed.len() as i64,
                    average_score,
                }
            })
            .collect();
        Ok(rows)
    }
}
