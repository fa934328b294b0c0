// src/services/attempt.rs

//! Attempt lifecycle: start (or resume), take, submit, expire, complete.
//!
//! An attempt is `InProgress` from creation until `completed_at` is set,
//! after which it is terminal. Expiry is detected lazily: nothing completes
//! an abandoned attempt until somebody looks at it again.

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::{ATTEMPT_TIME_LIMIT_SECS, QUESTIONS_PER_PACKAGE},
    error::{AppError, AppResult},
    models::{
        attempt::{
            AttemptStatus, QuizAttempt, ResultQuestion, ResultView, SubmitAnswersRequest, TakeView,
        },
        package::QuizPackage,
        question::PublicQuestion,
    },
    repositories::Store,
    scoring,
};

/// Outcome of the take view: either the quiz itself, or a completed
/// attempt whose results should be shown instead.
#[derive(Debug)]
pub enum TakeOutcome {
    InProgress(TakeView),
    Completed(QuizAttempt),
}

/// Outcome of the result view: results, or an attempt still being taken.
#[derive(Debug)]
pub enum ResultOutcome {
    Ready(ResultView),
    InProgress(QuizAttempt),
}

#[derive(Clone)]
pub struct AttemptService {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl AttemptService {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Starts an attempt, or resumes the user's open attempt on the package.
    ///
    /// Returns the attempt and whether it was newly created.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, user_id: i64, package_id: i64) -> AppResult<(QuizAttempt, bool)> {
        let package = self
            .store
            .packages
            .find_by_id(package_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(AppError::NotFound("Quiz package not found".to_string()))?;

        let question_count = self.store.questions.count_for_package(package.id).await?;
        if question_count != QUESTIONS_PER_PACKAGE {
            return Err(AppError::PreconditionFailed(format!(
                "This quiz package does not have the required {} questions.",
                QUESTIONS_PER_PACKAGE
            )));
        }

        let (attempt, created) = self
            .store
            .attempts
            .create_or_resume(user_id, package.id, question_count as i32, self.clock.now())
            .await?;

        if created {
            tracing::info!(attempt_id = attempt.id, "attempt started");
        } else {
            tracing::info!(attempt_id = attempt.id, "resuming open attempt");
        }

        Ok((attempt, created))
    }

    /// Loads the take view. An attempt past its time limit is completed with
    /// whatever answers are stored and reported as `Completed`.
    #[tracing::instrument(skip(self))]
    pub async fn take(&self, user_id: i64, package_id: i64, attempt_id: i64) -> AppResult<TakeOutcome> {
        let attempt = self.load_owned(user_id, package_id, attempt_id).await?;

        let remaining_seconds = match attempt.status_at(self.clock.now()) {
            AttemptStatus::Completed => return Ok(TakeOutcome::Completed(attempt)),
            AttemptStatus::Expired => {
                let completed = self.expire(&attempt).await?;
                return Ok(TakeOutcome::Completed(completed));
            }
            AttemptStatus::InProgress { remaining_seconds } => remaining_seconds,
        };

        let package = self.package(attempt.quiz_package_id).await?;
        let questions = self
            .store
            .questions
            .list_for_package(package.id)
            .await?
            .into_iter()
            .map(PublicQuestion::from)
            .collect();

        Ok(TakeOutcome::InProgress(TakeView {
            package,
            current_answers: attempt.answers.0.clone(),
            attempt,
            questions,
            time_limit: ATTEMPT_TIME_LIMIT_SECS,
            time_remaining: remaining_seconds.max(0),
        }))
    }

    /// Stores the answers and completes the attempt. Submitting to an
    /// attempt that is already completed changes nothing; ownership and
    /// completion are settled before the payload is validated.
    #[tracing::instrument(skip(self, request), fields(answered = request.answers.len()))]
    pub async fn submit(
        &self,
        user_id: i64,
        package_id: i64,
        attempt_id: i64,
        request: SubmitAnswersRequest,
    ) -> AppResult<QuizAttempt> {
        let attempt = self.load_owned(user_id, package_id, attempt_id).await?;

        if attempt.is_completed() {
            return Ok(attempt);
        }

        let answers = request.into_answers()?;

        if !self.store.attempts.save_answers(attempt.id, &answers).await? {
            tracing::info!(attempt_id, "attempt completed before answers were saved");
            return self.reload(attempt.id).await;
        }

        let stored = self.reload(attempt.id).await?;
        let completed = self.complete(&stored).await?;
        tracing::info!(
            attempt_id,
            score = completed.score,
            total = completed.total_questions,
            "attempt submitted"
        );
        Ok(completed)
    }

    /// Persists the expiry of an attempt that ran out of time.
    pub async fn expire(&self, attempt: &QuizAttempt) -> AppResult<QuizAttempt> {
        tracing::info!(
            attempt_id = attempt.id,
            elapsed = attempt.elapsed_seconds(self.clock.now()),
            "time limit exceeded, auto-submitting"
        );
        self.complete(attempt).await
    }

    /// Scores the stored answers and marks the attempt completed.
    ///
    /// The store only lets the first completion through; a caller that loses
    /// the race gets the winner's result back.
    pub async fn complete(&self, attempt: &QuizAttempt) -> AppResult<QuizAttempt> {
        let questions = self
            .store
            .questions
            .list_for_package(attempt.quiz_package_id)
            .await?;

        let score = scoring::score(&questions, &attempt.answers);
        let now = self.clock.now();
        let time_taken = i32::try_from(attempt.elapsed_seconds(now)).unwrap_or(i32::MAX);

        let won = self
            .store
            .attempts
            .complete(attempt.id, score, now, time_taken)
            .await?;

        if !won {
            tracing::warn!(attempt_id = attempt.id, "attempt was already completed");
        }

        self.reload(attempt.id).await
    }

    /// Loads the result view of a completed attempt.
    #[tracing::instrument(skip(self))]
    pub async fn result(
        &self,
        user_id: i64,
        package_id: i64,
        attempt_id: i64,
    ) -> AppResult<ResultOutcome> {
        let attempt = self.load_owned(user_id, package_id, attempt_id).await?;

        if !attempt.is_completed() {
            return Ok(ResultOutcome::InProgress(attempt));
        }

        let package = self.package(attempt.quiz_package_id).await?;
        let questions = self
            .store
            .questions
            .list_for_package(package.id)
            .await?
            .into_iter()
            .map(|q| {
                let user_answer = attempt.answers.get(&q.id).cloned();
                ResultQuestion {
                    is_correct: scoring::is_correct(&q, user_answer.as_deref()),
                    id: q.id,
                    question_text: q.question_text,
                    options: q.options,
                    correct_answer: q.correct_answer,
                    user_answer,
                    explanation: q.explanation,
                }
            })
            .collect();

        Ok(ResultOutcome::Ready(ResultView {
            package,
            score: attempt.score,
            total_questions: attempt.total_questions,
            percentage: attempt.percentage(),
            time_taken: scoring::format_duration(attempt.time_taken_seconds),
            questions,
            attempt,
        }))
    }

    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<QuizAttempt>> {
        self.store.attempts.list_for_user(user_id).await
    }

    async fn load_owned(&self, user_id: i64, package_id: i64, attempt_id: i64) -> AppResult<QuizAttempt> {
        let attempt = self
            .store
            .attempts
            .find_by_id(attempt_id)
            .await?
            .filter(|a| a.quiz_package_id == package_id)
            .ok_or(AppError::NotFound("Quiz attempt not found".to_string()))?;

        if attempt.user_id != user_id {
            return Err(AppError::Forbidden(
                "This attempt belongs to another user".to_string(),
            ));
        }

        Ok(attempt)
    }

    async fn reload(&self, attempt_id: i64) -> AppResult<QuizAttempt> {
        self.store
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or(AppError::NotFound("Quiz attempt not found".to_string()))
    }

    async fn package(&self, package_id: i64) -> AppResult<QuizPackage> {
        self.store
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or(AppError::NotFound("Quiz package not found".to_string()))
    }
}
