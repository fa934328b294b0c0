// src/services/catalog.rs

use validator::Validate;

use crate::{
    config::{PACKAGES_PER_PAGE, QUESTIONS_PER_PACKAGE, QUESTIONS_PER_PAGE},
    error::{AppError, AppResult},
    models::{
        Page, PageParams,
        package::{
            AdminPackageDetail, CreatePackageRequest, PackageDetail, PackageSummary, QuizPackage,
            UpdatePackageRequest, is_attemptable,
        },
        question::{CreateQuestionRequest, NewQuestion, Question, UpdateQuestionRequest},
    },
    repositories::Store,
    utils::sanitize::{clean_html, clean_optional},
};

/// Package and question administration plus the user-facing catalog.
#[derive(Clone)]
pub struct CatalogService {
    store: Store,
}

impl CatalogService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Active packages only, newest first.
    pub async fn list_active(&self, params: &PageParams) -> AppResult<Page<PackageSummary>> {
        self.list(true, params).await
    }

    /// Every package, including inactive ones.
    pub async fn list_all(&self, params: &PageParams) -> AppResult<Page<PackageSummary>> {
        self.list(false, params).await
    }

    async fn list(&self, active_only: bool, params: &PageParams) -> AppResult<Page<PackageSummary>> {
        let (items, total) = self
            .store
            .packages
            .list(active_only, params.offset(PACKAGES_PER_PAGE), PACKAGES_PER_PAGE)
            .await?;
        Ok(Page::new(items, params, PACKAGES_PER_PAGE, total))
    }

    /// Package page for a regular user. Inactive packages do not exist for them.
    pub async fn show_for_user(&self, user_id: i64, package_id: i64) -> AppResult<PackageDetail> {
        let package = self
            .package(package_id)
            .await
            .and_then(|p| if p.is_active { Ok(p) } else { Err(not_found()) })?;

        let questions_count = self.store.questions.count_for_package(package.id).await?;
        let user_attempt = self
            .store
            .attempts
            .latest_for_user_package(user_id, package.id)
            .await?;

        Ok(PackageDetail {
            can_take_quiz: is_attemptable(&package, questions_count),
            package,
            questions_count,
            user_attempt,
        })
    }

    pub async fn show_for_admin(&self, package_id: i64) -> AppResult<AdminPackageDetail> {
        let package = self.package(package_id).await?;
        let questions = self.store.questions.list_for_package(package.id).await?;
        let questions_count = questions.len() as i64;

        Ok(AdminPackageDetail {
            can_take_quiz: is_attemptable(&package, questions_count),
            package,
            questions_count,
            questions,
        })
    }

    pub async fn create_package(&self, req: CreatePackageRequest) -> AppResult<QuizPackage> {
        req.validate()?;

        let description = clean_optional(req.description);
        let package = self
            .store
            .packages
            .create(&req.name, description.as_deref(), req.is_active.unwrap_or(true))
            .await?;

        tracing::info!(package_id = package.id, "quiz package created");
        Ok(package)
    }

    pub async fn update_package(&self, package_id: i64, mut req: UpdatePackageRequest) -> AppResult<QuizPackage> {
        req.validate()?;
        req.description = req.description.map(|d| clean_html(&d));

        self.store
            .packages
            .update(package_id, &req)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn delete_package(&self, package_id: i64) -> AppResult<()> {
        if !self.store.packages.delete(package_id).await? {
            return Err(not_found());
        }
        tracing::info!(package_id, "quiz package deleted with its questions and attempts");
        Ok(())
    }

    pub async fn list_questions(&self, package_id: i64, params: &PageParams) -> AppResult<Page<Question>> {
        self.package(package_id).await?;

        let (items, total) = self
            .store
            .questions
            .page_for_package(package_id, params.offset(QUESTIONS_PER_PAGE), QUESTIONS_PER_PAGE)
            .await?;
        Ok(Page::new(items, params, QUESTIONS_PER_PAGE, total))
    }

    pub async fn get_question(&self, package_id: i64, question_id: i64) -> AppResult<Question> {
        self.store
            .questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.quiz_package_id == package_id)
            .ok_or(AppError::NotFound("Question not found".to_string()))
    }

    /// Adds a question. A package never holds more than
    /// `QUESTIONS_PER_PACKAGE` questions.
    pub async fn create_question(&self, package_id: i64, req: CreateQuestionRequest) -> AppResult<Question> {
        req.validate()?;
        self.package(package_id).await?;

        let question = self
            .store
            .questions
            .insert_capped(package_id, &new_question(req), QUESTIONS_PER_PACKAGE)
            .await?;

        tracing::debug!(package_id, question_id = question.id, "question created");
        Ok(question)
    }

    pub async fn update_question(
        &self,
        package_id: i64,
        question_id: i64,
        req: UpdateQuestionRequest,
    ) -> AppResult<Question> {
        let current = self.get_question(package_id, question_id).await?;

        let merged = req.merge_into(&current);
        merged.validate()?;

        self.store
            .questions
            .update(question_id, &new_question(merged))
            .await?
            .ok_or(AppError::NotFound("Question not found".to_string()))
    }

    pub async fn delete_question(&self, package_id: i64, question_id: i64) -> AppResult<()> {
        let question = self.get_question(package_id, question_id).await?;
        self.store.questions.delete(question.id).await?;
        Ok(())
    }

    async fn package(&self, package_id: i64) -> AppResult<QuizPackage> {
        self.store
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(not_found)
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Quiz package not found".to_string())
}

fn new_question(req: CreateQuestionRequest) -> NewQuestion {
    NewQuestion {
        question_text: req.question_text,
        options: req.options,
        correct_answer: req.correct_answer,
        explanation: clean_optional(req.explanation),
        order_index: req.order_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(order_index: i32) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: format!("Question {}", order_index),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: "A".into(),
            explanation: Some("Because.".into()),
            order_index: Some(order_index),
        }
    }

    async fn package(service: &CatalogService, is_active: bool) -> QuizPackage {
        service
            .create_package(CreatePackageRequest {
                name: "Science Fundamentals".into(),
                description: Some("Physics, chemistry and biology".into()),
                is_active: Some(is_active),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn capacity_allows_110th_and_rejects_111th() {
        let service = CatalogService::new(Store::in_memory());
        let package = package(&service, true).await;

        for i in 1..=110 {
            service.create_question(package.id, question(i)).await.unwrap();
        }

        let err = service
            .create_question(package.id, question(111))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));

        let detail = service.show_for_admin(package.id).await.unwrap();
        assert_eq!(detail.questions_count, 110);
        assert!(detail.can_take_quiz);
    }

    #[tokio::test]
    async fn create_question_validates_payload() {
        let service = CatalogService::new(Store::in_memory());
        let package = package(&service, true).await;

        let mut bad = question(1);
        bad.correct_answer = "E".into();
        assert!(matches!(
            service.create_question(package.id, bad).await,
            Err(AppError::ValidationFailed(_))
        ));

        assert!(matches!(
            service.create_question(package.id + 100, question(1)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inactive_package_is_hidden_from_users() {
        let service = CatalogService::new(Store::in_memory());
        let hidden = package(&service, false).await;
        let visible = package(&service, true).await;

        assert!(matches!(
            service.show_for_user(1, hidden.id).await,
            Err(AppError::NotFound(_))
        ));

        let detail = service.show_for_user(1, visible.id).await.unwrap();
        assert!(!detail.can_take_quiz);
        assert!(detail.user_attempt.is_none());

        let listing = service.list_active(&PageParams::default()).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.items[0].id, visible.id);

        let all = service.list_all(&PageParams::default()).await.unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn question_must_belong_to_package() {
        let service = CatalogService::new(Store::in_memory());
        let first = package(&service, true).await;
        let second = package(&service, true).await;
        let q = service.create_question(first.id, question(1)).await.unwrap();

        assert!(matches!(
            service.get_question(second.id, q.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_question(second.id, q.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_question_merges_and_revalidates() {
        let service = CatalogService::new(Store::in_memory());
        let package = package(&service, true).await;
        let q = service.create_question(package.id, question(1)).await.unwrap();

        let updated = service
            .update_question(
                package.id,
                q.id,
                UpdateQuestionRequest {
                    correct_answer: Some("C".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.correct_answer, "C");
        assert_eq!(updated.options.len(), 4);

        let err = service
            .update_question(
                package.id,
                q.id,
                UpdateQuestionRequest {
                    correct_answer: Some("Z".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn update_question_can_clear_explanation() {
        let service = CatalogService::new(Store::in_memory());
        let package = package(&service, true).await;
        let q = service.create_question(package.id, question(1)).await.unwrap();
        assert!(q.explanation.is_some());

        let updated = service
            .update_question(
                package.id,
                q.id,
                UpdateQuestionRequest {
                    explanation: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.explanation, None);
    }

    #[tokio::test]
    async fn description_is_sanitised() {
        let service = CatalogService::new(Store::in_memory());
        let package = service
            .create_package(CreatePackageRequest {
                name: "History".into(),
                description: Some("<b>World</b> history<script>alert(1)</script>".into()),
                is_active: None,
            })
            .await
            .unwrap();

        assert!(package.is_active);
        assert_eq!(package.description.as_deref(), Some("<b>World</b> history"));
    }
}
