// src/services/stats.rs

use crate::{
    config::{RECENT_ATTEMPTS_LIMIT, USERS_PER_PAGE},
    error::AppResult,
    models::{
        Page, PageParams,
        stats::{DashboardStats, PackageAttemptAggregate, PackageStats, Totals},
        user::UserSummary,
    },
    repositories::Store,
};

/// Read-only figures for the admin dashboard.
#[derive(Clone)]
pub struct StatsService {
    store: Store,
}

impl StatsService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let total_attempts = self.store.attempts.count().await?;
        let completed_attempts = self.store.attempts.count_completed().await?;

        let stats = Totals {
            total_users: self.store.users.count().await?,
            total_quiz_packages: self.store.packages.count().await?,
            total_attempts,
            completed_attempts,
            completion_rate: rate(completed_attempts, total_attempts),
        };

        let recent_attempts = self.store.attempts.recent(RECENT_ATTEMPTS_LIMIT).await?;
        let package_stats = self
            .store
            .attempts
            .package_aggregates()
            .await?
            .into_iter()
            .map(package_stats)
            .collect();

        Ok(DashboardStats {
            stats,
            recent_attempts,
            package_stats,
        })
    }

    pub async fn users(&self, params: &PageParams) -> AppResult<Page<UserSummary>> {
        let (items, total) = self
            .store
            .users
            .list_summaries(params.offset(USERS_PER_PAGE), USERS_PER_PAGE)
            .await?;
        Ok(Page::new(items, params, USERS_PER_PAGE, total))
    }
}

fn package_stats(row: PackageAttemptAggregate) -> PackageStats {
    PackageStats {
        completion_rate: rate(row.completed_attempts, row.total_attempts),
        average_score: round1(row.average_score.unwrap_or(0.0)),
        id: row.id,
        name: row.name,
        questions_count: row.questions_count,
        total_attempts: row.total_attempts,
        completed_attempts: row.completed_attempts,
    }
}

/// Percentage rounded to one decimal; zero when there is nothing to divide.
fn rate(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        clock::ManualClock,
        models::{package::CreatePackageRequest, question::CreateQuestionRequest, user::ROLE_USER},
        services::{AttemptService, CatalogService},
    };

    #[test]
    fn rate_handles_empty_denominator() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(1, 3), 33.3);
        assert_eq!(rate(2, 3), 66.7);
    }

    #[tokio::test]
    async fn dashboard_counts_attempts_per_package() {
        let store = Store::in_memory();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()));
        let catalog = CatalogService::new(store.clone());
        let attempts = AttemptService::new(store.clone(), clock);
        let stats = StatsService::new(store.clone());

        let package = catalog
            .create_package(CreatePackageRequest {
                name: "General Knowledge".into(),
                description: None,
                is_active: Some(true),
            })
            .await
            .unwrap();
        for i in 1..=110 {
            catalog
                .create_question(
                    package.id,
                    CreateQuestionRequest {
                        question_text: format!("Q{}", i),
                        options: vec!["yes".into(), "no".into()],
                        correct_answer: "yes".into(),
                        explanation: None,
                        order_index: None,
                    },
                )
                .await
                .unwrap();
        }

        let alice = store.users.create("alice", "x", ROLE_USER).await.unwrap();
        let bob = store.users.create("bob", "x", ROLE_USER).await.unwrap();

        let (first, _) = attempts.start(alice.id, package.id).await.unwrap();
        attempts
            .submit(alice.id, package.id, first.id, Default::default())
            .await
            .unwrap();
        attempts.start(bob.id, package.id).await.unwrap();

        let dashboard = stats.dashboard().await.unwrap();
        assert_eq!(dashboard.stats.total_users, 2);
        assert_eq!(dashboard.stats.total_quiz_packages, 1);
        assert_eq!(dashboard.stats.total_attempts, 2);
        assert_eq!(dashboard.stats.completed_attempts, 1);
        assert_eq!(dashboard.stats.completion_rate, 50.0);
        assert_eq!(dashboard.recent_attempts.len(), 2);

        let row = &dashboard.package_stats[0];
        assert_eq!(row.questions_count, 110);
        assert_eq!(row.total_attempts, 2);
        assert_eq!(row.completed_attempts, 1);
        assert_eq!(row.average_score, 0.0);

        let users = stats.users(&PageParams::default()).await.unwrap();
        assert_eq!(users.total, 2);
    }
}
