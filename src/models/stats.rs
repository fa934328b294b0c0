// src/models/stats.rs

use serde::Serialize;
use sqlx::FromRow;

use super::attempt::AttemptOverview;

/// Raw per-package aggregate as read from storage.
#[derive(Debug, Clone, FromRow)]
pub struct PackageAttemptAggregate {
    pub id: i64,
    pub name: String,
    pub questions_count: i64,
    pub total_attempts: i64,
    pub completed_attempts: i64,
    /// Mean score over completed attempts, if any.
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PackageStats {
    pub id: i64,
    pub name: String,
    pub questions_count: i64,
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub completion_rate: f64,
    pub average_score: f64,
}

#[derive(Debug, Serialize)]
pub struct Totals {
    pub total_users: i64,
    pub total_quiz_packages: i64,
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub stats: Totals,
    pub recent_attempts: Vec<AttemptOverview>,
    pub package_stats: Vec<PackageStats>,
}
