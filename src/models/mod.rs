// src/models/mod.rs

pub mod attempt;
pub mod package;
pub mod question;
pub mod stats;
pub mod user;

use serde::{Deserialize, Serialize};

/// Query parameters for paginated listings (1-based).
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self, per_page: i64) -> i64 {
        (self.page() - 1).saturating_mul(per_page.max(0))
    }
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: &PageParams, per_page: i64, total: i64) -> Self {
        Self {
            items,
            page: params.page(),
            per_page,
            total,
        }
    }
}
