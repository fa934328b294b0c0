// src/services/mod.rs

pub mod account;
pub mod attempt;
pub mod catalog;
pub mod stats;

pub use account::AccountService;
pub use attempt::AttemptService;
pub use catalog::CatalogService;
pub use stats::StatsService;
