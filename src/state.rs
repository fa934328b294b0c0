// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    clock::Clock,
    config::Config,
    repositories::Store,
    services::{AccountService, AttemptService, CatalogService, StatsService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Config, store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Store {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        AttemptService::new(state.store.clone(), state.clock.clone())
    }
}

impl FromRef<AppState> for CatalogService {
    fn from_ref(state: &AppState) -> Self {
        CatalogService::new(state.store.clone())
    }
}

impl FromRef<AppState> for StatsService {
    fn from_ref(state: &AppState) -> Self {
        StatsService::new(state.store.clone())
    }
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        AccountService::new(state.store.clone(), state.config.clone())
    }
}

impl FromRef<AppState> for Arc<dyn Clock> {
    fn from_ref(state: &AppState) -> Self {
        state.clock.clone()
    }
}
