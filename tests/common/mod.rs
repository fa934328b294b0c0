// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use quiz_server::{
    clock::{Clock, ManualClock},
    config::Config,
    models::{
        package::{CreatePackageRequest, QuizPackage},
        question::{CreateQuestionRequest, Question},
        user::ROLE_ADMIN,
    },
    repositories::Store,
    routes,
    services::CatalogService,
    state::AppState,
    utils::password::hash_password,
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin_password";

pub struct TestApp {
    pub address: String,
    pub store: Store,
    pub clock: Arc<ManualClock>,
    pub client: reqwest::Client,
}

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        admin_username: None,
        admin_password: None,
    }
}

pub fn test_state() -> (AppState, Store, Arc<ManualClock>) {
    let store = Store::in_memory();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let state = AppState::new(test_config(), store.clone(), dyn_clock);
    (state, store, clock)
}

/// Spawns the app on a random port backed by the in-memory store.
pub async fn spawn_app() -> TestApp {
    let (state, store, clock) = test_state();

    store
        .users
        .create(ADMIN_USERNAME, &hash_password(ADMIN_PASSWORD).unwrap(), ROLE_ADMIN)
        .await
        .expect("Failed to seed admin");

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        store,
        clock,
        client,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let body: serde_json::Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        body["token"].as_str().expect("token missing").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Registers a fresh user and returns its token.
    pub async fn user_token(&self) -> String {
        let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
        assert_eq!(self.register(&username, "password123").await.status().as_u16(), 201);
        self.login(&username, "password123").await
    }

    /// Active package holding `count` questions whose correct answer is "A".
    pub async fn seed_package(&self, count: i32) -> (QuizPackage, Vec<Question>) {
        let catalog = CatalogService::new(self.store.clone());
        let package = catalog
            .create_package(CreatePackageRequest {
                name: "General Knowledge".to_string(),
                description: Some("Mixed trivia".to_string()),
                is_active: Some(true),
            })
            .await
            .unwrap();

        for i in 1..=count {
            catalog
                .create_question(
                    package.id,
                    CreateQuestionRequest {
                        question_text: format!("Question {}", i),
                        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                        correct_answer: "A".into(),
                        explanation: Some(format!("Explanation {}", i)),
                        order_index: Some(i),
                    },
                )
                .await
                .unwrap();
        }

        let questions = self.store.questions.list_for_package(package.id).await.unwrap();
        (package, questions)
    }
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Location header missing")
        .to_str()
        .unwrap()
        .to_string()
}
