// tests/postgres_store_tests.rs

//! Runs the PostgreSQL store against a real database.
//! Every test returns early when DATABASE_URL is not set.

use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, Utc};
use quiz_server::{
    clock::ManualClock,
    config::QUESTIONS_PER_PACKAGE,
    error::AppError,
    models::{question::NewQuestion, user::ROLE_USER},
    repositories::Store,
    services::AttemptService,
};
use sqlx::postgres::PgPoolOptions;

/// Connects and migrates, or returns `None` when no database is configured.
async fn store() -> Option<Store> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(Store::postgres(pool))
}

fn question(order_index: Option<i32>) -> NewQuestion {
    NewQuestion {
        question_text: "Which planet is largest?".to_string(),
        options: vec!["Jupiter".into(), "Mars".into(), "Venus".into()],
        correct_answer: "Jupiter".into(),
        explanation: None,
        order_index,
    }
}

/// Fresh user and package; usernames are unique per run.
async fn user_and_package(store: &Store, questions: i64) -> (i64, i64) {
    let username = format!("pg_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let user = store.users.create(&username, "hash", ROLE_USER).await.unwrap();
    let package = store
        .packages
        .create("Astronomy", Some("Planets and stars"), true)
        .await
        .unwrap();

    for _ in 0..questions {
        store
            .questions
            .insert_capped(package.id, &question(None), QUESTIONS_PER_PACKAGE)
            .await
            .unwrap();
    }

    (user.id, package.id)
}

#[tokio::test]
async fn create_or_resume_returns_open_attempt() {
    let Some(store) = store().await else { return };
    let (user_id, package_id) = user_and_package(&store, 0).await;
    let now = Utc::now();

    let (first, created) = store
        .attempts
        .create_or_resume(user_id, package_id, 110, now)
        .await
        .unwrap();
    assert!(created);

    let (second, created) = store
        .attempts
        .create_or_resume(user_id, package_id, 110, now)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);

    // Once completed, the next call opens a new attempt
    assert!(store.attempts.complete(first.id, 0, now, 10).await.unwrap());
    let (third, created) = store
        .attempts
        .create_or_resume(user_id, package_id, 110, now)
        .await
        .unwrap();
    assert!(created);
    assert_ne!(third.id, first.id);
}

#[tokio::test]
async fn concurrent_starts_share_one_attempt() {
    let Some(store) = store().await else { return };
    let (user_id, package_id) = user_and_package(&store, 0).await;
    let now = Utc::now();

    let (a, b) = tokio::join!(
        store.attempts.create_or_resume(user_id, package_id, 110, now),
        store.attempts.create_or_resume(user_id, package_id, 110, now),
    );
    let (a, a_created) = a.unwrap();
    let (b, b_created) = b.unwrap();

    assert_eq!(a.id, b.id);
    assert!(a_created ^ b_created);
}

#[tokio::test]
async fn second_completion_loses() {
    let Some(store) = store().await else { return };
    let (user_id, package_id) = user_and_package(&store, 0).await;
    let now = Utc::now();

    let (attempt, _) = store
        .attempts
        .create_or_resume(user_id, package_id, 110, now)
        .await
        .unwrap();

    assert!(store.attempts.complete(attempt.id, 70, now, 1800).await.unwrap());
    assert!(!store.attempts.complete(attempt.id, 110, now, 3600).await.unwrap());

    let stored = store.attempts.find_by_id(attempt.id).await.unwrap().unwrap();
    assert_eq!(stored.score, 70);
    assert_eq!(stored.time_taken_seconds, Some(1800));

    // Answers can no longer change either
    let mut late = HashMap::new();
    late.insert(1, "Jupiter".to_string());
    assert!(!store.attempts.save_answers(attempt.id, &late).await.unwrap());
}

#[tokio::test]
async fn answers_round_trip_through_jsonb() {
    let Some(store) = store().await else { return };
    let (user_id, package_id) = user_and_package(&store, 0).await;

    let (attempt, _) = store
        .attempts
        .create_or_resume(user_id, package_id, 110, Utc::now())
        .await
        .unwrap();
    assert!(attempt.answers.is_empty());

    let mut answers = HashMap::new();
    answers.insert(17, "Jupiter".to_string());
    answers.insert(42, "Mars, probably".to_string());
    answers.insert(110, "Vénus".to_string());
    assert!(store.attempts.save_answers(attempt.id, &answers).await.unwrap());

    let stored = store.attempts.find_by_id(attempt.id).await.unwrap().unwrap();
    assert_eq!(stored.answers.0, answers);
}

#[tokio::test]
async fn insert_capped_rejects_the_111th_question() {
    let Some(store) = store().await else { return };
    let (_, package_id) = user_and_package(&store, QUESTIONS_PER_PACKAGE).await;

    let questions = store.questions.list_for_package(package_id).await.unwrap();
    assert_eq!(questions.len(), 110);
    assert_eq!(questions[0].order_index, 1);
    assert_eq!(questions[109].order_index, 110);

    let err = store
        .questions
        .insert_capped(package_id, &question(None), QUESTIONS_PER_PACKAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionFailed(_)));
    assert_eq!(store.questions.count_for_package(package_id).await.unwrap(), 110);
}

#[tokio::test]
async fn concurrent_inserts_never_exceed_capacity() {
    let Some(store) = store().await else { return };
    let (_, package_id) = user_and_package(&store, 100).await;

    let handles: Vec<_> = (0..15)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .questions
                    .insert_capped(package_id, &question(None), QUESTIONS_PER_PACKAGE)
                    .await
            })
        })
        .collect();

    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => {}
            Err(AppError::PreconditionFailed(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(rejected, 5);
    assert_eq!(store.questions.count_for_package(package_id).await.unwrap(), 110);
}

#[tokio::test]
async fn duplicate_order_index_conflicts() {
    let Some(store) = store().await else { return };
    let (_, package_id) = user_and_package(&store, 1).await;

    let err = store
        .questions
        .insert_capped(package_id, &question(Some(1)), QUESTIONS_PER_PACKAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn expired_attempt_completes_on_postgres() {
    let Some(store) = store().await else { return };
    let (user_id, package_id) = user_and_package(&store, QUESTIONS_PER_PACKAGE).await;
    let clock = Arc::new(ManualClock::default());
    let service = AttemptService::new(store.clone(), clock.clone());

    let (attempt, _) = service.start(user_id, package_id).await.unwrap();
    let (again, created) = service.start(user_id, package_id).await.unwrap();
    assert_eq!(again.id, attempt.id);
    assert!(!created);

    clock.advance(Duration::seconds(7201));
    let expired = service.expire(&attempt).await.unwrap();
    assert!(expired.is_completed());
    assert_eq!(expired.score, 0);
    assert_eq!(expired.time_taken_seconds, Some(7201));
}
