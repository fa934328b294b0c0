// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, attempts, auth, health, packages},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: health check, registration and login.
/// * Authenticated: package catalog and attempt lifecycle.
/// * Admin: package/question management and statistics.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let package_routes = Router::new()
        .route("/", get(packages::list_packages))
        .route("/{id}", get(packages::get_package))
        .route("/{id}/attempts", post(attempts::start_attempt))
        .route(
            "/{id}/attempts/{attempt_id}",
            get(attempts::take_attempt).put(attempts::submit_attempt),
        )
        .route(
            "/{id}/attempts/{attempt_id}/result",
            get(attempts::attempt_result),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let me_routes = Router::new()
        .route("/attempts", get(attempts::my_attempts))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route(
            "/packages",
            get(admin::list_packages).post(admin::create_package),
        )
        .route(
            "/packages/{id}",
            get(admin::get_package)
                .put(admin::update_package)
                .delete(admin::delete_package),
        )
        .route(
            "/packages/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/packages/{id}/questions/{question_id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        // Auth first, then the admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health-check", get(health::health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/packages", package_routes)
        .nest("/api/me", me_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
