// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest},
    services::AccountService,
    utils::json::ApiJson,
};

/// Registers a new user.
///
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(accounts): State<AccountService>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a bearer token.
pub async fn login(
    State(accounts): State<AccountService>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = accounts.login(payload).await?;
    Ok(Json(token))
}
