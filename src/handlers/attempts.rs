// src/handlers/attempts.rs

//! Attempt endpoints. State transitions answer with `303 See Other`
//! pointing at the view the client should load next.

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    error::AppError,
    models::attempt::SubmitAnswersRequest,
    services::{
        AttemptService,
        attempt::{ResultOutcome, TakeOutcome},
    },
    utils::{json::ApiJson, jwt::Claims},
};

fn take_location(package_id: i64, attempt_id: i64) -> String {
    format!("/api/packages/{}/attempts/{}", package_id, attempt_id)
}

fn result_location(package_id: i64, attempt_id: i64) -> String {
    format!("/api/packages/{}/attempts/{}/result", package_id, attempt_id)
}

/// Starts a new attempt or resumes the open one.
pub async fn start_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(package_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let (attempt, _) = attempts.start(claims.user_id()?, package_id).await?;
    Ok(Redirect::to(&take_location(
        attempt.quiz_package_id,
        attempt.id,
    )))
}

pub async fn take_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path((package_id, attempt_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let response = match attempts
        .take(claims.user_id()?, package_id, attempt_id)
        .await?
    {
        TakeOutcome::InProgress(view) => Json(view).into_response(),
        TakeOutcome::Completed(attempt) => {
            Redirect::to(&result_location(package_id, attempt.id)).into_response()
        }
    };
    Ok(response)
}

/// Submits the answer mapping and completes the attempt.
pub async fn submit_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path((package_id, attempt_id)): Path<(i64, i64)>,
    ApiJson(payload): ApiJson<SubmitAnswersRequest>,
) -> Result<Redirect, AppError> {
    let attempt = attempts
        .submit(claims.user_id()?, package_id, attempt_id, payload)
        .await?;
    Ok(Redirect::to(&result_location(package_id, attempt.id)))
}

pub async fn attempt_result(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path((package_id, attempt_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let response = match attempts
        .result(claims.user_id()?, package_id, attempt_id)
        .await?
    {
        ResultOutcome::Ready(view) => Json(view).into_response(),
        ResultOutcome::InProgress(attempt) => {
            Redirect::to(&take_location(package_id, attempt.id)).into_response()
        }
    };
    Ok(response)
}

/// The caller's own attempts, newest first.
pub async fn my_attempts(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(attempts.list_for_user(claims.user_id()?).await?))
}
