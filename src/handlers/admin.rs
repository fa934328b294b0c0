// src/handlers/admin.rs

//! Administration endpoints. Every route here sits behind `admin_middleware`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        PageParams,
        package::{CreatePackageRequest, UpdatePackageRequest},
        question::{CreateQuestionRequest, UpdateQuestionRequest},
    },
    services::{CatalogService, StatsService},
    utils::json::ApiJson,
};

/// Totals, the most recent attempts and per-package statistics.
pub async fn dashboard(State(stats): State<StatsService>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(stats.dashboard().await?))
}

/// Lists users with their attempt counts.
pub async fn list_users(
    State(stats): State<StatsService>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(stats.users(&params).await?))
}

/// Lists every package, inactive ones included.
pub async fn list_packages(
    State(catalog): State<CatalogService>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.list_all(&params).await?))
}

pub async fn create_package(
    State(catalog): State<CatalogService>,
    ApiJson(payload): ApiJson<CreatePackageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let package = catalog.create_package(payload).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

pub async fn get_package(
    State(catalog): State<CatalogService>,
    Path(package_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.show_for_admin(package_id).await?))
}

pub async fn update_package(
    State(catalog): State<CatalogService>,
    Path(package_id): Path<i64>,
    ApiJson(payload): ApiJson<UpdatePackageRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.update_package(package_id, payload).await?))
}

/// Deletes a package together with its questions and attempts.
pub async fn delete_package(
    State(catalog): State<CatalogService>,
    Path(package_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_package(package_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_questions(
    State(catalog): State<CatalogService>,
    Path(package_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.list_questions(package_id, &params).await?))
}

pub async fn create_question(
    State(catalog): State<CatalogService>,
    Path(package_id): Path<i64>,
    ApiJson(payload): ApiJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = catalog.create_question(package_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(catalog): State<CatalogService>,
    Path((package_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.get_question(package_id, question_id).await?))
}

pub async fn update_question(
    State(catalog): State<CatalogService>,
    Path((package_id, question_id)): Path<(i64, i64)>,
    ApiJson(payload): ApiJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        catalog
            .update_question(package_id, question_id, payload)
            .await?,
    ))
}

pub async fn delete_question(
    State(catalog): State<CatalogService>,
    Path((package_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_question(package_id, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
