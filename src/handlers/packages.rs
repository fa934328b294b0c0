// src/handlers/packages.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError, models::PageParams, services::CatalogService, utils::jwt::Claims,
};

/// Lists active quiz packages, newest first.
pub async fn list_packages(
    State(catalog): State<CatalogService>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.list_active(&params).await?))
}

/// Package page with question count, attemptability and the caller's
/// latest attempt.
pub async fn get_package(
    State(catalog): State<CatalogService>,
    Extension(claims): Extension<Claims>,
    Path(package_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = catalog.show_for_user(claims.user_id()?, package_id).await?;
    Ok(Json(detail))
}
