use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::doc;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::Report;
use crate::state::AppState;

/// Report routes; intake is public.
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/count", get(report_count))
        .route("/reports/{id}", delete(delete_report))
}

/// POST /api/reports (public)
async fn create_report(
    State(state): State<AppState>,
    Json(mut report): Json<Report>,
) -> Result<(StatusCode, Json<Report>)> {
    report.id = None;
    let result = state.store.reports().insert_one(&report).await?;
    report.id = result.inserted_id.as_object_id();

    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/reports
async fn list_reports(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Report>>> {
    let reports = state
        .store
        .reports()
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(reports))
}

/// GET /api/reports/count
async fn report_count(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state.store.reports().count_documents(doc! {}).await?;
    Ok(Json(json!({ "count": count })))
}

/// DELETE /api/reports/:id
async fn delete_report(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>> {
    let id = parse_object_id(&id)?;
    let report = state
        .store
        .reports()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

    Ok(Json(report))
}
