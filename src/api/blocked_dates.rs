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
use crate::models::BlockedDate;
use crate::state::AppState;

/// Blocked-date routes; the list is public so the booking form can grey
/// out unavailable days.
pub fn blocked_date_routes() -> Router<AppState> {
    Router::new()
        .route("/blocked-dates", get(list_blocked_dates).post(add_blocked_date))
        .route("/blocked-dates/{id}", delete(remove_blocked_date))
        .route("/blocked-dates/count", get(blocked_date_count))
}

/// GET /api/blocked-dates (public)
async fn list_blocked_dates(State(state): State<AppState>) -> Result<Json<Vec<BlockedDate>>> {
    let dates = state
        .store
        .blocked_dates()
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(dates))
}

/// POST /api/blocked-dates
async fn add_blocked_date(
    _caller: AuthUser,
    State(state): State<AppState>,
    Json(mut blocked): Json<BlockedDate>,
) -> Result<(StatusCode, Json<BlockedDate>)> {
    blocked.id = None;
    let result = state.store.blocked_dates().insert_one(&blocked).await?;
    blocked.id = result.inserted_id.as_object_id();

    Ok((StatusCode::CREATED, Json(blocked)))
}

/// DELETE /api/blocked-dates/:id
async fn remove_blocked_date(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BlockedDate>> {
    let id = parse_object_id(&id)?;
    let blocked = state
        .store
        .blocked_dates()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Blocked date not found".to_string()))?;

    Ok(Json(blocked))
}

/// GET /api/blocked-dates/count
async fn blocked_date_count(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let count = state.store.blocked_dates().count_documents(doc! {}).await?;
    Ok(Json(json!({ "count": count })))
}
