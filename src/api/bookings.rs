use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReturnDocument;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::Booking;
use crate::state::AppState;

/// Booking routes; intake is public, the workflow is dashboard-only.
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/count", get(booking_count))
        .route("/bookings/confirm/{id}", patch(confirm_booking))
        .route("/bookings/decline/{id}", delete(decline_booking))
        .route("/bookings/confirmed", get(confirmed_bookings))
        .route("/bookings/unconfirmed/count", get(unconfirmed_count))
        .route("/bookings/confirmed/count", get(confirmed_count))
}

/// POST /api/bookings (public)
async fn create_booking(
    State(state): State<AppState>,
    Json(mut booking): Json<Booking>,
) -> Result<(StatusCode, Json<Booking>)> {
    booking.id = None;
    let result = state.store.bookings().insert_one(&booking).await?;
    booking.id = result.inserted_id.as_object_id();

    tracing::info!(name = %booking.name, date = %booking.selected_date, "Booking created");
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/bookings
async fn list_bookings(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>> {
    let bookings = state
        .store
        .bookings()
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(bookings))
}

/// GET /api/bookings/count
async fn booking_count(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state.store.bookings().count_documents(doc! {}).await?;
    Ok(Json(json!({ "count": count })))
}

/// PATCH /api/bookings/confirm/:id
async fn confirm_booking(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>> {
    let id = parse_object_id(&id)?;
    let booking = state
        .store
        .bookings()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": { "confirmed": true } })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(booking))
}

/// DELETE /api/bookings/decline/:id
async fn decline_booking(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let booking = state
        .store
        .bookings()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(json!({
        "message": "Booking declined and deleted",
        "booking": booking
    })))
}

/// GET /api/bookings/confirmed
async fn confirmed_bookings(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>> {
    let bookings = state
        .store
        .bookings()
        .find(doc! { "confirmed": true })
        .await?
        .try_collect()
        .await?;
    Ok(Json(bookings))
}

/// GET /api/bookings/unconfirmed/count
async fn unconfirmed_count(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let count = state
        .store
        .bookings()
        .count_documents(doc! { "confirmed": false })
        .await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/bookings/confirmed/count
async fn confirmed_count(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state
        .store
        .bookings()
        .count_documents(doc! { "confirmed": true })
        .await?;
    Ok(Json(json!({ "count": count })))
}
