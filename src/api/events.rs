use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::doc;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::media;
use crate::models::Event;
use crate::state::AppState;

const GALLERY_FOLDER: &str = "events";

/// Gallery routes: hosted photos shown on the public website.
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events/upload", post(upload_image))
        .route("/events", get(list_events))
        .route("/events/{id}", delete(delete_event))
        .route("/events/count", get(event_count))
}

/// POST /api/events/upload - multipart with an `image` field
async fn upload_image(
    _caller: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Event>)> {
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or("image").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
            upload = Some((bytes.to_vec(), filename));
        }
    }

    let (bytes, filename) =
        upload.ok_or_else(|| AppError::BadRequest("Image file is required".to_string()))?;

    let uploaded = state.images.upload(bytes, &filename, GALLERY_FOLDER).await?;

    let mut event = Event {
        id: None,
        image_url: uploaded.url,
        public_id: Some(uploaded.public_id),
    };
    let result = state.store.events().insert_one(&event).await?;
    event.id = result.inserted_id.as_object_id();

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/events (public)
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    let events = state
        .store
        .events()
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(events))
}

/// DELETE /api/events/:id - removes the hosted image, then the record
async fn delete_event(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let event = state
        .store
        .events()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let public_id = event
        .public_id
        .clone()
        .unwrap_or_else(|| media::public_id_from_url(&event.image_url, GALLERY_FOLDER));
    state.images.destroy(&public_id).await?;

    state.store.events().delete_one(doc! { "_id": id }).await?;

    Ok(Json(json!({ "message": "Event and images deleted successfully" })))
}

/// GET /api/events/count
async fn event_count(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state.store.events().count_documents(doc! {}).await?;
    Ok(Json(json!({ "count": count })))
}
