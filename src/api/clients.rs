use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Client, ClientStatus};
use crate::state::AppState;

const LOGO_FOLDER: &str = "clients";

/// Client logo routes, nested under /api/clients.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/active", get(active_clients))
        .route("/", get(list_clients).post(create_client))
        .route("/stats", get(client_stats))
        .route(
            "/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
}

#[derive(Debug, Deserialize)]
struct ListClientsQuery {
    page: Option<u64>,
    limit: Option<i64>,
    status: Option<String>,
    search: Option<String>,
}

/// GET /api/clients - paginated, filterable listing
async fn list_clients(
    _caller: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let mut filter = Document::new();
    if let Some(status) = &query.status {
        filter.insert("status", status.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": search, "$options": "i" } },
                doc! { "description": { "$regex": search, "$options": "i" } },
            ],
        );
    }

    let total = state
        .store
        .clients()
        .count_documents(filter.clone())
        .await?;
    let clients: Vec<Client> = state
        .store
        .clients()
        .find(filter)
        .sort(doc! { "displayOrder": 1, "createdAt": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    let total_pages = (total as f64 / limit as f64).ceil() as u64;

    Ok(Json(json!({
        "success": true,
        "data": clients,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages,
            "totalClients": total,
            "limit": limit
        }
    })))
}

/// GET /api/clients/:id
async fn get_client(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let client = state
        .store
        .clients()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": client })))
}

/// POST /api/clients - multipart: name, logo (file), website?, description?,
/// status?, displayOrder?
async fn create_client(
    _caller: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let mut name: Option<String> = None;
    let mut website: Option<String> = None;
    let mut description: Option<String> = None;
    let mut status: Option<String> = None;
    let mut display_order: Option<i32> = None;
    let mut logo: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("name") => name = Some(read_text(field).await?),
            Some("website") => website = Some(read_text(field).await?),
            Some("description") => description = Some(read_text(field).await?),
            Some("status") => status = Some(read_text(field).await?),
            Some("displayOrder") => {
                display_order = read_text(field).await?.trim().parse().ok();
            }
            Some("logo") => {
                let filename = field.file_name().unwrap_or("logo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
                logo = Some((bytes.to_vec(), filename));
            }
            _ => {}
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Client name is required".to_string()))?;
    let (bytes, filename) =
        logo.ok_or_else(|| AppError::BadRequest("Logo image is required".to_string()))?;

    let uploaded = state.images.upload(bytes, &filename, LOGO_FOLDER).await?;

    let now = Utc::now();
    let mut client = Client {
        id: None,
        name,
        logo: uploaded.url,
        cloudinary_id: Some(uploaded.public_id),
        status: parse_status(status.as_deref()),
        display_order: display_order.unwrap_or(0),
        website: website.map(|w| w.trim().to_string()).filter(|w| !w.is_empty()),
        description: description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        created_at: now,
        updated_at: now,
    };
    let result = state.store.clients().insert_one(&client).await?;
    client.id = result.inserted_id.as_object_id();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Client created successfully",
            "data": client
        })),
    ))
}

/// PUT /api/clients/:id - multipart patch, optional logo replacement
async fn update_client(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let existing = state
        .store
        .clients()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

    let mut set = Document::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("name") => {
                let name = read_text(field).await?;
                if !name.trim().is_empty() {
                    set.insert("name", name.trim());
                }
            }
            Some("website") => {
                set.insert("website", read_text(field).await?.trim());
            }
            Some("description") => {
                set.insert("description", read_text(field).await?.trim());
            }
            Some("status") => {
                let status = read_text(field).await?;
                let status = status.trim();
                if status == "active" || status == "inactive" {
                    set.insert("status", status);
                }
            }
            Some("displayOrder") => {
                if let Ok(order) = read_text(field).await?.trim().parse::<i32>() {
                    set.insert("displayOrder", order);
                }
            }
            Some("logo") => {
                let filename = field.file_name().unwrap_or("logo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;

                if let Some(old_id) = &existing.cloudinary_id {
                    state.images.destroy(old_id).await?;
                }
                let uploaded = state
                    .images
                    .upload(bytes.to_vec(), &filename, LOGO_FOLDER)
                    .await?;
                set.insert("logo", uploaded.url);
                set.insert("cloudinaryId", uploaded.public_id);
            }
            _ => {}
        }
    }
    set.insert("updatedAt", models::bson_now());

    let client = state
        .store
        .clients()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Client updated successfully",
        "data": client
    })))
}

/// DELETE /api/clients/:id - removes the hosted logo first
async fn delete_client(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let client = state
        .store
        .clients()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

    if let Some(cloudinary_id) = &client.cloudinary_id {
        state.images.destroy(cloudinary_id).await?;
    }

    state.store.clients().delete_one(doc! { "_id": id }).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Client deleted successfully"
    })))
}

/// GET /api/clients/stats
async fn client_stats(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let clients = state.store.clients();
    let active = clients.count_documents(doc! { "status": "active" }).await?;
    let inactive = clients
        .count_documents(doc! { "status": "inactive" })
        .await?;
    let total = clients.count_documents(doc! {}).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "activeCount": active,
            "inactiveCount": inactive,
            "totalCount": total
        }
    })))
}

/// GET /api/clients/active (public) - logos for the website
async fn active_clients(State(state): State<AppState>) -> Result<Json<Value>> {
    let clients: Vec<Client> = state
        .store
        .clients()
        .find(doc! { "status": "active" })
        .sort(doc! { "displayOrder": 1, "createdAt": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(json!({ "success": true, "data": clients })))
}

fn parse_status(status: Option<&str>) -> ClientStatus {
    match status {
        Some("inactive") => ClientStatus::Inactive,
        _ => ClientStatus::Active,
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid field: {}", e)))
}
