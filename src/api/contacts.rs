use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Contact, ContactPriority, ContactStatus, CreateContactRequest};
use crate::state::AppState;

/// Contact inquiry routes; intake is public, the rest is dashboard-only.
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/stats", get(contact_stats))
        .route(
            "/contacts/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

/// Lightweight address shape check, the same one the website form applies.
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// POST /api/contacts (public)
async fn create_contact(
    State(state): State<AppState>,
    Json(request): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let required = [
        request.name.as_deref(),
        request.email.as_deref(),
        request.company_name.as_deref(),
        request.message.as_deref(),
    ];
    if required.iter().any(|f| f.map_or(true, |v| v.trim().is_empty())) {
        return Err(AppError::BadRequest(
            "Please fill in all required fields: name, email, company name, and message"
                .to_string(),
        ));
    }

    let email = request.email.unwrap_or_default().trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest(
            "Please provide a valid email address".to_string(),
        ));
    }

    let now = Utc::now();
    let mut contact = Contact {
        id: None,
        name: request.name.unwrap_or_default().trim().to_string(),
        email,
        phone_number: request
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        company_name: request.company_name.unwrap_or_default().trim().to_string(),
        subject: request
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        message: request.message.unwrap_or_default().trim().to_string(),
        status: ContactStatus::New,
        priority: ContactPriority::Medium,
        notes: String::new(),
        contacted_at: None,
        created_at: now,
        updated_at: now,
    };
    let result = state.store.contacts().insert_one(&contact).await?;
    contact.id = result.inserted_id.as_object_id();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Contact inquiry submitted successfully",
            "data": contact
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct ListContactsQuery {
    page: Option<u64>,
    limit: Option<i64>,
    status: Option<String>,
    priority: Option<String>,
    search: Option<String>,
}

/// GET /api/contacts - paginated, filterable listing
async fn list_contacts(
    _caller: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListContactsQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let mut filter = Document::new();
    if let Some(status) = &query.status {
        filter.insert("status", status.as_str());
    }
    if let Some(priority) = &query.priority {
        filter.insert("priority", priority.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": search, "$options": "i" } },
                doc! { "email": { "$regex": search, "$options": "i" } },
                doc! { "companyName": { "$regex": search, "$options": "i" } },
                doc! { "subject": { "$regex": search, "$options": "i" } },
            ],
        );
    }

    let total = state
        .store
        .contacts()
        .count_documents(filter.clone())
        .await?;
    let contacts: Vec<Contact> = state
        .store
        .contacts()
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    let total_pages = (total as f64 / limit as f64).ceil() as u64;

    Ok(Json(json!({
        "success": true,
        "data": contacts,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages,
            "totalContacts": total,
            "limit": limit
        }
    })))
}

/// GET /api/contacts/:id
async fn get_contact(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let contact = state
        .store
        .contacts()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": contact })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContactRequest {
    status: Option<ContactStatus>,
    priority: Option<ContactPriority>,
    notes: Option<String>,
    contacted_at: Option<DateTime<Utc>>,
}

/// PUT /api/contacts/:id - status/priority/notes patch
async fn update_contact(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateContactRequest>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;

    let mut set = Document::new();
    if let Some(status) = &request.status {
        set.insert(
            "status",
            mongodb::bson::to_bson(status).map_err(|e| AppError::InternalError(e.to_string()))?,
        );
    }
    if let Some(priority) = &request.priority {
        set.insert(
            "priority",
            mongodb::bson::to_bson(priority)
                .map_err(|e| AppError::InternalError(e.to_string()))?,
        );
    }
    if let Some(notes) = &request.notes {
        set.insert("notes", notes.as_str());
    }
    if let Some(contacted_at) = &request.contacted_at {
        set.insert(
            "contactedAt",
            mongodb::bson::to_bson(contacted_at)
                .map_err(|e| AppError::InternalError(e.to_string()))?,
        );
    }
    set.insert("updatedAt", models::bson_now());

    let contact = state
        .store
        .contacts()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Contact updated successfully",
        "data": contact
    })))
}

/// DELETE /api/contacts/:id
async fn delete_contact(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    state
        .store
        .contacts()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Contact deleted successfully"
    })))
}

/// GET /api/contacts/stats - totals by status plus an aggregate by priority
async fn contact_stats(_caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let contacts = state.store.contacts();
    let total = contacts.count_documents(doc! {}).await?;
    let new = contacts.count_documents(doc! { "status": "new" }).await?;
    let contacted = contacts
        .count_documents(doc! { "status": "contacted" })
        .await?;
    let converted = contacts
        .count_documents(doc! { "status": "converted" })
        .await?;
    let closed = contacts.count_documents(doc! { "status": "closed" }).await?;

    let mut by_priority = Map::new();
    let mut cursor = contacts
        .aggregate(vec![doc! {
            "$group": { "_id": "$priority", "count": { "$sum": 1 } }
        }])
        .await?;
    while let Some(group) = cursor.try_next().await? {
        let priority = group.get_str("_id").unwrap_or("unknown").to_string();
        let count = group
            .get("count")
            .and_then(|value| value.as_i64().or_else(|| value.as_i32().map(i64::from)))
            .unwrap_or(0);
        by_priority.insert(priority, json!(count));
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "total": total,
            "byStatus": {
                "new": new,
                "contacted": contacted,
                "converted": converted,
                "closed": closed
            },
            "byPriority": by_priority
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a.b@x.com"));
        assert!(is_valid_email("info@studio.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-address"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@.com"));
    }
}
