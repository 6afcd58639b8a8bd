use std::collections::BTreeMap;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use rand::Rng;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{self, Card, CardDetail};
use crate::state::AppState;

const CARD_FOLDER: &str = "cards";

/// Product card routes; reads are public for the website.
pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/count", get(card_count))
        .route(
            "/cards/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/cards/{id}/carddetails", post(add_card_details))
        .route(
            "/cards/{id}/carddetails/{detail_id}",
            put(update_card_detail).delete(delete_card_detail),
        )
}

fn generate_card_code() -> String {
    let mut rng = rand::rng();
    format!("CRD-{}", rng.random_range(1000..10000))
}

/// POST /api/cards - multipart: title, description?, code?, image?
async fn create_card(
    _caller: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Card>)> {
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut code: Option<String> = None;
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("title") => title = Some(read_text(field).await?),
            Some("description") => description = Some(read_text(field).await?),
            Some("code") => code = Some(read_text(field).await?),
            Some("image") => image = Some(read_file(field).await?),
            _ => {}
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;

    let image_url = match image {
        Some((bytes, filename)) => Some(state.images.upload(bytes, &filename, CARD_FOLDER).await?.url),
        None => None,
    };

    let now = Utc::now();
    let mut card = Card {
        id: None,
        code: code.filter(|c| !c.is_empty()).unwrap_or_else(generate_card_code),
        title,
        description,
        image: image_url,
        carddetails: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let result = state.store.cards().insert_one(&card).await?;
    card.id = result.inserted_id.as_object_id();

    tracing::info!(code = %card.code, "Card created");
    Ok((StatusCode::CREATED, Json(card)))
}

/// GET /api/cards (public)
async fn list_cards(State(state): State<AppState>) -> Result<Json<Vec<Card>>> {
    let cards = state
        .store
        .cards()
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(cards))
}

/// GET /api/cards/count (public)
async fn card_count(State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state.store.cards().count_documents(doc! {}).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/cards/:id (public)
async fn get_card(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Card>> {
    let id = parse_object_id(&id)?;
    let card = state
        .store
        .cards()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
    Ok(Json(card))
}

/// PUT /api/cards/:id - multipart: title?, description?, image?
async fn update_card(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Card>> {
    let id = parse_object_id(&id)?;

    let mut set = Document::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("title") => {
                set.insert("title", read_text(field).await?);
            }
            Some("description") => {
                set.insert("description", read_text(field).await?);
            }
            Some("image") => {
                let (bytes, filename) = read_file(field).await?;
                let uploaded = state.images.upload(bytes, &filename, CARD_FOLDER).await?;
                set.insert("image", uploaded.url);
            }
            _ => {}
        }
    }
    set.insert("updatedAt", models::bson_now());

    let card = state
        .store
        .cards()
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    Ok(Json(card))
}

/// DELETE /api/cards/:id
async fn delete_card(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    state
        .store
        .cards()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    Ok(Json(json!({ "message": "Card deleted successfully" })))
}

/// POST /api/cards/:id/carddetails - multipart fields shaped as
/// `carddetails[i][image]` (file) and `carddetails[i][description]` (text).
async fn add_card_details(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Card>> {
    let id = parse_object_id(&id)?;

    state
        .store
        .cards()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    let mut entries: BTreeMap<usize, (Option<(Vec<u8>, String)>, Option<String>)> = BTreeMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match parse_detail_field(&name) {
            Some((index, DetailPart::Image)) => {
                entries.entry(index).or_default().0 = Some(read_file(field).await?);
            }
            Some((index, DetailPart::Description)) => {
                entries.entry(index).or_default().1 = Some(read_text(field).await?);
            }
            None => {}
        }
    }

    let mut details: Vec<CardDetail> = Vec::new();
    for (_, (image, description)) in entries {
        let Some((bytes, filename)) = image else {
            continue;
        };
        let uploaded = state.images.upload(bytes, &filename, CARD_FOLDER).await?;
        details.push(CardDetail::new(
            Some(uploaded.url),
            description.unwrap_or_default(),
        ));
    }

    if details.is_empty() {
        return Err(AppError::BadRequest("No valid images found".to_string()));
    }

    let detail_docs: Vec<_> = details
        .iter()
        .map(mongodb::bson::to_bson)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let card = state
        .store
        .cards()
        .find_one_and_update(
            doc! { "_id": id },
            doc! {
                "$push": { "carddetails": { "$each": detail_docs } },
                "$set": { "updatedAt": models::bson_now() },
            },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    Ok(Json(card))
}

/// PUT /api/cards/:id/carddetails/:detail_id - multipart: description?, image?
async fn update_card_detail(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path((id, detail_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<Card>> {
    let id = parse_object_id(&id)?;

    let card = state
        .store
        .cards()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;
    if !card.carddetails.iter().any(|detail| detail.id == detail_id) {
        return Err(AppError::NotFound("Card detail not found".to_string()));
    }

    let mut set = Document::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("description") => {
                set.insert("carddetails.$.description", read_text(field).await?);
            }
            Some("image") => {
                let (bytes, filename) = read_file(field).await?;
                let uploaded = state.images.upload(bytes, &filename, CARD_FOLDER).await?;
                set.insert("carddetails.$.image", uploaded.url);
            }
            _ => {}
        }
    }
    set.insert("updatedAt", models::bson_now());

    let card = state
        .store
        .cards()
        .find_one_and_update(
            doc! { "_id": id, "carddetails._id": detail_id.as_str() },
            doc! { "$set": set },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Card detail not found".to_string()))?;

    Ok(Json(card))
}

/// DELETE /api/cards/:id/carddetails/:detail_id
async fn delete_card_detail(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path((id, detail_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;

    let card = state
        .store
        .cards()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    if !card.carddetails.iter().any(|detail| detail.id == detail_id) {
        return Err(AppError::NotFound("Card detail not found".to_string()));
    }

    let card = state
        .store
        .cards()
        .find_one_and_update(
            doc! { "_id": id },
            doc! {
                "$pull": { "carddetails": { "_id": detail_id.as_str() } },
                "$set": { "updatedAt": models::bson_now() },
            },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))?;

    Ok(Json(json!({
        "message": "Card detail deleted successfully",
        "card": card
    })))
}

enum DetailPart {
    Image,
    Description,
}

/// Parse a `carddetails[i][image|description]` multipart field name.
fn parse_detail_field(name: &str) -> Option<(usize, DetailPart)> {
    let rest = name.strip_prefix("carddetails[")?;
    let (index, rest) = rest.split_once(']')?;
    let index: usize = index.parse().ok()?;
    match rest {
        "[image]" => Some((index, DetailPart::Image)),
        "[description]" => Some((index, DetailPart::Description)),
        _ => None,
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid field: {}", e)))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<(Vec<u8>, String)> {
    let filename = field.file_name().unwrap_or("image").to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
    Ok((bytes.to_vec(), filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detail_field_names() {
        assert!(matches!(
            parse_detail_field("carddetails[0][image]"),
            Some((0, DetailPart::Image))
        ));
        assert!(matches!(
            parse_detail_field("carddetails[12][description]"),
            Some((12, DetailPart::Description))
        ));
    }

    #[test]
    fn rejects_malformed_detail_field_names() {
        assert!(parse_detail_field("carddetails[x][image]").is_none());
        assert!(parse_detail_field("carddetails[0][thumbnail]").is_none());
        assert!(parse_detail_field("image").is_none());
        assert!(parse_detail_field("carddetails[0]").is_none());
    }

    #[test]
    fn generated_codes_have_the_expected_shape() {
        for _ in 0..20 {
            let code = generate_card_code();
            let digits = code.strip_prefix("CRD-").unwrap();
            let value: u32 = digits.parse().unwrap();
            assert!((1000..10000).contains(&value));
        }
    }
}
