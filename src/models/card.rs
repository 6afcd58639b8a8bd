use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A product card shown on the website, with a gallery of detail images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(
        rename = "_id",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::oid_as_hex"
    )]
    pub id: Option<ObjectId>,
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub carddetails: Vec<CardDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One detail image + caption inside a card.
///
/// Detail ids are hex strings rather than ObjectIds so they round-trip
/// unchanged through JSON and URL path segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetail {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl CardDetail {
    pub fn new(image: Option<String>, description: String) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            image,
            description,
        }
    }
}
