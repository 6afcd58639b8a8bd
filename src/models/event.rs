use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A gallery photo hosted on the image service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(
        rename = "_id",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::oid_as_hex"
    )]
    pub id: Option<ObjectId>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}
