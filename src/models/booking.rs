use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A booking request taken from the public website form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(
        rename = "_id",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::oid_as_hex"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub mobile_number1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number2: Option<String>,
    pub state: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_event_type: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub selected_date: String,
    pub start_time: String,
    pub total_price: f64,
    pub max_hours: i32,
    pub selected_packages: String,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub declined: bool,
}
